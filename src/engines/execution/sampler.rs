//! Per-process telemetry sampling.
//!
//! Reads CPU, resident memory, cumulative disk I/O and thread count for one
//! child process at a best-effort fixed cadence. Memory, disk and liveness
//! come from `sysinfo`. On Linux, CPU time and thread count are read from
//! `/proc` directly: sysinfo recomputes process CPU at most every
//! `MINIMUM_CPU_UPDATE_INTERVAL` and only fills task lists on full process
//! scans, both too coarse for a 50 ms cadence.

use crate::types::TelemetryReading;
use chrono::Utc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessStatus, System};

/// Cumulative CPU time of a process at one instant
#[derive(Debug, Clone, Copy)]
struct CpuClock {
    busy: Duration,
    at: Instant,
}

impl CpuClock {
    /// CPU percent between `earlier` and `self`, summed across cores
    fn percent_since(&self, earlier: &CpuClock) -> f64 {
        let wall = self.at.saturating_duration_since(earlier.at).as_secs_f64();
        if wall <= 0.0 {
            return 0.0;
        }
        let busy = self.busy.saturating_sub(earlier.busy).as_secs_f64();
        busy / wall * 100.0
    }
}

/// What sysinfo reports for the process on one refresh
struct ProcessSnapshot {
    memory: u64,
    read_bytes: u64,
    written_bytes: u64,
    cpu_usage: f32,
    tasks: Option<usize>,
}

/// Lazy, unbounded sequence of readings for one live process.
///
/// The sequence ends when the stop channel fires or is closed, or when the
/// process exits or can no longer be read. Ending is never an error.
pub struct TelemetrySampler {
    system: System,
    pid: Pid,
    interval: Duration,
    stop: Receiver<()>,
    last_cpu: Option<CpuClock>,
    primed: bool,
    finished: bool,
}

impl TelemetrySampler {
    pub fn attach(pid: u32, interval: Duration, stop: Receiver<()>) -> Self {
        Self {
            system: System::new(),
            pid: Pid::from_u32(pid),
            interval,
            stop,
            last_cpu: None,
            primed: false,
            finished: false,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid.as_u32()
    }

    /// CPU usage is a delta since the previous measurement, so the first
    /// measurement after attaching is meaningless. Take it and throw it away.
    fn prime(&mut self) -> bool {
        self.primed = true;
        if self.snapshot().is_none() {
            return false;
        }
        self.last_cpu = procfs::cpu_time(self.pid()).map(|busy| CpuClock {
            busy,
            at: Instant::now(),
        });
        true
    }

    fn snapshot(&mut self) -> Option<ProcessSnapshot> {
        if !self.system.refresh_process(self.pid) {
            return None;
        }
        let process = self.system.process(self.pid)?;
        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return None;
        }
        let disk = process.disk_usage();
        Some(ProcessSnapshot {
            memory: process.memory(),
            read_bytes: disk.total_read_bytes,
            written_bytes: disk.total_written_bytes,
            cpu_usage: process.cpu_usage(),
            tasks: process.tasks().map(|tasks| tasks.len()),
        })
    }

    /// Percent since the previous reading. `None` when `/proc` has lost the
    /// process.
    fn cpu_percent(&mut self, snapshot: &ProcessSnapshot) -> Option<f64> {
        if !procfs::AVAILABLE {
            return Some(f64::from(snapshot.cpu_usage));
        }
        let now = CpuClock {
            busy: procfs::cpu_time(self.pid())?,
            at: Instant::now(),
        };
        let percent = match &self.last_cpu {
            Some(earlier) => now.percent_since(earlier),
            None => 0.0,
        };
        self.last_cpu = Some(now);
        Some(percent)
    }

    fn sample(&mut self) -> Option<TelemetryReading> {
        let snapshot = self.snapshot()?;
        let cpu = self.cpu_percent(&snapshot)?;
        let threads = if procfs::AVAILABLE {
            procfs::thread_count(self.pid())?
        } else {
            snapshot.tasks?
        };

        Some(TelemetryReading {
            timestamp: Utc::now(),
            cpu_percent_total: cpu,
            memory_rss_bytes: snapshot.memory as f64,
            io_read_bytes: snapshot.read_bytes as f64,
            io_write_bytes: snapshot.written_bytes as f64,
            num_threads: threads as f64,
        })
    }
}

impl Iterator for TelemetrySampler {
    type Item = TelemetryReading;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if !self.primed && !self.prime() {
            self.finished = true;
            return None;
        }

        // cadence wait doubles as the cancellation point
        match self.stop.recv_timeout(self.interval) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                return None;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let reading = self.sample();
        if reading.is_none() {
            self.finished = true;
        }
        reading
    }
}

#[cfg(target_os = "linux")]
mod procfs {
    use std::fs;
    use std::time::Duration;

    pub const AVAILABLE: bool = true;

    /// utime + stime from `/proc/<pid>/stat`
    pub fn cpu_time(pid: u32) -> Option<Duration> {
        let contents = fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
        let ticks = parse_stat_cpu_ticks(&contents)?;
        Some(Duration::from_secs_f64(ticks as f64 / ticks_per_second()))
    }

    /// `Threads:` from `/proc/<pid>/status`
    pub fn thread_count(pid: u32) -> Option<usize> {
        let contents = fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
        parse_status_threads(&contents)
    }

    fn ticks_per_second() -> f64 {
        // SAFETY: sysconf has no preconditions
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        if ticks > 0 {
            ticks as f64
        } else {
            100.0
        }
    }

    /// The command name may itself contain spaces and parentheses, so fields
    /// are counted from the last `)`.
    pub(super) fn parse_stat_cpu_ticks(contents: &str) -> Option<u64> {
        let rest = &contents[contents.rfind(')')? + 1..];
        let mut fields = rest.split_whitespace().skip(11);
        let utime: u64 = fields.next()?.parse().ok()?;
        let stime: u64 = fields.next()?.parse().ok()?;
        Some(utime + stime)
    }

    pub(super) fn parse_status_threads(contents: &str) -> Option<usize> {
        contents
            .lines()
            .find_map(|line| line.strip_prefix("Threads:"))
            .and_then(|value| value.trim().parse().ok())
    }
}

#[cfg(not(target_os = "linux"))]
mod procfs {
    use std::time::Duration;

    pub const AVAILABLE: bool = false;

    pub fn cpu_time(_pid: u32) -> Option<Duration> {
        None
    }

    pub fn thread_count(_pid: u32) -> Option<usize> {
        None
    }
}
