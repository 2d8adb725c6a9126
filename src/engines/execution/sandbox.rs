//! Supervised execution of a target under a candidate policy.
//!
//! One run owns two threads of control. The calling thread supervises the
//! child process: it feeds the payload, polls for exit and enforces the
//! timeout. A monitor thread owns the [`TelemetrySampler`] and the
//! [`PolicyMachine`]; it streams readings back and reports a violation the
//! moment one fires. Closing the stop channel is the only teardown signal.

use crate::config::ExecutionConfig;
use crate::engines::execution::policy::{Decision, PolicyMachine};
use crate::engines::execution::sampler::TelemetrySampler;
use crate::engines::generation::genome::Genome;
use crate::types::{RunOutcome, RunReport, TelemetryReading};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How to launch the supervised program
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl TargetSpec {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }
        command
    }
}

/// The representative benign and malicious inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workloads {
    pub benign: Vec<u8>,
    pub malicious: Vec<u8>,
}

/// Something that can run a genome against one payload.
///
/// Evaluation workers each build their own runner.
pub trait GenomeRunner {
    fn run(&mut self, payload: &[u8], genome: &Genome) -> RunReport;
}

/// Builds one runner per evaluation worker
pub trait RunnerFactory: Send + Sync {
    type Runner: GenomeRunner;

    fn create_runner(&self) -> Self::Runner;
}

enum MonitorEvent {
    Reading(TelemetryReading),
    Violation { state: String },
    Finished { final_state: String },
}

/// Kills and reaps the child on every exit path
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        if let Err(e) = self.child.kill() {
            log::debug!("kill of pid {} failed: {}", self.child.id(), e);
        }
        if let Err(e) = self.child.wait() {
            log::warn!("reaping pid {} failed: {}", self.child.id(), e);
        }
        self.reaped = true;
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Stops the monitor on every exit path. Joining is bounded by the grace
/// period; a monitor that misses it is detached.
struct MonitorGuard {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorGuard {
    fn signal_stop(&mut self) {
        self.stop.take();
    }

    fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("telemetry monitor thread panicked");
            }
        }
    }

    fn detach(&mut self) {
        self.handle.take();
    }
}

impl Drop for MonitorGuard {
    fn drop(&mut self) {
        self.signal_stop();
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

/// Everything the supervisor has learned from the monitor so far
struct Observations {
    telemetry: Vec<TelemetryReading>,
    violation: Option<String>,
    final_state: Option<String>,
    monitor_done: bool,
}

impl Observations {
    fn new(initial_state: Option<String>, monitor_done: bool) -> Self {
        Self {
            telemetry: Vec::new(),
            violation: None,
            final_state: initial_state,
            monitor_done,
        }
    }

    fn absorb(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Reading(reading) => self.telemetry.push(reading),
            MonitorEvent::Violation { state } => {
                self.final_state = Some(state.clone());
                self.violation.get_or_insert(state);
            }
            MonitorEvent::Finished { final_state } => {
                self.final_state = Some(final_state);
                self.monitor_done = true;
            }
        }
    }
}

enum Termination {
    Exited(ExitStatus),
    Violation(String),
    TimedOut,
    Failed(std::io::Error),
}

#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    target: TargetSpec,
    settings: ExecutionConfig,
}

impl ExecutionEngine {
    pub fn new(target: TargetSpec, settings: ExecutionConfig) -> Self {
        Self { target, settings }
    }

    pub fn target(&self) -> &TargetSpec {
        &self.target
    }

    pub fn settings(&self) -> &ExecutionConfig {
        &self.settings
    }

    /// Run `target` with `payload` on stdin under `genome`, bounded by `timeout`.
    ///
    /// Always returns a report: failures of the target or of the engine are
    /// outcomes. The child is reaped and the monitor stopped before return,
    /// and the telemetry is never empty.
    pub fn instrumented_run(
        &self,
        target: &TargetSpec,
        payload: &[u8],
        genome: &Genome,
        timeout: Duration,
    ) -> RunReport {
        let mut report = match genome.validate() {
            Ok(()) => self.supervise(target, payload, genome, timeout),
            Err(e) => {
                log::warn!("refusing to run invalid genome: {}", e);
                RunReport {
                    outcome: RunOutcome::UnknownError,
                    telemetry: Vec::new(),
                    final_state: None,
                }
            }
        };

        if report.telemetry.is_empty() {
            report.telemetry.push(TelemetryReading::zero_impact());
        }
        log::debug!(
            "run of {} finished: {} after {} samples",
            target.program.display(),
            report.outcome,
            report.telemetry.len()
        );
        report
    }

    fn supervise(&self, target: &TargetSpec, payload: &[u8], genome: &Genome, timeout: Duration) -> RunReport {
        let child = match target.command().spawn() {
            Ok(child) => child,
            Err(e) => {
                log::warn!("failed to spawn {}: {}", target.program.display(), e);
                return RunReport {
                    outcome: RunOutcome::UnknownError,
                    telemetry: Vec::new(),
                    final_state: None,
                };
            }
        };
        let mut child = ChildGuard { child, reaped: false };
        let writer = spawn_payload_writer(&mut child.child, payload);

        let (stop_tx, stop_rx) = channel();
        let (event_tx, event_rx) = channel();
        let mut monitor = MonitorGuard {
            stop: Some(stop_tx),
            handle: spawn_monitor(
                child.pid(),
                self.settings.sample_interval(),
                genome.clone(),
                stop_rx,
                event_tx,
            ),
        };

        let mut observed = Observations::new(genome.initial_state.clone(), monitor.handle.is_none());
        let deadline = Instant::now() + timeout;

        let termination = loop {
            if observed.monitor_done {
                thread::sleep(self.settings.poll_interval());
            } else {
                match event_rx.recv_timeout(self.settings.poll_interval()) {
                    Ok(event) => observed.absorb(event),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => observed.monitor_done = true,
                }
            }

            if let Some(state) = &observed.violation {
                break Termination::Violation(state.clone());
            }
            match child.try_wait() {
                Ok(Some(status)) => break Termination::Exited(status),
                Ok(None) => {}
                Err(e) => break Termination::Failed(e),
            }
            if Instant::now() >= deadline {
                break Termination::TimedOut;
            }
        };

        child.terminate();
        monitor.signal_stop();

        if drain_monitor(&event_rx, self.settings.monitor_join_grace(), &mut observed) {
            monitor.join();
        } else {
            log::warn!(
                "telemetry monitor for pid {} missed its join grace period; detaching",
                child.pid()
            );
            monitor.detach();
        }

        if let Some(handle) = writer {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }

        let outcome = resolve_outcome(&termination, observed.violation.is_some());
        match &termination {
            Termination::Violation(state) => {
                log::debug!("policy violation in state '{}' killed pid {}", state, child.pid())
            }
            Termination::Failed(e) => log::warn!("lost track of pid {}: {}", child.pid(), e),
            _ => {}
        }

        RunReport {
            outcome,
            telemetry: observed.telemetry,
            final_state: observed.final_state,
        }
    }
}

impl GenomeRunner for ExecutionEngine {
    fn run(&mut self, payload: &[u8], genome: &Genome) -> RunReport {
        self.instrumented_run(&self.target, payload, genome, self.settings.timeout())
    }
}

impl RunnerFactory for ExecutionEngine {
    type Runner = ExecutionEngine;

    fn create_runner(&self) -> Self::Runner {
        self.clone()
    }
}

/// policy_violation > timed_out > crashed > survived; engine failures are unknown_error
fn resolve_outcome(termination: &Termination, violated: bool) -> RunOutcome {
    if violated {
        return RunOutcome::PolicyViolation;
    }
    match termination {
        Termination::Violation(_) => RunOutcome::PolicyViolation,
        Termination::TimedOut => RunOutcome::TimedOut,
        Termination::Exited(status) if status.success() => RunOutcome::Survived,
        Termination::Exited(_) => RunOutcome::Crashed,
        Termination::Failed(_) => RunOutcome::UnknownError,
    }
}

/// Wait up to `grace` for the monitor to report it has finished, keeping
/// whatever it sends on the way. Returns whether it finished in time.
fn drain_monitor(events: &Receiver<MonitorEvent>, grace: Duration, observed: &mut Observations) -> bool {
    let grace_deadline = Instant::now() + grace;
    while !observed.monitor_done {
        let remaining = grace_deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => observed.absorb(event),
            Err(RecvTimeoutError::Disconnected) => observed.monitor_done = true,
            Err(RecvTimeoutError::Timeout) => break,
        }
    }
    observed.monitor_done
}

fn spawn_payload_writer(child: &mut Child, payload: &[u8]) -> Option<JoinHandle<()>> {
    let mut stdin = child.stdin.take()?;
    let payload = payload.to_vec();
    let spawned = thread::Builder::new()
        .name("sentry-stdin".to_string())
        .spawn(move || {
            // the target may exit or be killed before reading everything
            if let Err(e) = stdin.write_all(&payload) {
                log::debug!("payload write ended early: {}", e);
            }
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("failed to start payload writer: {}", e);
            None
        }
    }
}

fn spawn_monitor(
    pid: u32,
    interval: Duration,
    genome: Genome,
    stop: Receiver<()>,
    events: Sender<MonitorEvent>,
) -> Option<JoinHandle<()>> {
    let spawned = thread::Builder::new()
        .name(format!("sentry-monitor-{}", pid))
        .spawn(move || {
            let sampler = TelemetrySampler::attach(pid, interval, stop);
            let mut machine = PolicyMachine::new(genome);
            for reading in sampler {
                let decision = machine.step(&reading);
                if events.send(MonitorEvent::Reading(reading)).is_err() {
                    break;
                }
                if let Decision::Violation { state } = decision {
                    let _ = events.send(MonitorEvent::Violation { state });
                    break;
                }
            }
            let _ = events.send(MonitorEvent::Finished {
                final_state: machine.current_state().to_string(),
            });
        });
    match spawned {
        Ok(handle) => Some(handle),
        Err(e) => {
            log::warn!("failed to start telemetry monitor: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_priority() {
        assert_eq!(
            resolve_outcome(&Termination::TimedOut, true),
            RunOutcome::PolicyViolation
        );
        assert_eq!(resolve_outcome(&Termination::TimedOut, false), RunOutcome::TimedOut);
        assert_eq!(
            resolve_outcome(
                &Termination::Failed(std::io::Error::new(std::io::ErrorKind::Other, "gone")),
                false
            ),
            RunOutcome::UnknownError
        );
    }

    #[test]
    fn test_spawn_failure_is_unknown_error_with_telemetry() {
        let engine = ExecutionEngine::new(
            TargetSpec::new("/nonexistent/definitely-not-a-target"),
            ExecutionConfig::default(),
        );
        let report = engine.instrumented_run(
            engine.target(),
            b"{}",
            &Genome::permissive(),
            Duration::from_secs(1),
        );
        assert_eq!(report.outcome, RunOutcome::UnknownError);
        assert_eq!(report.telemetry.len(), 1);
    }

    #[test]
    fn test_invalid_genome_is_not_run() {
        let engine = ExecutionEngine::new(TargetSpec::new("/bin/true"), ExecutionConfig::default());
        let mut genome = Genome::permissive();
        genome.initial_state = Some("missing".to_string());
        let report = engine.instrumented_run(engine.target(), b"", &genome, Duration::from_secs(1));
        assert_eq!(report.outcome, RunOutcome::UnknownError);
    }

    #[test]
    fn test_stuck_monitor_is_abandoned_after_grace() {
        let (event_tx, event_rx) = channel();
        let (stop_tx, stop_rx) = channel::<()>();
        // sends one reading, then hangs on to its sender well past the grace period
        let stuck = thread::spawn(move || {
            let _ = event_tx.send(MonitorEvent::Reading(TelemetryReading::zero_impact()));
            let _ = stop_rx.recv_timeout(Duration::from_secs(3));
            drop(event_tx);
        });
        let mut monitor = MonitorGuard {
            stop: None,
            handle: Some(stuck),
        };

        let mut observed = Observations::new(Some("idle".to_string()), false);
        let started = Instant::now();
        let finished = drain_monitor(&event_rx, Duration::from_millis(100), &mut observed);

        assert!(!finished);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(observed.telemetry.len(), 1);
        assert_eq!(observed.final_state.as_deref(), Some("idle"));

        monitor.detach();
        assert!(monitor.handle.is_none());
        drop(monitor);
        drop(stop_tx);
    }

    #[test]
    fn test_finished_monitor_is_drained_within_grace() {
        let (event_tx, event_rx) = channel();
        event_tx.send(MonitorEvent::Reading(TelemetryReading::zero_impact())).unwrap();
        event_tx
            .send(MonitorEvent::Finished {
                final_state: "alert".to_string(),
            })
            .unwrap();

        let mut observed = Observations::new(None, false);
        assert!(drain_monitor(&event_rx, Duration::from_secs(1), &mut observed));
        assert_eq!(observed.telemetry.len(), 1);
        assert_eq!(observed.final_state.as_deref(), Some("alert"));
    }
}
