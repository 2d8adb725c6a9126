//! Stall detection for the search loop.
//!
//! Evaluation workers beat a shared [`Heartbeat`] after every completed
//! evaluation. A [`Watchdog`] thread checks its age at a fixed interval and
//! hands a [`StallReport`] to the stall handler once the heartbeat is older
//! than the freeze threshold.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Beat {
    at: Instant,
    status: String,
}

/// Time and description of the last unit of progress
pub struct Heartbeat {
    last: Mutex<Beat>,
}

impl Heartbeat {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            last: Mutex::new(Beat {
                at: Instant::now(),
                status: status.into(),
            }),
        }
    }

    pub fn beat(&self, status: impl Into<String>) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        last.at = Instant::now();
        last.status = status.into();
    }

    /// Age of the last beat and its status line
    pub fn last(&self) -> (Duration, String) {
        let last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        (last.at.elapsed(), last.status.clone())
    }
}

#[derive(Debug, Clone)]
pub struct StallReport {
    pub silent_for: Duration,
    pub last_status: String,
}

pub type StallHandler = Arc<dyn Fn(&StallReport) + Send + Sync>;

/// Background checker; stops when dropped
pub struct Watchdog {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    pub fn spawn(
        heartbeat: Arc<Heartbeat>,
        freeze_threshold: Duration,
        check_interval: Duration,
        on_stall: StallHandler,
    ) -> std::io::Result<Self> {
        let (stop_tx, stop_rx) = channel::<()>();
        let handle = thread::Builder::new()
            .name("sentry-watchdog".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(check_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }
                let (silent_for, last_status) = heartbeat.last();
                if silent_for > freeze_threshold {
                    log::error!(
                        "No progress for {:.1}s (threshold {:.1}s). Last status: {}",
                        silent_for.as_secs_f64(),
                        freeze_threshold.as_secs_f64(),
                        last_status
                    );
                    on_stall(&StallReport {
                        silent_for,
                        last_status,
                    });
                    return;
                }
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("watchdog thread panicked");
            }
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
