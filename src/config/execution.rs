use super::traits::ConfigSection;
use crate::engines::execution::sandbox::{TargetSpec, Workloads};
use crate::error::SentryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Seconds before a supervised run is forcibly killed
    pub timeout_secs: f64,
    /// Nominal sampler cadence; 50 ms is about 20 Hz
    pub sample_interval_ms: u64,
    /// Upper bound on waiting for the monitor thread after the child is reaped
    pub monitor_join_grace_ms: u64,
    /// How often the supervisor checks the child for exit
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5.0,
            sample_interval_ms: 50,
            monitor_join_grace_ms: 1000,
            poll_interval_ms: 5,
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn monitor_join_grace(&self) -> Duration {
        Duration::from_millis(self.monitor_join_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ConfigSection for ExecutionConfig {
    fn section_name() -> &'static str {
        "execution"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if !(self.timeout_secs.is_finite() && self.timeout_secs > 0.0) {
            return Err(SentryError::Configuration(
                "Run timeout must be a positive number of seconds".to_string()
            ));
        }
        if self.sample_interval_ms == 0 || self.poll_interval_ms == 0 {
            return Err(SentryError::Configuration(
                "Sample and poll intervals must be positive".to_string()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("data/temp/sentinel_target.out"),
            args: Vec::new(),
            working_dir: None,
        }
    }
}

impl TargetConfig {
    pub fn to_spec(&self) -> TargetSpec {
        TargetSpec {
            program: self.program.clone(),
            args: self.args.clone(),
            working_dir: self.working_dir.clone(),
        }
    }
}

impl ConfigSection for TargetConfig {
    fn section_name() -> &'static str {
        "target"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.program.as_os_str().is_empty() {
            return Err(SentryError::Configuration(
                "Target program must be set".to_string()
            ));
        }
        Ok(())
    }
}

/// Payloads are given inline or read from a file; a file wins when both are set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub benign_payload: Option<String>,
    pub benign_file: Option<PathBuf>,
    pub malicious_payload: Option<String>,
    pub malicious_file: Option<PathBuf>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            benign_payload: Some(r#"{"name": "COSMOS"}"#.to_string()),
            benign_file: None,
            malicious_payload: Some("A".repeat(512)),
            malicious_file: None,
        }
    }
}

impl WorkloadConfig {
    pub fn resolve(&self) -> Result<Workloads, SentryError> {
        Ok(Workloads {
            benign: load_payload("benign", &self.benign_payload, &self.benign_file)?,
            malicious: load_payload("malicious", &self.malicious_payload, &self.malicious_file)?,
        })
    }
}

fn load_payload(
    name: &str,
    inline: &Option<String>,
    file: &Option<PathBuf>,
) -> Result<Vec<u8>, SentryError> {
    match (file, inline) {
        (Some(path), _) => std::fs::read(path).map_err(|e| {
            SentryError::Configuration(format!(
                "Failed to read {} payload from {}: {}",
                name,
                path.display(),
                e
            ))
        }),
        (None, Some(text)) => Ok(text.as_bytes().to_vec()),
        (None, None) => Err(SentryError::Configuration(format!(
            "No {} payload configured",
            name
        ))),
    }
}

impl ConfigSection for WorkloadConfig {
    fn section_name() -> &'static str {
        "workloads"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.benign_payload.is_none() && self.benign_file.is_none() {
            return Err(SentryError::Configuration(
                "A benign workload is required".to_string()
            ));
        }
        if self.malicious_payload.is_none() && self.malicious_file.is_none() {
            return Err(SentryError::Configuration(
                "A malicious workload is required".to_string()
            ));
        }
        Ok(())
    }
}
