use super::traits::ConfigSection;
use crate::error::SentryError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// JSON file of behavioral profile centroids
    pub profiles_path: PathBuf,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            profiles_path: PathBuf::from("artifacts/oracle/profiles.json"),
        }
    }
}

impl ConfigSection for OracleConfig {
    fn section_name() -> &'static str {
        "oracle"
    }

    fn validate(&self) -> Result<(), SentryError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub output_dir: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("artifacts/logs"),
        }
    }
}

impl ConfigSection for LedgerConfig {
    fn section_name() -> &'static str {
        "ledger"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(SentryError::Configuration(
                "Ledger output directory must be set".to_string()
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub freeze_threshold_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            freeze_threshold_secs: 300,
            check_interval_secs: 5,
        }
    }
}

impl WatchdogConfig {
    pub fn freeze_threshold(&self) -> Duration {
        Duration::from_secs(self.freeze_threshold_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

impl ConfigSection for WatchdogConfig {
    fn section_name() -> &'static str {
        "watchdog"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.check_interval_secs == 0 || self.freeze_threshold_secs < self.check_interval_secs {
            return Err(SentryError::Configuration(
                "Watchdog threshold must be at least one check interval".to_string()
            ));
        }
        Ok(())
    }
}
