use super::traits::{ConfigSection, UniformRange};
use crate::error::SentryError;
use serde::{Deserialize, Serialize};

/// Ranges initial policy thresholds are drawn from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingConfig {
    pub cpu_percent: UniformRange,
    pub memory_rss_bytes: UniformRange,
    pub io_read_bytes: UniformRange,
    pub num_threads: UniformRange,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            cpu_percent: UniformRange::new(5.0, 50.0),
            memory_rss_bytes: UniformRange::new(8.0 * 1024.0 * 1024.0, 512.0 * 1024.0 * 1024.0),
            io_read_bytes: UniformRange::new(4096.0, 16.0 * 1024.0 * 1024.0),
            num_threads: UniformRange::new(2.0, 64.0),
        }
    }
}

impl ConfigSection for SeedingConfig {
    fn section_name() -> &'static str {
        "seeding"
    }

    fn validate(&self) -> Result<(), SentryError> {
        self.cpu_percent.validate("cpu_percent")?;
        self.memory_rss_bytes.validate("memory_rss_bytes")?;
        self.io_read_bytes.validate("io_read_bytes")?;
        self.num_threads.validate("num_threads")?;
        Ok(())
    }
}
