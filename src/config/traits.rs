use crate::error::SentryError;
use serde::{Deserialize, Serialize};

/// Trait for configuration sections
pub trait ConfigSection: Serialize + for<'de> Deserialize<'de> + Default + Clone {
    fn section_name() -> &'static str;
    fn validate(&self) -> Result<(), SentryError>;
}

/// Inclusive `[min, max]` range used for uniform sampling
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformRange {
    pub min: f64,
    pub max: f64,
}

impl UniformRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> Result<(), SentryError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(SentryError::Configuration(format!(
                "{} range must satisfy min <= max, got [{}, {}]",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}
