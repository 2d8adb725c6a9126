use super::traits::ConfigSection;
use crate::error::SentryError;
use serde::{Deserialize, Serialize};

/// Weights of the multi-term fitness function
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Correctness reward is `correctness_scale * confidence^2`
    pub correctness_scale: f64,
    pub false_positive_penalty: f64,
    /// `K` in `K / (1 + samples_observed)`
    pub security_reward: f64,
    pub false_negative_penalty: f64,
    pub cpu_penalty_exponent: f64,
    /// Elegance penalty is `-(complexity / elegance_divisor)`
    pub elegance_divisor: f64,
    /// Bound on the performance penalty. `cpu^exponent` is used as is up to
    /// half of this and bends smoothly toward it above.
    pub max_performance_penalty: f64,
    pub max_elegance_penalty: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            correctness_scale: 500.0,
            false_positive_penalty: -2000.0,
            security_reward: 1000.0,
            false_negative_penalty: -1000.0,
            cpu_penalty_exponent: 1.5,
            elegance_divisor: 50.0,
            max_performance_penalty: 400.0,
            max_elegance_penalty: 50.0,
        }
    }
}

impl ConfigSection for FitnessConfig {
    fn section_name() -> &'static str {
        "fitness"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.correctness_scale <= 0.0 || self.security_reward <= 0.0 {
            return Err(SentryError::Configuration(
                "Correctness scale and security reward must be positive".to_string()
            ));
        }
        // a false positive must outweigh the best the other terms can give
        if self.false_positive_penalty + self.security_reward >= 0.0 {
            return Err(SentryError::Configuration(
                "False-positive penalty must dominate the security reward".to_string()
            ));
        }
        if self.false_negative_penalty >= 0.0 {
            return Err(SentryError::Configuration(
                "False-negative penalty must be negative".to_string()
            ));
        }
        if self.cpu_penalty_exponent <= 1.0 {
            return Err(SentryError::Configuration(
                "CPU penalty exponent must be greater than 1".to_string()
            ));
        }
        if self.elegance_divisor <= 0.0 {
            return Err(SentryError::Configuration(
                "Elegance divisor must be positive".to_string()
            ));
        }
        if self.max_performance_penalty <= 0.0 || self.max_elegance_penalty <= 0.0 {
            return Err(SentryError::Configuration(
                "Performance and elegance penalty bounds must be positive".to_string()
            ));
        }
        // worst correct genome must still outrank the best false positive;
        // every run has at least one reading, so security tops out at half its reward
        let worst_correct =
            self.false_negative_penalty - self.max_performance_penalty - self.max_elegance_penalty;
        let best_false_positive = self.false_positive_penalty + self.security_reward / 2.0;
        if worst_correct <= best_false_positive {
            return Err(SentryError::Configuration(format!(
                "Penalty bounds too loose: a correct genome could score {} against {} for a false positive",
                worst_correct, best_false_positive
            )));
        }
        Ok(())
    }
}
