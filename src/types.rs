use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metric names a policy rule may reference
pub const CPU_PERCENT_TOTAL: &str = "cpu_percent_total";
pub const MEMORY_RSS_BYTES: &str = "memory_rss_bytes";
pub const IO_READ_BYTES: &str = "io_read_bytes";
pub const IO_WRITE_BYTES: &str = "io_write_bytes";
pub const NUM_THREADS: &str = "num_threads";

pub const METRIC_NAMES: [&str; 5] = [
    CPU_PERCENT_TOTAL,
    MEMORY_RSS_BYTES,
    IO_READ_BYTES,
    IO_WRITE_BYTES,
    NUM_THREADS,
];

/// One resource-usage sample of a supervised process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReading {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent_total: f64,
    pub memory_rss_bytes: f64,
    pub io_read_bytes: f64,
    pub io_write_bytes: f64,
    pub num_threads: f64,
}

impl TelemetryReading {
    /// Reading synthesized when a target exits before it could be sampled
    pub fn zero_impact() -> Self {
        Self {
            timestamp: Utc::now(),
            cpu_percent_total: 0.0,
            memory_rss_bytes: 0.0,
            io_read_bytes: 0.0,
            io_write_bytes: 0.0,
            num_threads: 0.0,
        }
    }

    /// Look up a metric by its rule name. Unknown names yield `None`.
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            CPU_PERCENT_TOTAL => Some(self.cpu_percent_total),
            MEMORY_RSS_BYTES => Some(self.memory_rss_bytes),
            IO_READ_BYTES => Some(self.io_read_bytes),
            IO_WRITE_BYTES => Some(self.io_write_bytes),
            NUM_THREADS => Some(self.num_threads),
            _ => None,
        }
    }
}

/// Final disposition of one supervised run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Survived,
    Crashed,
    TimedOut,
    PolicyViolation,
    UnknownError,
}

impl RunOutcome {
    pub fn survived(&self) -> bool {
        matches!(self, RunOutcome::Survived)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Survived => "survived",
            RunOutcome::Crashed => "crashed",
            RunOutcome::TimedOut => "timed_out",
            RunOutcome::PolicyViolation => "policy_violation",
            RunOutcome::UnknownError => "unknown_error",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome plus the telemetry observed while the run was in flight
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub telemetry: Vec<TelemetryReading>,
    /// Policy state the run was in when it ended
    pub final_state: Option<String>,
}

impl RunReport {
    pub fn samples_observed(&self) -> usize {
        self.telemetry.len()
    }
}

/// Classifier verdict for a telemetry sequence.
///
/// `profile` is `None` when the oracle could not classify; it is written as
/// `-1` on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(with = "profile_sentinel")]
    pub profile: Option<u32>,
    #[serde(default)]
    pub confidence: BTreeMap<String, f64>,
}

impl Classification {
    pub fn inconclusive() -> Self {
        Self::default()
    }

    pub fn is_inconclusive(&self) -> bool {
        self.profile.is_none()
    }

    /// Probability assigned to `profile`, 0.0 when absent
    pub fn confidence_for(&self, profile: u32) -> f64 {
        self.confidence
            .get(&profile.to_string())
            .copied()
            .unwrap_or(0.0)
    }
}

/// Encodes an absent profile id as `-1`
pub mod profile_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(id) => serializer.serialize_i64(i64::from(*id)),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        let raw = i64::deserialize(deserializer)?;
        Ok(u32::try_from(raw).ok())
    }
}

/// Encodes an unscored fitness as `-9999`
pub mod fitness_sentinel {
    use serde::{Deserialize, Deserializer, Serializer};

    pub const UNSCORED: f64 = -9999.0;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.unwrap_or(UNSCORED))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(if raw == UNSCORED { None } else { Some(raw) })
    }
}

/// Lifecycle of one evolutionary search run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    Uninitialized,
    Calibrating,
    PopulationSeeded,
    Evaluating,
    Selecting,
    Mutating,
    Terminated,
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchPhase::Uninitialized => "uninitialized",
            SearchPhase::Calibrating => "calibration",
            SearchPhase::PopulationSeeded => "seeding",
            SearchPhase::Evaluating => "evaluation",
            SearchPhase::Selecting => "selection",
            SearchPhase::Mutating => "mutation",
            SearchPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_metric_is_absent() {
        let reading = TelemetryReading::zero_impact();
        assert_eq!(reading.metric(CPU_PERCENT_TOTAL), Some(0.0));
        assert_eq!(reading.metric("gpu_percent"), None);
    }

    #[test]
    fn inconclusive_profile_uses_minus_one_on_the_wire() {
        let json = serde_json::to_value(Classification::inconclusive()).unwrap();
        assert_eq!(json["profile"], serde_json::json!(-1));

        let parsed: Classification =
            serde_json::from_str(r#"{"profile": 2, "confidence": {"2": 0.9}}"#).unwrap();
        assert_eq!(parsed.profile, Some(2));
        assert!((parsed.confidence_for(2) - 0.9).abs() < 1e-12);
        assert_eq!(parsed.confidence_for(3), 0.0);

        let unknown: Classification = serde_json::from_str(r#"{"profile": -1}"#).unwrap();
        assert!(unknown.is_inconclusive());
    }
}
