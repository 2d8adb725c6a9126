//! Behavioral classification of telemetry sequences.
//!
//! The search only depends on [`BehavioralOracle`]. [`CentroidOracle`] is a
//! small nearest-centroid classifier over the statistical fingerprint of a
//! run; any trained model can stand in for it.

use crate::error::{Result, SentryError};
use crate::types::{Classification, TelemetryReading, METRIC_NAMES};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Maps a telemetry sequence to a behavioral profile.
///
/// Implementations must not fail: anything they cannot classify is
/// reported as [`Classification::inconclusive`].
pub trait BehavioralOracle: Send + Sync {
    fn analyze(&self, telemetry: &[TelemetryReading]) -> Classification;
}

/// Per-metric mean, std, max, median and p95 of a telemetry sequence.
///
/// Keys look like `cpu_percent_total_mean`. An empty sequence yields zeros.
pub fn fingerprint(telemetry: &[TelemetryReading]) -> BTreeMap<String, f64> {
    let mut features = BTreeMap::new();
    for metric in METRIC_NAMES {
        let mut values: Vec<f64> = telemetry
            .iter()
            .filter_map(|r| r.metric(metric))
            .filter(|v| v.is_finite())
            .collect();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        features.insert(format!("{}_mean", metric), mean(&values));
        features.insert(format!("{}_std", metric), sample_std(&values));
        features.insert(format!("{}_max", metric), values.last().copied().unwrap_or(0.0));
        features.insert(format!("{}_median", metric), quantile(&values, 0.5));
        features.insert(format!("{}_p95", metric), quantile(&values, 0.95));
    }
    features
}

/// Mean CPU utilization of a run, the performance overhead measure
pub fn mean_cpu(telemetry: &[TelemetryReading]) -> f64 {
    let values: Vec<f64> = telemetry.iter().map(|r| r.cpu_percent_total).collect();
    mean(&values)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Linear-interpolated quantile over sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileCentroid {
    pub id: u32,
    pub features: BTreeMap<String, f64>,
}

/// Serialized nearest-centroid model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    /// Features used for distance; empty means every fingerprint feature
    #[serde(default)]
    pub features: Vec<String>,
    /// Per-feature divisor applied before distance; missing means 1.0
    #[serde(default)]
    pub scales: BTreeMap<String, f64>,
    pub profiles: Vec<ProfileCentroid>,
}

pub struct CentroidOracle {
    model: Option<CentroidModel>,
}

impl CentroidOracle {
    pub fn from_model(model: CentroidModel) -> Self {
        Self { model: Some(model) }
    }

    /// Oracle with no model; every query is inconclusive
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SentryError::Oracle(format!("Failed to read model {}: {}", path.display(), e))
        })?;
        let model: CentroidModel = serde_json::from_str(&contents)?;
        if model.profiles.is_empty() {
            return Err(SentryError::Oracle(format!(
                "Model {} defines no profiles",
                path.display()
            )));
        }
        log::info!(
            "Oracle model loaded from {} ({} profiles)",
            path.display(),
            model.profiles.len()
        );
        Ok(Self::from_model(model))
    }

    /// Load the model, or fall back to an unavailable oracle with a warning
    pub fn load_or_unavailable<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(oracle) => oracle,
            Err(e) => {
                log::warn!("Oracle unavailable, profiling disabled: {}", e);
                Self::unavailable()
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_some()
    }

    fn distance(model: &CentroidModel, fp: &BTreeMap<String, f64>, centroid: &ProfileCentroid) -> f64 {
        let keys: Vec<&String> = if model.features.is_empty() {
            centroid.features.keys().collect()
        } else {
            model.features.iter().collect()
        };
        keys.iter()
            .map(|key| {
                let observed = fp.get(key.as_str()).copied().unwrap_or(0.0);
                let expected = centroid.features.get(key.as_str()).copied().unwrap_or(0.0);
                let scale = model
                    .scales
                    .get(key.as_str())
                    .copied()
                    .filter(|s| *s > 0.0)
                    .unwrap_or(1.0);
                ((observed - expected) / scale).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }
}

impl BehavioralOracle for CentroidOracle {
    fn analyze(&self, telemetry: &[TelemetryReading]) -> Classification {
        let model = match &self.model {
            Some(model) if !model.profiles.is_empty() => model,
            _ => return Classification::inconclusive(),
        };
        if telemetry.is_empty() {
            return Classification::inconclusive();
        }

        let fp = fingerprint(telemetry);
        let distances: Vec<(u32, f64)> = model
            .profiles
            .iter()
            .map(|p| (p.id, Self::distance(model, &fp, p)))
            .collect();
        if distances.iter().any(|(_, d)| !d.is_finite()) {
            log::warn!("Oracle could not classify telemetry: non-finite distance");
            return Classification::inconclusive();
        }

        // softmax over negative distances, shifted for stability
        let nearest = distances
            .iter()
            .map(|(_, d)| *d)
            .fold(f64::INFINITY, f64::min);
        let weights: Vec<(u32, f64)> = distances
            .iter()
            .map(|(id, d)| (*id, (nearest - d).exp()))
            .collect();
        let total: f64 = weights.iter().map(|(_, w)| w).sum();

        let mut confidence = BTreeMap::new();
        for (id, w) in &weights {
            *confidence.entry(id.to_string()).or_insert(0.0) += w / total;
        }
        let profile = distances
            .iter()
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(id, _)| *id);

        Classification { profile, confidence }
    }
}
