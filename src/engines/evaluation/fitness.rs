use crate::config::FitnessConfig;
use crate::engines::evaluation::oracle::{mean_cpu, BehavioralOracle};
use crate::engines::generation::genome::Genome;
use crate::types::{Classification, RunReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const CORRECTNESS: &str = "correctness";
pub const SECURITY: &str = "security";
pub const PERFORMANCE_PENALTY: &str = "performance_penalty";
pub const ELEGANCE_PENALTY: &str = "elegance_penalty";

/// Total fitness with every term that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitnessReport {
    pub fitness: f64,
    pub breakdown: BTreeMap<String, f64>,
    pub benign_classification: Classification,
    pub attack_classification: Classification,
}

impl FitnessReport {
    pub fn term(&self, name: &str) -> f64 {
        self.breakdown.get(name).copied().unwrap_or(0.0)
    }
}

/// Scores a genome from one benign and one attack run
pub struct FitnessEvaluator {
    config: FitnessConfig,
    normal_profile: u32,
}

impl FitnessEvaluator {
    pub fn new(config: FitnessConfig, normal_profile: u32) -> Self {
        Self {
            config,
            normal_profile,
        }
    }

    pub fn normal_profile(&self) -> u32 {
        self.normal_profile
    }

    pub fn score(
        &self,
        benign_run: &RunReport,
        attack_run: &RunReport,
        genome: &Genome,
        oracle: &dyn BehavioralOracle,
    ) -> FitnessReport {
        let benign_class = oracle.analyze(&benign_run.telemetry);
        let attack_class = oracle.analyze(&attack_run.telemetry);
        if benign_class.is_inconclusive() {
            log::debug!("oracle inconclusive on benign run; correctness falls to penalty");
        }
        self.score_classified(benign_run, benign_class, attack_run, attack_class, genome)
    }

    /// Scoring once both runs have been classified
    pub fn score_classified(
        &self,
        benign_run: &RunReport,
        benign_class: Classification,
        attack_run: &RunReport,
        attack_class: Classification,
        genome: &Genome,
    ) -> FitnessReport {
        let correctness = self.correctness(benign_run, &benign_class);
        let security = self.security(attack_run, &attack_class);

        let (performance, elegance) = if correctness > 0.0 {
            let cpu = mean_cpu(&benign_run.telemetry).max(0.0);
            let elegance = genome.complexity() as f64 / self.config.elegance_divisor;
            (
                -self.performance_penalty(cpu),
                -elegance.min(self.config.max_elegance_penalty),
            )
        } else {
            (0.0, 0.0)
        };

        let mut breakdown = BTreeMap::new();
        breakdown.insert(CORRECTNESS.to_string(), correctness);
        breakdown.insert(SECURITY.to_string(), security);
        breakdown.insert(PERFORMANCE_PENALTY.to_string(), performance);
        breakdown.insert(ELEGANCE_PENALTY.to_string(), elegance);

        FitnessReport {
            fitness: correctness + security + performance + elegance,
            breakdown,
            benign_classification: benign_class,
            attack_classification: attack_class,
        }
    }

    /// `cpu^exponent` up to half the bound, then a saturating tail with the
    /// same slope at the knee. Strictly increasing in `cpu` and never above
    /// `max_performance_penalty`.
    fn performance_penalty(&self, cpu: f64) -> f64 {
        let raw = cpu.powf(self.config.cpu_penalty_exponent);
        let knee = self.config.max_performance_penalty / 2.0;
        if raw <= knee {
            raw
        } else {
            knee + knee * (1.0 - (-(raw - knee) / knee).exp())
        }
    }

    fn correctness(&self, benign_run: &RunReport, class: &Classification) -> f64 {
        if benign_run.outcome.survived() && class.profile == Some(self.normal_profile) {
            let confidence = class.confidence_for(self.normal_profile);
            self.config.correctness_scale * confidence * confidence
        } else {
            self.config.false_positive_penalty
        }
    }

    fn security(&self, attack_run: &RunReport, class: &Classification) -> f64 {
        let anomalous = matches!(class.profile, Some(p) if p != self.normal_profile);
        if !attack_run.outcome.survived() || anomalous {
            // a run always has at least one reading
            let samples = attack_run.samples_observed().max(1);
            self.config.security_reward / (1.0 + samples as f64)
        } else {
            self.config.false_negative_penalty
        }
    }
}
