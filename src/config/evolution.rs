use super::traits::ConfigSection;
use crate::error::SentryError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population_size: usize,
    pub generations: usize,
    pub elitism_count: usize,
    pub mutation_rate: f64,
    pub mutation_strength: f64,
    /// Reserved for structural recombination; validated but not exercised
    pub crossover_rate: f64,
    pub tournament_size: usize,
    pub hall_of_fame_size: usize,
    pub seed: Option<u64>,
    /// Evaluation worker threads; defaults to available parallelism
    pub workers: Option<usize>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 10,
            elitism_count: 2,
            mutation_rate: 0.9,
            mutation_strength: 0.2,
            crossover_rate: 0.7,
            tournament_size: 5,
            hall_of_fame_size: 10,
            seed: None,
            workers: None,
        }
    }
}

impl EvolutionConfig {
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

impl ConfigSection for EvolutionConfig {
    fn section_name() -> &'static str {
        "evolution"
    }

    fn validate(&self) -> Result<(), SentryError> {
        if self.population_size == 0 {
            return Err(SentryError::Configuration(
                "Population size must be at least 1".to_string()
            ));
        }
        if self.generations == 0 {
            return Err(SentryError::Configuration(
                "Generations must be at least 1".to_string()
            ));
        }
        if self.elitism_count > self.population_size {
            return Err(SentryError::Configuration(
                "Elitism count cannot exceed population size".to_string()
            ));
        }
        if self.mutation_rate < 0.0 || self.mutation_rate > 1.0 {
            return Err(SentryError::Configuration(
                "Mutation rate must be between 0 and 1".to_string()
            ));
        }
        if self.mutation_strength < 0.0 || self.mutation_strength >= 1.0 {
            return Err(SentryError::Configuration(
                "Mutation strength must be in [0, 1)".to_string()
            ));
        }
        if self.crossover_rate < 0.0 || self.crossover_rate > 1.0 {
            return Err(SentryError::Configuration(
                "Crossover rate must be between 0 and 1".to_string()
            ));
        }
        if self.tournament_size == 0 {
            return Err(SentryError::Configuration(
                "Tournament size must be at least 1".to_string()
            ));
        }
        if self.workers == Some(0) {
            return Err(SentryError::Configuration(
                "Worker count must be at least 1".to_string()
            ));
        }
        Ok(())
    }
}
