use super::{
    evolution::EvolutionConfig,
    execution::{ExecutionConfig, TargetConfig, WorkloadConfig},
    fitness::FitnessConfig,
    seeding::SeedingConfig,
    services::{LedgerConfig, OracleConfig, WatchdogConfig},
    traits::ConfigSection,
};
use crate::error::SentryError;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Environment overrides look like `SENTRY_EVOLUTION__POPULATION_SIZE=40`
pub const ENV_PREFIX: &str = "SENTRY";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub evolution: EvolutionConfig,
    pub execution: ExecutionConfig,
    pub target: TargetConfig,
    pub workloads: WorkloadConfig,
    pub fitness: FitnessConfig,
    pub seeding: SeedingConfig,
    pub oracle: OracleConfig,
    pub ledger: LedgerConfig,
    pub watchdog: WatchdogConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), SentryError> {
        self.evolution.validate()?;
        self.execution.validate()?;
        self.target.validate()?;
        self.workloads.validate()?;
        self.fitness.validate()?;
        self.seeding.validate()?;
        self.oracle.validate()?;
        self.ledger.validate()?;
        self.watchdog.validate()?;
        Ok(())
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(AppConfig::default())),
        }
    }

    /// Layer an optional TOML/JSON file and `SENTRY_*` environment variables
    /// over the defaults.
    pub fn load(&self, path: Option<&Path>) -> Result<(), SentryError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| SentryError::Configuration(format!("Failed to read config: {}", e)))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| SentryError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SentryError> {
        self.load(Some(path.as_ref()))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), SentryError> {
        let config = self.get();
        let toml_str = toml::to_string_pretty(&config)
            .map_err(|e| SentryError::Configuration(format!("Failed to serialize: {}", e)))?;

        std::fs::write(path, toml_str)
            .map_err(|e| SentryError::Configuration(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn update<F>(&self, f: F) -> Result<(), SentryError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut candidate = self.get();
        f(&mut candidate);
        candidate.validate()?;
        *self.config.write().unwrap_or_else(|e| e.into_inner()) = candidate;
        Ok(())
    }
}
