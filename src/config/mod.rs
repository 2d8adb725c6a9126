pub mod traits;
pub mod evolution;
pub mod execution;
pub mod fitness;
pub mod seeding;
pub mod services;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use evolution::EvolutionConfig;
pub use execution::{ExecutionConfig, TargetConfig, WorkloadConfig};
pub use fitness::FitnessConfig;
pub use seeding::SeedingConfig;
pub use services::{LedgerConfig, OracleConfig, WatchdogConfig};
pub use traits::{ConfigSection, UniformRange};
