pub mod fitness;
pub mod oracle;

pub use fitness::{FitnessEvaluator, FitnessReport};
pub use oracle::{fingerprint, BehavioralOracle, CentroidModel, CentroidOracle, ProfileCentroid};
