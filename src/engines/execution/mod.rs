pub mod policy;
pub mod sampler;
pub mod sandbox;

pub use policy::{evaluate, Decision, PolicyMachine};
pub use sampler::TelemetrySampler;
pub use sandbox::{ExecutionEngine, GenomeRunner, RunnerFactory, TargetSpec, Workloads};
