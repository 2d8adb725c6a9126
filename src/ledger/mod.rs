//! Audit trail of search milestones.

pub mod hash_chain;

pub use hash_chain::{verify_chain, HashChainLedger, LedgerBlock, GENESIS_HASH};

use crate::error::Result;

pub const GENESIS: &str = "GENESIS";
pub const CALIBRATION_COMPLETE: &str = "CALIBRATION_COMPLETE";
pub const INITIAL_POPULATION_CREATED: &str = "INITIAL_POPULATION_CREATED";
pub const EVALUATION_COMPLETE: &str = "EVALUATION_COMPLETE";
pub const CHAMPION_UPDATED: &str = "CHAMPION_UPDATED";
pub const FINAL_CHAMPION_SYNTHESIZED: &str = "FINAL_CHAMPION_SYNTHESIZED";
pub const FATAL_ERROR: &str = "FATAL_ERROR";

/// Append-only record of what the search did.
///
/// Recording never fails the search; implementations log their own
/// trouble. `flush` persists whatever has been recorded so far.
pub trait AuditLedger: Send + Sync {
    fn record_event(&self, generation: usize, event_type: &str, details: serde_json::Value);
    fn flush(&self) -> Result<()>;
}
