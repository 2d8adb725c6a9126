use crate::types::SearchPhase;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SentryError {
    #[error("Fatal error during {phase}: {reason}")]
    FatalInit { phase: SearchPhase, reason: String },

    #[error("Invalid genome: {0}")]
    InvalidGenome(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Evaluation worker crashed in generation {generation} while evaluating individual {individual_id}: {detail}")]
    WorkerCrash {
        generation: usize,
        individual_id: u64,
        genome: String,
        detail: String,
    },

    #[error("Search engine is in phase {actual}, expected {expected}")]
    InvalidPhase {
        expected: SearchPhase,
        actual: SearchPhase,
    },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Oracle error: {0}")]
    Oracle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl SentryError {
    /// Search phase the failure belongs to, when it is tied to one
    pub fn phase(&self) -> Option<SearchPhase> {
        match self {
            SentryError::FatalInit { phase, .. } => Some(*phase),
            SentryError::WorkerCrash { .. } => Some(SearchPhase::Evaluating),
            SentryError::InvalidPhase { actual, .. } => Some(*actual),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SentryError>;
