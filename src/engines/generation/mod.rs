pub mod genome;
pub mod individual;
pub mod operators;
pub mod hall_of_fame;
pub mod progress;
pub mod watchdog;
pub mod search_engine;

pub use genome::{Comparison, Genome, LogicOp, PolicyNode, StateDefinition, Transition};
pub use individual::Individual;
pub use hall_of_fame::{ElitePolicy, HallOfFame};
pub use progress::{ChannelProgressCallback, ConsoleProgressCallback, GenerationSummary, ProgressCallback, ProgressMessage};
pub use search_engine::{GauntletReport, SearchEngine, SearchOutcome, SearchSettings};
