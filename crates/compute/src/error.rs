use scrabble_core::CoreError;
use scrabble_queue::{LaneError, SourceError};

use crate::orchestrator::RunPhase;

/// Error type for a benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Source failed: {0}")]
    Source(#[from] SourceError),
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
    #[error("Channel closed: {0}")]
    ChannelClosed(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("Run phase out of order: {from:?} -> {to:?}")]
    PhaseOrder { from: RunPhase, to: RunPhase },
    #[error("Unknown {kind}: {name}")]
    Unknown { kind: &'static str, name: String },
    #[error("Invalid config: {0}")]
    Config(#[from] CoreError),
}

impl From<LaneError> for RunError {
    fn from(e: LaneError) -> Self {
        RunError::ChannelClosed(e.to_string())
    }
}
