//! Source and lane error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    /// The consumer stopped draining: the source waited past its budget more
    /// often than allowed. Fatal for the run.
    #[error("source stalled: {stalls} waits past budget exceeded limit of {limit}")]
    Stalled { stalls: u32, limit: u32 },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LaneError {
    #[error("lane disconnected")]
    Disconnected,
}
