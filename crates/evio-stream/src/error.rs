//! Pipeline error surface.

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by the attachment pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("attachment slot {0} out of range ({1} slots)")]
    SlotOutOfRange(usize, usize),
    #[error("attachment slot {0} already has a source")]
    AlreadySupplied(usize),
    #[error("attachment slot {0} already has a reader")]
    AlreadyClaimed(usize),
    #[error("attachment slot {slot} timed out after {millis}ms waiting for its source")]
    SupplyTimeout { slot: usize, millis: u64 },
    #[error("attachment slot {0} was cancelled")]
    Cancelled(usize),
    #[error("attachment slot {slot} source failed: {reason}")]
    SourceFailed { slot: usize, reason: String },
    #[error("invalid pipeline config: {0}")]
    Config(String),
    #[error(transparent)]
    Codec(#[from] evio_core::EvioError),
}
