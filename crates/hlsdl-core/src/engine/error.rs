//! Terminal outcomes surfaced by the engine (§4.11/§7).

use crate::retry::RetryCategory;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("segment {index} failed after retries ({category:?}): {message}")]
    SegmentFailed {
        index: usize,
        category: RetryCategory,
        message: String,
    },
    #[error("download cancelled")]
    Cancelled,
    #[error("state file io error: {0}")]
    Io(#[from] std::io::Error),
}
