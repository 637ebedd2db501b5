//! Errors surfaced by a single network transfer (playlist, key, or segment fetch).

use std::fmt;

/// Error returned by a single HTTP transfer, before classification.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported a transport-level error (timeout, DNS, connection reset, ...).
    Curl(curl::Error),
    /// The response carried a non-2xx HTTP status.
    Http(u32),
    /// Transfer completed but fewer bytes were written than advertised.
    PartialTransfer { expected: u64, received: u64 },
    /// Disk/storage write failed.
    Storage(std::io::Error),
    /// Cooperative cancellation fired mid-transfer.
    Cancelled,
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{e}"),
            TransferError::Http(code) => write!(f, "HTTP {code}"),
            TransferError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {expected} bytes, got {received}")
            }
            TransferError::Storage(e) => write!(f, "storage: {e}"),
            TransferError::Cancelled => write!(f, "transfer cancelled"),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_) | TransferError::PartialTransfer { .. } | TransferError::Cancelled => None,
        }
    }
}
