//! Error classification and retry/backoff policy (C7 in the design).
//!
//! Every transport- or HTTP-level failure is mapped to a [`RetryCategory`]
//! before the caller decides anything: the retry loop is a deterministic
//! finite state machine over that category, not an exception chain.

mod category;
mod classify;
mod error;

pub use category::RetryCategory;
pub use classify::{classify, classify_curl_error, classify_http_status, decide, RetryDecision};
pub use error::TransferError;
