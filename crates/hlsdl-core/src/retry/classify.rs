//! Maps transport/HTTP errors to a [`RetryCategory`] (§4.6).

use super::category::{backoff_delay, RetryCategory};
use super::error::TransferError;
use std::time::Duration;

/// Decision returned after classifying an error at a given attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    NoRetry,
    RetryAfter(Duration),
}

/// Classify an HTTP status code (§4.6's table).
pub fn classify_http_status(code: u32) -> RetryCategory {
    match code {
        408 | 429 => RetryCategory::RetryableNetwork,
        500..=599 => RetryCategory::RetryableServer,
        401 | 403 => RetryCategory::NonRetryableAuth,
        400..=499 => RetryCategory::NonRetryableClient,
        _ => RetryCategory::Permanent,
    }
}

/// Classify a curl transport error.
pub fn classify_curl_error(e: &curl::Error) -> RetryCategory {
    if e.is_operation_timedout() {
        return RetryCategory::RetryableNetwork;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
        || e.is_partial_file()
    {
        return RetryCategory::RetryableNetwork;
    }
    RetryCategory::Permanent
}

/// Classify any [`TransferError`] into a [`RetryCategory`].
pub fn classify(e: &TransferError) -> RetryCategory {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::PartialTransfer { .. } => RetryCategory::RetryableNetwork,
        TransferError::Storage(_) => RetryCategory::Permanent,
        TransferError::Cancelled => RetryCategory::Cancelled,
    }
}

/// Decide whether attempt `attempt` (1-indexed, the attempt that just failed)
/// should be retried, given jitter in milliseconds sampled by the caller.
pub fn decide(category: RetryCategory, attempt: u32, jitter_ms: u64) -> RetryDecision {
    if attempt >= category.max_attempts() {
        return RetryDecision::NoRetry;
    }
    match backoff_delay(category, attempt, jitter_ms) {
        Some(d) => RetryDecision::RetryAfter(d),
        None => RetryDecision::NoRetry,
    }
}
