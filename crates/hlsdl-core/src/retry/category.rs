use std::time::Duration;

/// The error taxonomy surfaced to every caller in this crate (§7).
///
/// `Integrity` is never produced by [`crate::retry::classify`]; it's raised
/// directly by the bitfield loader. `Cancelled` is produced both by
/// `classify` (a `TransferError::Cancelled` mid-transfer) and by the
/// engine/fetch loop's own pre-attempt cancellation check, so the two share
/// this enum and a single match arm in the Job Controller composes the
/// right `error_message` either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCategory {
    /// Transport-level transient: timeout, reset, DNS, 408, 429.
    RetryableNetwork,
    /// HTTP 5xx.
    RetryableServer,
    /// HTTP 4xx other than 401/403/408/429.
    NonRetryableClient,
    /// HTTP 401/403.
    NonRetryableAuth,
    /// Unclassified, 2xx-as-error, or decoding impossible.
    Permanent,
    /// State file magic/version/CRC mismatch. Recovered silently; never surfaced.
    Integrity,
    /// Caller-initiated cancellation.
    Cancelled,
}

impl RetryCategory {
    /// Maximum number of attempts (including the first) for this category.
    /// `0` means the first failure is terminal.
    pub fn max_attempts(self) -> u32 {
        match self {
            RetryCategory::RetryableNetwork => 5,
            RetryCategory::RetryableServer => 3,
            RetryCategory::NonRetryableClient
            | RetryCategory::NonRetryableAuth
            | RetryCategory::Permanent
            | RetryCategory::Integrity
            | RetryCategory::Cancelled => 0,
        }
    }

    /// Base delay used in `base * 2^(attempt-1)` backoff. `None` for
    /// categories that never retry.
    pub fn base_delay(self) -> Option<Duration> {
        match self {
            RetryCategory::RetryableNetwork => Some(Duration::from_secs(1)),
            RetryCategory::RetryableServer => Some(Duration::from_secs(2)),
            _ => None,
        }
    }

    pub fn is_retryable(self) -> bool {
        self.max_attempts() > 0
    }
}

/// Backoff delay for attempt `k` (1-indexed), per §4.6: `base * 2^(k-1)`,
/// plus additive jitter bounded by `100 + 50*k` ms. `jitter_ms` is supplied
/// by the caller (e.g. sampled from a PRNG) so this function stays pure and
/// independent of any randomness source.
pub fn backoff_delay(category: RetryCategory, attempt: u32, jitter_ms: u64) -> Option<Duration> {
    let base = category.base_delay()?;
    let exp = 1u32 << attempt.saturating_sub(1).min(16);
    let raw = base.saturating_mul(exp);
    let jitter_cap = 100 + 50 * attempt as u64;
    let jitter = Duration::from_millis(jitter_ms.min(jitter_cap));
    Some(raw + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_network_table_values() {
        assert_eq!(RetryCategory::RetryableNetwork.max_attempts(), 5);
        assert_eq!(
            RetryCategory::RetryableNetwork.base_delay(),
            Some(Duration::from_secs(1))
        );
    }

    #[test]
    fn retryable_server_table_values() {
        assert_eq!(RetryCategory::RetryableServer.max_attempts(), 3);
        assert_eq!(
            RetryCategory::RetryableServer.base_delay(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn non_retryable_categories_have_zero_attempts() {
        for c in [
            RetryCategory::NonRetryableClient,
            RetryCategory::NonRetryableAuth,
            RetryCategory::Permanent,
        ] {
            assert_eq!(c.max_attempts(), 0);
            assert_eq!(c.base_delay(), None);
            assert!(!c.is_retryable());
        }
    }

    #[test]
    fn backoff_grows_exponentially_before_jitter() {
        let d1 = backoff_delay(RetryCategory::RetryableNetwork, 1, 0).unwrap();
        let d2 = backoff_delay(RetryCategory::RetryableNetwork, 2, 0).unwrap();
        let d3 = backoff_delay(RetryCategory::RetryableNetwork, 3, 0).unwrap();
        assert_eq!(d1, Duration::from_secs(1));
        assert_eq!(d2, Duration::from_secs(2));
        assert_eq!(d3, Duration::from_secs(4));
    }

    #[test]
    fn jitter_is_capped_per_attempt() {
        let d = backoff_delay(RetryCategory::RetryableNetwork, 1, 10_000).unwrap();
        // base 1s + jitter capped at 150ms for attempt 1.
        assert_eq!(d, Duration::from_secs(1) + Duration::from_millis(150));
    }

    #[test]
    fn non_retryable_has_no_backoff() {
        assert_eq!(backoff_delay(RetryCategory::NonRetryableAuth, 1, 0), None);
    }
}
