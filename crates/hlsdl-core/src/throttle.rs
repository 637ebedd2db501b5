//! Token-bucket-style per-second byte ceiling (C6).
//!
//! Limits are fixed at construction; per §9's Open Question 3 there is no
//! runtime `set_limit` — the source's no-op `setLimit` is simply not carried
//! forward.

use std::sync::Mutex;
use std::time::{Duration, Instant};

struct State {
    bytes_this_second: u64,
    second_start: Instant,
}

pub struct BandwidthThrottle {
    max_bps: Option<u64>,
    state: Mutex<State>,
}

impl BandwidthThrottle {
    pub fn new(max_bps: Option<u64>) -> Self {
        BandwidthThrottle {
            max_bps,
            state: Mutex::new(State {
                bytes_this_second: 0,
                second_start: Instant::now(),
            }),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Account for `n_bytes` just transferred and return how long the caller
    /// should sleep to stay within budget, if at all. Shared by the async and
    /// blocking variants below.
    fn account(&self, n_bytes: u64) -> Option<Duration> {
        let max_bps = self.max_bps?;
        if max_bps == 0 {
            return None;
        }

        let mut s = self.state.lock().expect("throttle mutex poisoned");
        if s.second_start.elapsed() >= Duration::from_secs(1) {
            s.bytes_this_second = 0;
            s.second_start = Instant::now();
        }

        s.bytes_this_second += n_bytes;
        if s.bytes_this_second > max_bps {
            let overflow = s.bytes_this_second - max_bps;
            let secs = overflow as f64 / max_bps as f64;
            s.bytes_this_second = 0;
            s.second_start = Instant::now();
            Some(Duration::from_secs_f64(secs))
        } else {
            None
        }
    }

    /// Account for `n_bytes` just transferred, sleeping if the current
    /// second's budget would be exceeded. No-op when disabled.
    pub async fn throttle(&self, n_bytes: u64) {
        if let Some(d) = self.account(n_bytes) {
            tokio::time::sleep(d).await;
        }
    }

    /// Same contract as [`Self::throttle`], but for use inside a synchronous
    /// `curl` write callback running on a blocking-pool thread, where an
    /// async sleep isn't available.
    pub fn throttle_blocking(&self, n_bytes: u64) {
        if let Some(d) = self.account(n_bytes) {
            std::thread::sleep(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_throttle_never_sleeps() {
        let t = BandwidthThrottle::disabled();
        let start = Instant::now();
        t.throttle(10_000_000).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn under_budget_does_not_sleep() {
        let t = BandwidthThrottle::new(Some(1_000_000));
        let start = Instant::now();
        t.throttle(500_000).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn over_budget_sleeps_proportional_to_overflow() {
        let t = BandwidthThrottle::new(Some(1_000_000));
        t.throttle(1_000_000).await; // fills the budget exactly
        let start = tokio::time::Instant::now();
        t.throttle(500_000).await; // overflow = 500_000 -> 0.5s sleep
        assert!(tokio::time::Instant::now() - start >= Duration::from_millis(500));
    }

    #[test]
    fn zero_limit_is_treated_as_disabled() {
        // Regression guard: a misconfigured 0 bps limit must not deadlock
        // the caller by requiring an infinite sleep.
        let t = BandwidthThrottle::new(Some(0));
        assert_eq!(t.max_bps, Some(0));
    }
}
