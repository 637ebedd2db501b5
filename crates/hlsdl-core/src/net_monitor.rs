//! Rolling-window success rate and latency, driving a health score (C4).
//!
//! The monitor is a pure observer: it only records `(success, duration)`
//! samples. It has no back-edge into the concurrency controller or the
//! engine — they read it, it never reads them (§9's unidirectional-feedback
//! redesign note).

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

const WINDOW_SIZE: usize = 20;
const REDUCE_MIN_WINDOW: usize = 5;
const INCREASE_MIN_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Sample {
    success: bool,
    duration: Duration,
}

#[derive(Debug)]
pub struct NetworkMonitor {
    window: Mutex<VecDeque<Sample>>,
    window_size: usize,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new(WINDOW_SIZE)
    }
}

impl NetworkMonitor {
    pub fn new(window_size: usize) -> Self {
        NetworkMonitor {
            window: Mutex::new(VecDeque::with_capacity(window_size)),
            window_size,
        }
    }

    pub fn record(&self, success: bool, duration: Duration) {
        let mut w = self.window.lock().expect("network monitor mutex poisoned");
        if w.len() == self.window_size {
            w.pop_front();
        }
        w.push_back(Sample { success, duration });
    }

    pub fn len(&self) -> usize {
        self.window.lock().expect("network monitor mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn success_rate(&self) -> f64 {
        let w = self.window.lock().expect("network monitor mutex poisoned");
        if w.is_empty() {
            return 1.0;
        }
        let successes = w.iter().filter(|s| s.success).count();
        successes as f64 / w.len() as f64
    }

    pub fn avg_response_time(&self) -> Duration {
        let w = self.window.lock().expect("network monitor mutex poisoned");
        if w.is_empty() {
            return Duration::from_secs(1);
        }
        let total: Duration = w.iter().map(|s| s.duration).sum();
        total / w.len() as u32
    }

    pub fn health_score(&self) -> f64 {
        let success_rate = self.success_rate();
        let avg_ms = self.avg_response_time().as_secs_f64() * 1000.0;
        let rt_score = if avg_ms > 5000.0 {
            ((10000.0 - avg_ms) / 10000.0).clamp(0.0, 1.0)
        } else {
            1.0
        };
        0.7 * success_rate + 0.3 * rt_score
    }

    pub fn should_reduce(&self) -> bool {
        self.len() >= REDUCE_MIN_WINDOW
            && (self.health_score() < 0.6 || self.success_rate() < 0.5)
    }

    pub fn should_increase(&self) -> bool {
        self.len() >= INCREASE_MIN_WINDOW
            && self.health_score() > 0.8
            && self.success_rate() > 0.9
            && self.avg_response_time() < Duration::from_millis(2000)
    }

    pub fn is_poor(&self) -> bool {
        self.success_rate() < 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_monitor_defaults() {
        let m = NetworkMonitor::default();
        assert_eq!(m.success_rate(), 1.0);
        assert_eq!(m.avg_response_time(), Duration::from_secs(1));
        assert!(!m.should_reduce());
        assert!(!m.should_increase());
        assert!(!m.is_poor());
    }

    #[test]
    fn window_drops_oldest_sample_past_capacity() {
        let m = NetworkMonitor::new(3);
        m.record(true, Duration::from_millis(10));
        m.record(false, Duration::from_millis(10));
        m.record(false, Duration::from_millis(10));
        m.record(false, Duration::from_millis(10));
        // The first `true` sample should have been evicted.
        assert_eq!(m.success_rate(), 0.0);
    }

    #[test]
    fn should_reduce_on_low_success_rate() {
        let m = NetworkMonitor::new(20);
        for _ in 0..6 {
            m.record(false, Duration::from_millis(100));
        }
        assert!(m.should_reduce());
    }

    #[test]
    fn should_increase_requires_full_window_and_good_health() {
        let m = NetworkMonitor::new(20);
        for _ in 0..9 {
            m.record(true, Duration::from_millis(100));
        }
        // Only 9 samples: window < 10, should not increase yet.
        assert!(!m.should_increase());
        m.record(true, Duration::from_millis(100));
        assert!(m.should_increase());
    }

    #[test]
    fn health_score_penalizes_high_latency() {
        let m = NetworkMonitor::new(20);
        for _ in 0..5 {
            m.record(true, Duration::from_millis(9000));
        }
        let score = m.health_score();
        assert!(score < 1.0);
        assert!(score > 0.0);
    }

    #[test]
    fn is_poor_threshold() {
        let m = NetworkMonitor::new(20);
        m.record(true, Duration::from_millis(1));
        m.record(false, Duration::from_millis(1));
        m.record(false, Duration::from_millis(1));
        assert!(m.is_poor());
    }
}
