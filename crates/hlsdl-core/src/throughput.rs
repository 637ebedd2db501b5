//! EMA-smoothed bytes/sec with a human-readable ETA (C11).

use std::collections::VecDeque;
use std::sync::Mutex;

const ALPHA: f64 = 0.3;

struct State {
    window: VecDeque<f64>,
    window_size: usize,
    ema: Option<f64>,
}

pub struct ThroughputEstimator {
    state: Mutex<State>,
}

impl ThroughputEstimator {
    pub fn new(window_size: usize) -> Self {
        ThroughputEstimator {
            state: Mutex::new(State {
                window: VecDeque::with_capacity(window_size),
                window_size,
                ema: None,
            }),
        }
    }

    /// Record a completed transfer of `bytes` over `ms` milliseconds.
    pub fn add_sample(&self, bytes: u64, ms: u64) {
        let raw = if ms == 0 {
            bytes as f64 * 1000.0
        } else {
            bytes as f64 * 1000.0 / ms as f64
        };

        let mut s = self.state.lock().expect("throughput mutex poisoned");
        let smoothed = match s.ema {
            Some(prev) => 0.7 * prev + ALPHA * raw,
            None => raw,
        };
        s.ema = Some(smoothed);

        if s.window.len() == s.window_size {
            s.window.pop_front();
        }
        s.window.push_back(smoothed);
    }

    /// Arithmetic mean of the smoothed-sample window, 0 if empty.
    pub fn avg_bps(&self) -> f64 {
        let s = self.state.lock().expect("throughput mutex poisoned");
        if s.window.is_empty() {
            return 0.0;
        }
        s.window.iter().sum::<f64>() / s.window.len() as f64
    }

    /// Seconds remaining at the current average throughput, or `None` when
    /// `avg_bps <= 0`.
    pub fn eta_secs(&self, remaining_bytes: u64) -> Option<f64> {
        let avg = self.avg_bps();
        if avg <= 0.0 {
            return None;
        }
        Some(remaining_bytes as f64 / avg)
    }

    /// Human-readable ETA: `Ns`, `Mm Ss`, or `Hh Mm`. `"--"` when unknown.
    pub fn eta(&self, remaining_bytes: u64) -> String {
        match self.eta_secs(remaining_bytes) {
            None => "--".to_string(),
            Some(secs) => format_eta(secs),
        }
    }
}

fn format_eta(secs: f64) -> String {
    let total = secs.round().max(0.0) as u64;
    if total < 60 {
        format!("{total}s")
    } else if total < 3600 {
        let m = total / 60;
        let s = total % 60;
        format!("{m}m {s}s")
    } else {
        let h = total / 3600;
        let m = (total % 3600) / 60;
        format!("{h}h {m}m")
    }
}
