//! Converts network health and memory pressure into a dynamic parallelism
//! ceiling (C5). The controller never reads the engine's state beyond what
//! the [`crate::net_monitor::NetworkMonitor`] already recorded — it only
//! writes `current`, which the engine reads at scheduling points.

use crate::net_monitor::NetworkMonitor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use sysinfo::{Pid, System};

#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyState {
    pub current: usize,
    pub memory_used: u64,
    pub memory_cap: u64,
}

pub struct AdaptiveConcurrencyController {
    min: usize,
    max: usize,
    current: Mutex<usize>,
    memory_cap: u64,
    memory_used: AtomicU64,
    system: Mutex<System>,
    pid: Pid,
}

impl AdaptiveConcurrencyController {
    pub fn new(min: usize, max: usize, initial: usize, memory_cap: u64) -> Self {
        let pid = Pid::from_u32(std::process::id());
        AdaptiveConcurrencyController {
            min,
            max,
            current: Mutex::new(initial.clamp(min, max)),
            memory_cap,
            memory_used: AtomicU64::new(0),
            system: Mutex::new(System::new()),
            pid,
        }
    }

    pub fn current(&self) -> usize {
        *self.current.lock().expect("concurrency controller mutex poisoned")
    }

    pub fn state(&self) -> ConcurrencyState {
        ConcurrencyState {
            current: self.current(),
            memory_used: self.memory_used.load(Ordering::Relaxed),
            memory_cap: self.memory_cap,
        }
    }

    /// Refresh the sampled memory usage from the OS. Cheap enough to call on
    /// every tick; the underlying `System` only refreshes this process.
    fn sample_memory(&self) -> u64 {
        let mut sys = self.system.lock().expect("sysinfo mutex poisoned");
        sys.refresh_process(self.pid);
        let used = sys.process(self.pid).map(|p| p.memory()).unwrap_or(0);
        self.memory_used.store(used, Ordering::Relaxed);
        used
    }

    /// Apply the §4.4 tick/adjust algorithm using a freshly sampled memory
    /// reading and the given monitor's policy hooks.
    pub fn adjust(&self, monitor: &NetworkMonitor) {
        let memory_used = self.sample_memory();
        let mut current = self.current.lock().expect("concurrency controller mutex poisoned");

        let memory_fraction = if self.memory_cap == 0 {
            0.0
        } else {
            memory_used as f64 / self.memory_cap as f64
        };

        if memory_fraction > 0.8 {
            *current = ((*current as f64 * 0.7).floor() as usize).max(self.min);
        } else if monitor.should_reduce() {
            *current = current.saturating_sub(1).max(self.min);
        } else if monitor.should_increase() && memory_fraction < 0.5 {
            *current = (*current + 1).min(self.max);
        }
    }

    /// Test/explicit-call seam: adjust using an already-known memory usage
    /// fraction instead of sampling the OS, so the §4.4 algorithm itself can
    /// be exercised deterministically.
    #[cfg(test)]
    fn adjust_with_memory_used(&self, monitor: &NetworkMonitor, memory_used: u64) {
        self.memory_used.store(memory_used, Ordering::Relaxed);
        let mut current = self.current.lock().expect("concurrency controller mutex poisoned");
        let memory_fraction = if self.memory_cap == 0 {
            0.0
        } else {
            memory_used as f64 / self.memory_cap as f64
        };
        if memory_fraction > 0.8 {
            *current = ((*current as f64 * 0.7).floor() as usize).max(self.min);
        } else if monitor.should_reduce() {
            *current = current.saturating_sub(1).max(self.min);
        } else if monitor.should_increase() && memory_fraction < 0.5 {
            *current = (*current + 1).min(self.max);
        }
    }
}
