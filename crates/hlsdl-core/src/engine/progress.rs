//! Progress snapshots the engine hands back to its caller (§4.11 step 7).

use std::time::Duration;

/// One state mutation worth reporting. `fraction` reserves the trailing 0.2
/// of the job's overall progress for muxing, per §4.11/§4.12 — the engine
/// only ever reports in `[0.0, 0.8]`.
#[derive(Debug, Clone, Copy)]
pub struct EngineProgress {
    pub segment_index: usize,
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
    pub bytes_this_segment: u64,
    pub avg_bps: f64,
    pub eta: Option<Duration>,
}
