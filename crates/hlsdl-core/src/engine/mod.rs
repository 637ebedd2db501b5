//! Segment Download Engine (§4.11): resume protocol, adaptive scheduling
//! loop, per-segment fetch+retry, ordered merge-queue population.
//!
//! Grounded on the reference crate's `scheduler/execute.rs` async/
//! spawn_blocking bridge (one task per in-flight transfer, joined back into
//! the owning scheduler loop), generalized from one shared byte-range file
//! with a known total size to N independently-sized segment files whose
//! total size is unknown ahead of time.

mod error;
mod fetch;
mod progress;

pub use error::EngineError;
pub use progress::EngineProgress;

use crate::bitfield::Bitfield;
use crate::concurrency::AdaptiveConcurrencyController;
use crate::crypto;
use crate::http_pool::HttpClientPool;
use crate::merge_queue::MergeQueue;
use crate::net_monitor::NetworkMonitor;
use crate::retry::RetryCategory;
use crate::throttle::BandwidthThrottle;
use crate::throughput::ThroughputEstimator;
use crate::traits::HeaderProvider;
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use url::Url;

pub const STATE_FILE_NAME: &str = "download_state.bitfield";

fn segment_path(workdir: &Path, index: usize) -> PathBuf {
    workdir.join(format!("segment_{index:06}.ts"))
}

/// Result of the resume protocol: the (possibly freshly-initialized)
/// bitfield and the indices still needing a fetch.
pub struct ResumeState {
    pub bitfield: Bitfield,
    pending: VecDeque<usize>,
}

impl ResumeState {
    pub fn completed_count(&self, segment_count: usize) -> usize {
        segment_count - self.pending.len()
    }
}

pub struct SegmentDownloadEngine {
    pool: Arc<HttpClientPool>,
    monitor: Arc<NetworkMonitor>,
    controller: Arc<AdaptiveConcurrencyController>,
    throttle: Arc<BandwidthThrottle>,
    throughput: Arc<ThroughputEstimator>,
    segment_timeout: Duration,
    tick_interval: Duration,
}

impl SegmentDownloadEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<HttpClientPool>,
        monitor: Arc<NetworkMonitor>,
        controller: Arc<AdaptiveConcurrencyController>,
        throttle: Arc<BandwidthThrottle>,
        throughput: Arc<ThroughputEstimator>,
        segment_timeout: Duration,
        tick_interval: Duration,
    ) -> Self {
        SegmentDownloadEngine {
            pool,
            monitor,
            controller,
            throttle,
            throughput,
            segment_timeout,
            tick_interval,
        }
    }

    /// §4.11 "Resume protocol (startup)", steps 1-4. Populates `merge_queue`
    /// with segments that survive the file-existence check as a side effect.
    pub fn resume(&self, workdir: &Path, segment_count: usize, merge_queue: &MergeQueue) -> ResumeState {
        let state_path = workdir.join(STATE_FILE_NAME);
        let mut bitfield =
            Bitfield::load(&state_path, segment_count).unwrap_or_else(|| Bitfield::new(segment_count));

        for i in 0..segment_count {
            if !bitfield.is_set(i) {
                continue;
            }
            let path = segment_path(workdir, i);
            let survives = std::fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);
            if survives {
                merge_queue.add(i, path);
            } else {
                tracing::warn!(segment_index = i, "resume: bit set but file missing/empty, downgrading");
                bitfield.clear(i);
            }
        }

        let pending = bitfield.pending(segment_count).into_iter().collect();
        ResumeState { bitfield, pending }
    }

    /// Drives every pending segment to completion, or the job to `Failed`,
    /// per §4.11's scheduling algorithm. `header_provider` is `Arc`-wrapped
    /// because each in-flight fetch runs as its own `tokio` task.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        workdir: &Path,
        segments: &[Url],
        key: Option<[u8; crypto::KEY_LEN]>,
        explicit_iv: Option<[u8; crypto::IV_LEN]>,
        header_provider: Arc<dyn HeaderProvider>,
        resume: &mut ResumeState,
        merge_queue: &MergeQueue,
        cancel: &Arc<AtomicBool>,
        mut on_progress: impl FnMut(EngineProgress),
    ) -> Result<(), EngineError> {
        let segment_count = segments.len();
        let state_path = workdir.join(STATE_FILE_NAME);
        let mut pending = std::mem::take(&mut resume.pending);
        let mut completed = segment_count - pending.len();

        type FetchResult = (usize, Result<fetch::FetchOk, (RetryCategory, crate::retry::TransferError, Duration)>);
        let mut join_set: JoinSet<FetchResult> = JoinSet::new();
        let mut terminal: Option<EngineError> = None;
        let mut last_tick = Instant::now();

        loop {
            if last_tick.elapsed() >= self.tick_interval {
                self.controller.adjust(&self.monitor);
                last_tick = Instant::now();
            }

            if terminal.is_none() && !cancel.load(Ordering::Relaxed) {
                while !pending.is_empty() && join_set.len() < self.controller.current() {
                    let index = pending.pop_front().expect("checked non-empty above");
                    let url = segments[index].clone();
                    let path = segment_path(workdir, index);
                    let pool = Arc::clone(&self.pool);
                    let throttle = Arc::clone(&self.throttle);
                    let header_provider = Arc::clone(&header_provider);
                    let cancel = Arc::clone(cancel);
                    let timeout = self.segment_timeout;

                    tracing::debug!(segment_index = index, active = join_set.len() + 1, "segment scheduled");
                    join_set.spawn(async move {
                        let result = fetch::fetch_segment_with_retry(
                            &pool,
                            &throttle,
                            header_provider.as_ref(),
                            &cancel,
                            index,
                            &url,
                            &path,
                            timeout,
                            key,
                            explicit_iv,
                        )
                        .await;
                        (index, result)
                    });
                }
            }

            if join_set.is_empty() {
                break;
            }

            match join_set.join_next().await {
                Some(Ok((index, Ok(outcome)))) => {
                    self.monitor.record(true, outcome.elapsed);
                    self.throughput
                        .add_sample(outcome.bytes, outcome.elapsed.as_millis().max(1) as u64);

                    resume.bitfield.set(index);
                    resume
                        .bitfield
                        .save(&state_path, segment_count)
                        .map_err(EngineError::Io)?;
                    merge_queue.add(index, segment_path(workdir, index));

                    completed += 1;
                    tracing::info!(
                        segment_index = index,
                        attempts = outcome.attempts,
                        completed,
                        segment_count,
                        "segment complete"
                    );

                    let remaining = (segment_count - completed) as u64;
                    let avg_bps = self.throughput.avg_bps();
                    // Total job size isn't known up front (unlike a Content-Length-backed
                    // byte-range download); approximate remaining bytes from this
                    // segment's own size times the segments left.
                    let eta = self
                        .throughput
                        .eta_secs(outcome.bytes.saturating_mul(remaining))
                        .map(Duration::from_secs_f64);

                    on_progress(EngineProgress {
                        segment_index: index,
                        completed,
                        total: segment_count,
                        fraction: (completed as f64 / segment_count as f64) * 0.8,
                        bytes_this_segment: outcome.bytes,
                        avg_bps,
                        eta,
                    });
                }
                Some(Ok((index, Err((category, e, elapsed))))) => {
                    self.monitor.record(false, elapsed);
                    self.controller.adjust(&self.monitor);

                    if matches!(category, RetryCategory::Cancelled) {
                        tracing::info!(segment_index = index, "segment cancelled");
                        continue;
                    }

                    tracing::warn!(segment_index = index, category = ?category, error = %e, "segment failed terminally");
                    if terminal.is_none() {
                        terminal = Some(EngineError::SegmentFailed {
                            index,
                            category,
                            message: e.to_string(),
                        });
                        join_set.abort_all();
                    }
                }
                Some(Err(join_err)) => {
                    if !join_err.is_cancelled() && terminal.is_none() {
                        terminal = Some(EngineError::Io(io::Error::other(join_err.to_string())));
                        join_set.abort_all();
                    }
                }
                None => unreachable!("checked join_set.is_empty() above"),
            }
        }

        if cancel.load(Ordering::Relaxed) {
            return Err(EngineError::Cancelled);
        }
        match terminal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
