//! Job Controller (C13): end-to-end lifecycle for one download task, from
//! playlist fetch through muxing (§4.12).
//!
//! Grounded on the reference crate's `scheduler/run/shared.rs::run_one_job_shared`
//! (probe → validate → plan → execute → persist-on-error) and
//! `cli/commands/run.rs::run_scheduler`'s progress-channel idiom, adapted from
//! a multi-job scheduler driving many resumable downloads to a single
//! Controller driving one HLS fetch end to end.

use crate::config::HlsDlConfig;
use crate::crypto;
use crate::engine::{EngineProgress, SegmentDownloadEngine};
use crate::http_pool::HttpClientPool;
use crate::merge_queue::MergeQueue;
use crate::playlist::{self, Playlist};
use crate::retry::{classify, decide, RetryDecision, TransferError};
use crate::traits::{HeaderProvider, Muxer};
use anyhow::{Context, Result};
use curl::easy::Easy;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Status transitions the Controller reports through its progress callback
/// (§3's Status enum, minus `Queued`/`Paused`, which belong to the owning
/// application, not the Controller itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    FetchingPlaylist,
    Downloading,
    Muxing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct JobProgress {
    pub status: JobStatus,
    pub fraction: f64,
    pub bytes_done: u64,
    pub speed_bps: f64,
    pub eta: Option<Duration>,
    pub error_message: Option<String>,
}

impl JobProgress {
    fn status(status: JobStatus, fraction: f64) -> Self {
        JobProgress {
            status,
            fraction,
            bytes_done: 0,
            speed_bps: 0.0,
            eta: None,
            error_message: None,
        }
    }

    fn from_engine(p: EngineProgress, bytes_done: u64) -> Self {
        JobProgress {
            status: JobStatus::Downloading,
            fraction: p.fraction,
            bytes_done,
            speed_bps: p.avg_bps,
            eta: p.eta,
            error_message: None,
        }
    }

    fn failed(message: String) -> Self {
        JobProgress {
            status: JobStatus::Failed,
            fraction: 0.0,
            bytes_done: 0,
            speed_bps: 0.0,
            eta: None,
            error_message: Some(message),
        }
    }
}

/// Blocking GET of `url`'s full body, run on the blocking pool and retried
/// per C7 — the same classify-then-backoff loop the Engine uses for
/// segments, generalized away from streaming-to-disk since playlists and
/// keys are small enough to buffer whole.
async fn fetch_bytes_with_retry(
    pool: &HttpClientPool,
    header_provider: &dyn HeaderProvider,
    url: &Url,
    timeout: Duration,
) -> Result<Vec<u8>, TransferError> {
    let mut attempt = 1u32;
    loop {
        let headers = header_provider.headers_for(url);
        let mut handle = pool.acquire().await;
        let url_owned = url.clone();

        let result = handle
            .with_blocking(move |easy: &mut Easy| -> Result<Vec<u8>, TransferError> {
                easy.url(url_owned.as_str()).map_err(TransferError::Curl)?;
                easy.follow_location(true).map_err(TransferError::Curl)?;
                easy.timeout(timeout).map_err(TransferError::Curl)?;
                if !headers.is_empty() {
                    let mut list = curl::easy::List::new();
                    for (k, v) in &headers {
                        list.append(&format!("{}: {}", k.trim(), v.trim()))
                            .map_err(TransferError::Curl)?;
                    }
                    easy.http_headers(list).map_err(TransferError::Curl)?;
                }

                let mut body = Vec::new();
                {
                    let mut transfer = easy.transfer();
                    transfer
                        .write_function(|data| {
                            body.extend_from_slice(data);
                            Ok(data.len())
                        })
                        .map_err(TransferError::Curl)?;
                    transfer.perform().map_err(TransferError::Curl)?;
                }

                let code = easy.response_code().map_err(TransferError::Curl)?;
                if !(200..300).contains(&code) {
                    return Err(TransferError::Http(code));
                }
                Ok(body)
            })
            .await;
        drop(handle);

        match result {
            Ok(body) => return Ok(body),
            Err(e) => {
                let category = classify(&e);
                match decide(category, attempt, 100 + 50 * attempt as u64) {
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(url = %url, attempt, category = ?category, "fetch failed, retrying");
                        tokio::time::sleep(d).await;
                        attempt += 1;
                        continue;
                    }
                    RetryDecision::NoRetry => return Err(e),
                }
            }
        }
    }
}

/// One download task from playlist URL to muxed output file.
pub struct JobController {
    pool: Arc<HttpClientPool>,
    engine: SegmentDownloadEngine,
    header_provider: Arc<dyn HeaderProvider>,
    muxer: Arc<dyn Muxer>,
    cfg: HlsDlConfig,
}

impl JobController {
    pub fn new(
        pool: Arc<HttpClientPool>,
        engine: SegmentDownloadEngine,
        header_provider: Arc<dyn HeaderProvider>,
        muxer: Arc<dyn Muxer>,
        cfg: HlsDlConfig,
    ) -> Self {
        JobController {
            pool,
            engine,
            header_provider,
            muxer,
            cfg,
        }
    }

    /// Drives `playlist_url` to `output_path`, reporting every status
    /// transition through `on_progress` (§4.12). `workdir` must be a
    /// dedicated scratch directory for this task (`m3u8_download_<task_id>`
    /// in §3's naming).
    pub async fn run(
        &self,
        playlist_url: &Url,
        workdir: &Path,
        output_path: &Path,
        cancel: Arc<AtomicBool>,
        mut on_progress: impl FnMut(JobProgress),
    ) -> Result<()> {
        std::fs::create_dir_all(workdir)
            .with_context(|| format!("creating workdir {}", workdir.display()))?;

        on_progress(JobProgress::status(JobStatus::FetchingPlaylist, 0.0));

        let playlist_timeout = Duration::from_secs(self.cfg.http.playlist_timeout_secs);
        let body = match fetch_bytes_with_retry(
            &self.pool,
            self.header_provider.as_ref(),
            playlist_url,
            playlist_timeout,
        )
        .await
        {
            Ok(b) => b,
            Err(e) => {
                let msg = format!("playlist fetch failed: {e}");
                on_progress(JobProgress::failed(msg.clone()));
                return Err(anyhow::anyhow!(msg));
            }
        };
        let text = String::from_utf8_lossy(&body).into_owned();

        let playlist: Playlist = match playlist::parse(&text, playlist_url) {
            Ok(p) => p,
            Err(e) => {
                let msg = format!("playlist parse failed: {e}");
                on_progress(JobProgress::failed(msg.clone()));
                return Err(anyhow::anyhow!(msg));
            }
        };

        let key = match &playlist.encryption {
            Some(enc) => {
                let key_timeout = Duration::from_secs(self.cfg.http.key_timeout_secs);
                match fetch_bytes_with_retry(
                    &self.pool,
                    self.header_provider.as_ref(),
                    &enc.key_url,
                    key_timeout,
                )
                .await
                {
                    Ok(bytes) if bytes.len() == crypto::KEY_LEN => {
                        let mut buf = [0u8; crypto::KEY_LEN];
                        buf.copy_from_slice(&bytes);
                        Some(buf)
                    }
                    Ok(bytes) => {
                        let msg = format!(
                            "key fetch returned {} bytes, expected {}",
                            bytes.len(),
                            crypto::KEY_LEN
                        );
                        on_progress(JobProgress::failed(msg.clone()));
                        return Err(anyhow::anyhow!(msg));
                    }
                    Err(e) => {
                        let msg = format!("key fetch failed: {e}");
                        on_progress(JobProgress::failed(msg.clone()));
                        return Err(anyhow::anyhow!(msg));
                    }
                }
            }
            None => None,
        };
        let explicit_iv = playlist.encryption.as_ref().and_then(|e| e.iv);

        let merge_queue = MergeQueue::new();
        let mut resume = self
            .engine
            .resume(workdir, playlist.segments.len(), &merge_queue);

        on_progress(JobProgress::status(JobStatus::Downloading, 0.0));

        let mut total_bytes: u64 = 0;
        let run_result = self
            .engine
            .run(
                workdir,
                &playlist.segments,
                key,
                explicit_iv,
                Arc::clone(&self.header_provider),
                &mut resume,
                &merge_queue,
                &cancel,
                |p| {
                    total_bytes += p.bytes_this_segment;
                    on_progress(JobProgress::from_engine(p, total_bytes));
                },
            )
            .await;

        if let Err(e) = run_result {
            let status = if matches!(e, crate::engine::EngineError::Cancelled) {
                JobStatus::Cancelled
            } else {
                JobStatus::Failed
            };
            on_progress(JobProgress {
                status,
                fraction: 0.0,
                bytes_done: total_bytes,
                speed_bps: 0.0,
                eta: None,
                error_message: if status == JobStatus::Failed {
                    Some(e.to_string())
                } else {
                    None
                },
            });
            return Err(e.into());
        }

        on_progress(JobProgress::status(JobStatus::Muxing, 0.8));

        let manifest_path = workdir.join("concat.txt");
        let ordered_paths = merge_queue
            .all_in_order(playlist.segments.len())
            .context("merge queue incomplete after successful engine run")?;
        write_concat_manifest(&manifest_path, &ordered_paths)?;

        self.muxer
            .concatenate(&manifest_path, output_path)
            .map_err(|e| {
                let msg = format!("muxing failed: {e}");
                on_progress(JobProgress::failed(msg.clone()));
                anyhow::anyhow!(msg)
            })?;

        let state_path = workdir.join(crate::engine::STATE_FILE_NAME);
        let _ = std::fs::remove_file(&state_path);
        let _ = std::fs::remove_dir_all(workdir);

        on_progress(JobProgress::status(JobStatus::Completed, 1.0));
        Ok(())
    }
}

fn write_concat_manifest(manifest_path: &Path, ordered_paths: &[PathBuf]) -> Result<()> {
    use std::io::Write;
    let mut out = String::new();
    for path in ordered_paths {
        let abs = path
            .canonicalize()
            .unwrap_or_else(|_| path.clone());
        out.push_str(&format!("file '{}'\n", abs.display()));
    }
    let mut file = std::fs::File::create(manifest_path)
        .with_context(|| format!("creating {}", manifest_path.display()))?;
    file.write_all(out.as_bytes())?;
    Ok(())
}
