//! Single-segment GET, throttled write-to-temp, atomic rename, optional
//! decrypt-in-place (§4.11 steps 1-8), plus the per-segment retry loop
//! (§4.11's "Per-segment retry loop").
//!
//! Grounded on the reference crate's `downloader/segment.rs` single-`Easy`
//! transfer (one handle, one `write_function`, classify-then-retry), adapted
//! from byte-range writes at a fixed offset into one shared file to a
//! whole-body write into a dedicated per-segment file.

use crate::atomic;
use crate::crypto;
use crate::http_pool::HttpClientPool;
use crate::retry::{classify, decide, RetryCategory, RetryDecision, TransferError};
use crate::throttle::BandwidthThrottle;
use crate::traits::HeaderProvider;
use curl::easy::Easy;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

impl From<io::Error> for TransferError {
    fn from(e: io::Error) -> Self {
        TransferError::Storage(e)
    }
}

/// Runs entirely on a blocking-pool thread (via
/// [`crate::http_pool::PooledHandle::with_blocking`]): issues the GET,
/// streams the body through the throttle into `final_path` (atomically, via
/// [`atomic::write_stream`]), and decrypts in place if `key` is set. Returns
/// the number of ciphertext (on-the-wire) bytes transferred.
#[allow(clippy::too_many_arguments)]
fn fetch_segment_blocking(
    easy: &mut Easy,
    url: &Url,
    headers: &HashMap<String, String>,
    final_path: &Path,
    timeout: Duration,
    throttle: &BandwidthThrottle,
    cancel: &AtomicBool,
    key: Option<&[u8; crypto::KEY_LEN]>,
    explicit_iv: Option<[u8; crypto::IV_LEN]>,
    segment_index: usize,
) -> Result<u64, TransferError> {
    easy.url(url.as_str()).map_err(TransferError::Curl)?;
    easy.follow_location(true).map_err(TransferError::Curl)?;
    easy.connect_timeout(Duration::from_secs(30))
        .map_err(TransferError::Curl)?;
    easy.low_speed_limit(1024).map_err(TransferError::Curl)?;
    easy.low_speed_time(Duration::from_secs(60))
        .map_err(TransferError::Curl)?;
    easy.timeout(timeout).map_err(TransferError::Curl)?;

    if !headers.is_empty() {
        let mut list = curl::easy::List::new();
        for (k, v) in headers {
            list.append(&format!("{}: {}", k.trim(), v.trim()))
                .map_err(TransferError::Curl)?;
        }
        easy.http_headers(list).map_err(TransferError::Curl)?;
    }

    let mut written: u64 = 0;
    let mut write_err: Option<io::Error> = None;
    let mut cancelled_mid_transfer = false;

    let result: Result<(), TransferError> = atomic::write_stream(final_path, |file| {
        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    if cancel.load(Ordering::Relaxed) {
                        cancelled_mid_transfer = true;
                        return Ok(0);
                    }
                    throttle.throttle_blocking(data.len() as u64);
                    match io::Write::write_all(file, data) {
                        Ok(()) => {
                            written += data.len() as u64;
                            Ok(data.len())
                        }
                        Err(e) => {
                            write_err = Some(e);
                            Ok(0)
                        }
                    }
                })
                .map_err(TransferError::Curl)?;

            if let Err(e) = transfer.perform() {
                // Check cancellation first: the write_function's `Ok(0)` short write
                // makes curl report a generic write error, indistinguishable from a
                // genuine storage failure unless we consult the flag it set.
                if cancelled_mid_transfer {
                    return Err(TransferError::Cancelled);
                }
                if e.is_write_error() {
                    if let Some(io_err) = write_err.take() {
                        return Err(TransferError::Storage(io_err));
                    }
                }
                return Err(TransferError::Curl(e));
            }
        }

        let code = easy.response_code().map_err(TransferError::Curl)?;
        if !(200..300).contains(&code) {
            return Err(TransferError::Http(code));
        }
        Ok(())
    });
    result?;

    if let Some(key) = key {
        let ciphertext = std::fs::read(final_path).map_err(TransferError::Storage)?;
        match crypto::decrypt(&ciphertext, key, explicit_iv, segment_index as u64) {
            Ok(plaintext) => {
                atomic::write_bytes(final_path, &plaintext).map_err(TransferError::Storage)?;
            }
            Err(_) => {
                // Degraded mode (§4.8/§7/§9 Open Question 2): keep the
                // ciphertext on disk rather than fail the segment.
                tracing::warn!(segment_index, "decryption failed, passing through ciphertext");
            }
        }
    }

    Ok(written)
}

/// Samples a jitter value in `[0, cap_ms]`, the same `rand`-backed idiom the
/// pack's own exponential-backoff helper uses.
fn sample_jitter_ms(cap_ms: u64) -> u64 {
    if cap_ms == 0 {
        return 0;
    }
    rand::Rng::random_range(&mut rand::rng(), 0..=cap_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_never_exceeds_its_cap() {
        for _ in 0..100 {
            assert!(sample_jitter_ms(150) <= 150);
        }
    }

    #[test]
    fn zero_cap_jitter_is_always_zero() {
        assert_eq!(sample_jitter_ms(0), 0);
    }
}

/// Outcome of a single successful fetch: on-the-wire bytes and how long it took.
pub(super) struct FetchOk {
    pub bytes: u64,
    pub elapsed: Duration,
    pub attempts: u32,
}

/// Fetches segment `segment_index`, retrying per §4.6/§4.11's retry loop
/// until it succeeds, is classified non-retryable, or exhausts its attempts.
#[allow(clippy::too_many_arguments)]
pub(super) async fn fetch_segment_with_retry(
    pool: &HttpClientPool,
    throttle: &Arc<BandwidthThrottle>,
    header_provider: &dyn HeaderProvider,
    cancel: &Arc<AtomicBool>,
    segment_index: usize,
    url: &Url,
    final_path: &Path,
    timeout: Duration,
    key: Option<[u8; crypto::KEY_LEN]>,
    explicit_iv: Option<[u8; crypto::IV_LEN]>,
) -> Result<FetchOk, (RetryCategory, TransferError, Duration)> {
    let mut attempt = 1u32;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err((RetryCategory::Cancelled, TransferError::Cancelled, Duration::ZERO));
        }

        let headers = header_provider.headers_for(url);
        let mut handle = pool.acquire().await;
        let start = Instant::now();

        let url_owned = url.clone();
        let path_owned: PathBuf = final_path.to_path_buf();
        let throttle_owned = Arc::clone(throttle);
        let cancel_owned = Arc::clone(cancel);

        let fetch_result = handle
            .with_blocking(move |easy| {
                fetch_segment_blocking(
                    easy,
                    &url_owned,
                    &headers,
                    &path_owned,
                    timeout,
                    &throttle_owned,
                    &cancel_owned,
                    key.as_ref(),
                    explicit_iv,
                    segment_index,
                )
            })
            .await;
        let elapsed = start.elapsed();
        drop(handle);

        match fetch_result {
            Ok(bytes) => {
                return Ok(FetchOk {
                    bytes,
                    elapsed,
                    attempts: attempt,
                })
            }
            Err(e) => {
                let category = classify(&e);
                match decide(category, attempt, sample_jitter_ms(100 + 50 * attempt as u64)) {
                    RetryDecision::RetryAfter(d) => {
                        tracing::warn!(
                            segment_index,
                            attempt,
                            category = ?category,
                            delay_ms = d.as_millis() as u64,
                            "segment fetch failed, retrying"
                        );
                        tokio::time::sleep(d).await;
                        attempt += 1;
                        continue;
                    }
                    RetryDecision::NoRetry => return Err((category, e, elapsed)),
                }
            }
        }
    }
}
