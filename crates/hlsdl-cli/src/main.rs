mod cli;
mod header_provider;
mod muxer;

use clap::{CommandFactory, Parser};
use cli::{Cli, Command};
use header_provider::CurlHeaderProvider;
use hlsdl_core::concurrency::AdaptiveConcurrencyController;
use hlsdl_core::config;
use hlsdl_core::engine::SegmentDownloadEngine;
use hlsdl_core::http_pool::HttpClientPool;
use hlsdl_core::job::{JobController, JobStatus};
use hlsdl_core::logging;
use hlsdl_core::net_monitor::NetworkMonitor;
use hlsdl_core::throttle::BandwidthThrottle;
use hlsdl_core::throughput::ThroughputEstimator;
use muxer::FfmpegMuxer;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

fn task_id_for(playlist_url: &str, quality_tag: &str) -> String {
    let mut hasher = DefaultHasher::new();
    playlist_url.hash(&mut hasher);
    quality_tag.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

async fn run_fetch(
    playlist_url: String,
    output: std::path::PathBuf,
    quality_tag: String,
) -> anyhow::Result<()> {
    let cfg = config::load_or_init()?;
    tracing::debug!(?cfg, "loaded config");

    let url = Url::parse(&playlist_url)?;
    let task_id = task_id_for(&playlist_url, &quality_tag);
    let workdir = std::env::temp_dir().join(format!("m3u8_download_{task_id}"));

    let pool = Arc::new(HttpClientPool::new(cfg.http.pool_size));
    let monitor = Arc::new(NetworkMonitor::new(cfg.monitor.window_size));
    let controller = Arc::new(AdaptiveConcurrencyController::new(
        cfg.concurrency.min,
        cfg.concurrency.max,
        cfg.concurrency.initial,
        cfg.concurrency.memory_cap_bytes,
    ));
    let throttle = Arc::new(BandwidthThrottle::new(cfg.throttle.max_bytes_per_sec));
    let throughput = Arc::new(ThroughputEstimator::new(cfg.throughput.window_size));

    let engine = SegmentDownloadEngine::new(
        Arc::clone(&pool),
        Arc::clone(&monitor),
        Arc::clone(&controller),
        Arc::clone(&throttle),
        Arc::clone(&throughput),
        Duration::from_secs(cfg.http.segment_timeout_secs),
        Duration::from_secs(cfg.concurrency.tick_secs),
    );

    let header_provider = Arc::new(CurlHeaderProvider::new(&url));
    let muxer = Arc::new(FfmpegMuxer::new());
    let job = JobController::new(pool, engine, header_provider, muxer, cfg);

    let cancel = Arc::new(AtomicBool::new(false));
    let result = job
        .run(&url, &workdir, &output, cancel, |p| {
            match p.status {
                JobStatus::FetchingPlaylist => println!("fetching playlist..."),
                JobStatus::Downloading => println!(
                    "\rdownloading: {:.1}%  {:.2} KiB/s  ETA {}",
                    p.fraction * 100.0,
                    p.speed_bps / 1024.0,
                    p.eta
                        .map(|d| format!("{}s", d.as_secs()))
                        .unwrap_or_else(|| "--".to_string()),
                ),
                JobStatus::Muxing => println!("\nmuxing..."),
                JobStatus::Completed => println!("done: {}", output.display()),
                JobStatus::Failed => {
                    if let Some(msg) = &p.error_message {
                        eprintln!("failed: {msg}");
                    }
                }
                JobStatus::Cancelled => println!("cancelled"),
            }
        })
        .await;

    result
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Fetch {
            playlist_url,
            output,
            quality_tag,
            verbose,
        } => {
            if verbose {
                logging::init_logging_stderr();
            } else if logging::init_logging().is_err() {
                logging::init_logging_stderr();
            }

            if let Err(err) = run_fetch(playlist_url, output, quality_tag).await {
                eprintln!("hlsdl error: {err:#}");
                std::process::exit(1);
            }
        }
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        Command::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buf = Vec::new();
            if man.render(&mut buf).is_ok() {
                use std::io::Write;
                let _ = std::io::stdout().write_all(&buf);
            }
        }
    }
}
