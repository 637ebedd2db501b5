//! CLI surface for the HLS segment downloader.

use clap::{Parser, Subcommand};

/// Top-level CLI for the HLS segment downloader.
#[derive(Debug, Parser)]
#[command(name = "hlsdl")]
#[command(about = "hlsdl: resumable HLS segment downloader", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download an HLS playlist's media segments and mux them into one file.
    Fetch {
        /// Absolute URL of the `.m3u8` playlist to fetch.
        playlist_url: String,
        /// Path the muxed output file is written to.
        #[arg(long, value_name = "PATH")]
        output: std::path::PathBuf,
        /// Caller-supplied label for this task (display only; no effect on
        /// which rendition is fetched — multi-variant selection is out of
        /// scope).
        #[arg(long, default_value = "default")]
        quality_tag: String,
        /// Log to stderr instead of the XDG state-dir log file.
        #[arg(long)]
        verbose: bool,
    },

    /// Print shell completion scripts to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print a man page to stdout.
    Man,
}
