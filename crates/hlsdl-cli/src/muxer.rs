//! Real `Muxer`: shells out to `ffmpeg`'s concat demuxer with stream copy
//! (§4.12/§6's conventional, non-mandated command).

use anyhow::{bail, Context, Result};
use hlsdl_core::traits::Muxer;
use std::path::Path;
use std::process::Command;

pub struct FfmpegMuxer {
    binary: String,
}

impl FfmpegMuxer {
    pub fn new() -> Self {
        FfmpegMuxer {
            binary: "ffmpeg".to_string(),
        }
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl Muxer for FfmpegMuxer {
    fn concatenate(&self, manifest_path: &Path, output_path: &Path) -> Result<()> {
        let status = Command::new(&self.binary)
            .args(["-y", "-f", "concat", "-safe", "0", "-i"])
            .arg(manifest_path)
            .args(["-c", "copy"])
            .arg(output_path)
            .status()
            .with_context(|| format!("spawning `{}`", self.binary))?;

        if !status.success() {
            bail!("ffmpeg exited with {status}");
        }
        Ok(())
    }
}
