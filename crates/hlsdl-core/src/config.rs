use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Global configuration loaded from `~/.config/hlsdl/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    pub pool_size: usize,
    pub playlist_timeout_secs: u64,
    pub segment_timeout_secs: u64,
    pub key_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            pool_size: 8,
            playlist_timeout_secs: 60,
            segment_timeout_secs: 45,
            key_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConcurrencyConfig {
    pub min: usize,
    pub max: usize,
    pub initial: usize,
    pub tick_secs: u64,
    pub memory_cap_bytes: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            min: 1,
            max: 8,
            initial: 4,
            tick_secs: 5,
            memory_cap_bytes: 50 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ThrottleConfig {
    pub max_bytes_per_sec: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MonitorConfig {
    pub window_size: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { window_size: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThroughputConfig {
    pub window_size: usize,
}

impl Default for ThroughputConfig {
    fn default() -> Self {
        Self { window_size: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HlsDlConfig {
    pub http: HttpConfig,
    pub concurrency: ConcurrencyConfig,
    pub throttle: ThrottleConfig,
    pub monitor: MonitorConfig,
    pub throughput: ThroughputConfig,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("hlsdl")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HlsDlConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HlsDlConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!(path = %path.display(), "created default config");
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: HlsDlConfig = toml::from_str(&data)?;
    Ok(cfg)
}
