//! Runtime configuration
//!
//! Built once from CLI flags / environment and never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// Default storage directory
pub const DEFAULT_CACHE_DIR: &str = "./cache";
/// Default retention window in hours
pub const DEFAULT_RETENTION_HOURS: u64 = 24;
/// Default minimum spacing between periodic sweeps, in seconds
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
/// Default HTTP bind address
pub const DEFAULT_BIND: &str = "127.0.0.1:15000";

/// Configuration consumed by the retention cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Directory holding artifacts and the index file
    pub dir: PathBuf,
    /// Entries older than this are expired
    pub retention: Duration,
    /// Periodic sweeps run at most once per interval
    pub sweep_interval: Duration,
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>, retention: Duration, sweep_interval: Duration) -> Self {
        Self {
            dir: dir.into(),
            retention,
            sweep_interval,
        }
    }

    /// Retention window expressed in (possibly fractional) hours
    pub fn retention_hours(&self) -> f64 {
        self.retention.as_secs_f64() / 3600.0
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_CACHE_DIR,
            Duration::from_secs(DEFAULT_RETENTION_HOURS * 3600),
            Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        )
    }
}

/// Locations of the external tools the service shells out to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolConfig {
    /// Downloader executable (yt-dlp)
    pub downloader: String,
    /// Whether the whisper.cpp backend may be selected
    pub use_whisper_cpp: bool,
    /// whisper.cpp checkout (binary at build/bin/whisper-cli)
    pub whisper_cpp_dir: PathBuf,
    /// whisper.cpp ggml model directory
    pub whisper_cpp_models: PathBuf,
    /// Python whisper CLI executable
    pub whisper: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            downloader: "yt-dlp".to_string(),
            use_whisper_cpp: true,
            whisper_cpp_dir: PathBuf::from("./whisper.cpp"),
            whisper_cpp_models: PathBuf::from("./whisper.cpp/models"),
            whisper: "whisper".to_string(),
        }
    }
}
