//! Audio download through the retention cache
//!
//! yt-dlp is an opaque subprocess here: we only look at its exit status, the
//! file it leaves behind, and the duration it prints.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::cache::RetentionCache;
use crate::core::model::{Kind, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::util::{bytes_to_mb, command_exists};

/// File stem used for audio inside a work directory
pub const AUDIO_STEM: &str = "audio";

/// Audio codec and bitrate requested from the downloader
pub const AUDIO_CODEC: &str = "mp3";
pub const AUDIO_QUALITY: &str = "192K";

/// Something that can turn a URL into a local audio file
pub trait AudioSource {
    /// Media duration in seconds, if the source reports one
    fn probe_duration(&self, url: &str) -> Result<Option<f64>>;

    /// Download audio for `url` into `work_dir`, returning the file written
    fn download(&self, url: &str, work_dir: &Path) -> Result<PathBuf>;
}

/// yt-dlp backed audio source
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn is_available(&self) -> bool {
        command_exists(&self.program)
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl AudioSource for YtDlp {
    fn probe_duration(&self, url: &str) -> Result<Option<f64>> {
        let output = Command::new(&self.program)
            .args(["--skip-download", "--no-warnings", "--print", "duration"])
            .arg(url)
            .output()
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !output.status.success() {
            bail!(
                "{} could not read metadata: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(parse_duration(&String::from_utf8_lossy(&output.stdout)))
    }

    fn download(&self, url: &str, work_dir: &Path) -> Result<PathBuf> {
        let template = work_dir.join(format!("{}.%(ext)s", AUDIO_STEM));
        let status = Command::new(&self.program)
            .args(["--quiet", "--no-warnings", "--format", "bestaudio/best"])
            .args(["--extract-audio", "--audio-format", AUDIO_CODEC])
            .args(["--audio-quality", AUDIO_QUALITY])
            .arg("--output")
            .arg(&template)
            .arg(url)
            .status()
            .with_context(|| format!("Failed to run {}", self.program))?;

        if !status.success() {
            bail!("{} exited with {}", self.program, status);
        }

        let audio = audio_path(work_dir);
        if !audio.exists() {
            bail!("downloaded audio not found: {}", audio.display());
        }
        Ok(audio)
    }
}

/// Audio ready for transcription
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedAudio {
    /// Working copy; safe for the caller to delete
    pub path: PathBuf,
    pub size_mb: f64,
    pub duration: Option<f64>,
    pub from_cache: bool,
}

/// Where audio for a work directory ends up
pub fn audio_path(work_dir: &Path) -> PathBuf {
    work_dir.join(format!("{}.{}", AUDIO_STEM, AUDIO_CODEC))
}

/// Obtain audio for `url` in `work_dir`, serving from the cache when possible.
///
/// Cache hits are copied into `work_dir` so the caller may clean it up freely.
/// A hit that cannot be copied is treated as a miss.
pub fn fetch_audio(
    cache: &RetentionCache,
    source: &dyn AudioSource,
    url: &str,
    work_dir: &Path,
) -> Result<FetchedAudio> {
    fs::create_dir_all(work_dir)
        .with_context(|| format!("Failed to create work dir: {}", work_dir.display()))?;

    if let Some(hit) = cache.lookup(url) {
        let dest = audio_path(work_dir);
        match fs::copy(&hit.path, &dest) {
            Ok(bytes) => {
                return Ok(FetchedAudio {
                    path: dest,
                    size_mb: bytes_to_mb(bytes),
                    duration: hit.duration,
                    from_cache: true,
                })
            }
            Err(e) => {
                tracing::warn!(
                    url,
                    path = %hit.path.display(),
                    error = %e,
                    "cached audio unreadable; downloading again"
                );
            }
        }
    }

    tracing::info!(url, "downloading audio");
    let duration = source.probe_duration(url)?;
    let downloaded = source.download(url, work_dir)?;
    let bytes = fs::metadata(&downloaded)
        .with_context(|| format!("Failed to stat {}", downloaded.display()))?
        .len();

    cache.register(url, &downloaded, duration);

    Ok(FetchedAudio {
        path: downloaded,
        size_mb: bytes_to_mb(bytes),
        duration,
        from_cache: false,
    })
}

/// Run the fetch command
pub fn run_fetch(
    cache: &RetentionCache,
    source: &dyn AudioSource,
    url: &str,
    out_dir: &Path,
    config: RenderConfig,
) -> Result<()> {
    let fetched = fetch_audio(cache, source, url, out_dir)?;

    let mut result_set = ResultSet::new();
    result_set.push(
        ResultItem::new(Kind::Audio)
            .with_path(fetched.path.to_string_lossy())
            .with_summary(url)
            .with_data(serde_json::json!({
                "size_mb": fetched.size_mb,
                "duration": fetched.duration,
                "from_cache": fetched.from_cache,
            })),
    );

    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(&result_set));
    Ok(())
}

/// Parse yt-dlp's `--print duration` output ("NA" when unknown)
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
}
