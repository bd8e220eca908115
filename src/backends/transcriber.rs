//! Transcription backend selection
//!
//! The backend is chosen once at startup by probing what is installed:
//! whisper.cpp's `whisper-cli` first (when enabled), then the `whisper` CLI.
//! Both are driven as subprocesses that write `<stem>.txt` and `<stem>.json`
//! next to the audio. The JSON carries timed segments used for line-per-segment
//! formatting.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::config::ToolConfig;
use crate::core::util::command_exists;

/// Models accepted by the API
pub const AVAILABLE_MODELS: &[&str] = &["tiny", "base", "small", "medium", "large"];
pub const DEFAULT_MODEL: &str = "large";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_TIMEOUT: Duration = Duration::from_secs(1800);
const TIMEOUT_PER_MB_SECS: f64 = 10.0;

/// Selected transcription strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriberBackend {
    /// whisper.cpp `whisper-cli` with ggml models
    WhisperCpp { binary: PathBuf, models_dir: PathBuf },
    /// OpenAI whisper Python CLI on CPU
    Whisper { program: String },
}

impl TranscriberBackend {
    /// Pick the first available backend in fallback order
    pub fn select(tools: &ToolConfig) -> Option<Self> {
        let binary = whisper_cpp_binary(&tools.whisper_cpp_dir);
        if tools.use_whisper_cpp && binary.is_file() {
            return Some(Self::WhisperCpp {
                binary,
                models_dir: tools.whisper_cpp_models.clone(),
            });
        }
        if command_exists(&tools.whisper) {
            return Some(Self::Whisper {
                program: tools.whisper.clone(),
            });
        }
        None
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::WhisperCpp { .. } => "whisper.cpp",
            Self::Whisper { .. } => "whisper",
        }
    }

    /// Build the command that transcribes `audio` into `out_dir/<stem>.{txt,json}`
    pub fn command(&self, audio: &Path, model: &str, out_dir: &Path) -> Command {
        match self {
            Self::WhisperCpp { binary, models_dir } => {
                let model_file = models_dir.join(format!("ggml-{}.bin", whisper_cpp_model(model)));
                let mut cmd = Command::new(binary);
                cmd.arg("-m")
                    .arg(model_file)
                    .arg("-f")
                    .arg(audio)
                    .arg("--output-txt")
                    .arg("--output-json")
                    .arg("--output-file")
                    .arg(out_dir.join(stem(audio)));
                cmd
            }
            Self::Whisper { program } => {
                let mut cmd = Command::new(program);
                cmd.arg(audio)
                    .args(["--model", model])
                    .args(["--device", "cpu"])
                    .args(["--output_format", "all"])
                    .arg("--output_dir")
                    .arg(out_dir);
                cmd
            }
        }
    }
}

/// Where whisper.cpp keeps its CLI inside a checkout
pub fn whisper_cpp_binary(checkout: &Path) -> PathBuf {
    checkout.join("build").join("bin").join("whisper-cli")
}

/// Map API model names onto whisper.cpp model files
pub fn whisper_cpp_model(model: &str) -> &str {
    match model {
        "tiny" => "tiny.en",
        "base" => "base.en",
        "small" => "small.en",
        "medium" => "medium.en",
        "large" => "large-v3",
        other => other,
    }
}

pub fn is_known_model(model: &str) -> bool {
    AVAILABLE_MODELS.contains(&model)
}

/// Time budget for transcribing `size_mb` of audio
pub fn transcription_timeout(size_mb: f64) -> Duration {
    let scaled = Duration::from_secs_f64((size_mb.max(0.0) * TIMEOUT_PER_MB_SECS).min(MAX_TIMEOUT.as_secs_f64()));
    scaled.max(DEFAULT_TIMEOUT).min(MAX_TIMEOUT)
}

/// Transcript file produced for `audio` in `out_dir`
pub fn transcript_path(audio: &Path, out_dir: &Path) -> PathBuf {
    out_dir.join(format!("{}.txt", stem(audio)))
}

/// Read and trim the transcript left behind by a backend run
pub fn read_transcript(audio: &Path, out_dir: &Path) -> Result<String> {
    let path = transcript_path(audio, out_dir);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Transcript not found: {}", path.display()))?;
    Ok(text.trim().to_string())
}

/// One timed piece of a transcript, in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct CppOffsets {
    from: u64,
    to: u64,
}

#[derive(Debug, Deserialize)]
struct CppSegment {
    offsets: CppOffsets,
    text: String,
}

/// The two JSON layouts the backends write
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriptJson {
    /// whisper.cpp: `transcription[]` with millisecond offsets
    WhisperCpp { transcription: Vec<CppSegment> },
    /// whisper: `segments[]` with seconds
    Whisper { segments: Vec<Segment> },
}

/// Parse a backend's JSON output into segments
pub fn parse_segments(json: &str) -> Result<Vec<Segment>> {
    let parsed: TranscriptJson = serde_json::from_str(json).context("Unrecognized transcript JSON")?;
    Ok(match parsed {
        TranscriptJson::WhisperCpp { transcription } => transcription
            .into_iter()
            .map(|seg| Segment {
                start: seg.offsets.from as f64 / 1000.0,
                end: seg.offsets.to as f64 / 1000.0,
                text: seg.text,
            })
            .collect(),
        TranscriptJson::Whisper { segments } => segments,
    })
}

/// Read the timed segments left behind by a backend run
pub fn read_segments(audio: &Path, out_dir: &Path) -> Result<Vec<Segment>> {
    let path = out_dir.join(format!("{}.json", stem(audio)));
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Segment file not found: {}", path.display()))?;
    parse_segments(&json)
}

/// One sentence per line, split after `.`, `!`, `?` and their full-width forms
pub fn format_sentences(text: &str) -> String {
    let mut lines = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?' | '。' | '！' | '？') {
            lines.push(current.trim().to_string());
            current.clear();
        }
    }
    lines.push(current.trim().to_string());

    lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// One segment per line, optionally prefixed with `[MM:SS-MM:SS]`
pub fn format_segments(segments: &[Segment], with_timestamps: bool) -> String {
    segments
        .iter()
        .filter_map(|seg| {
            let text = seg.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(if with_timestamps {
                format!("[{}-{}] {}", clock(seg.start), clock(seg.end), text)
            } else {
                text.to_string()
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Layout applied to a finished transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptLayout {
    pub segments: bool,
    pub timestamps: bool,
}

/// Read a backend's output and lay it out.
///
/// Segment layout falls back to sentence layout when the backend left no
/// usable segments.
pub fn render_transcript(audio: &Path, out_dir: &Path, layout: TranscriptLayout) -> Result<String> {
    let raw = read_transcript(audio, out_dir)?;
    if layout.segments {
        match read_segments(audio, out_dir) {
            Ok(segments) if !segments.is_empty() => {
                return Ok(format_segments(&segments, layout.timestamps))
            }
            Ok(_) => tracing::debug!("transcript has no segments; splitting sentences"),
            Err(e) => tracing::debug!(error = %e, "segments unavailable; splitting sentences"),
        }
    }
    Ok(format_sentences(&raw))
}

fn stem(audio: &Path) -> String {
    audio
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string())
}
