//! Backends module - External tool integrations
//!
//! Provides:
//! - download: yt-dlp audio download through the retention cache
//! - transcriber: whisper.cpp / whisper backend selection
//! - doctor: External tool checks
//! - trends: Keyword trend proxy with offline sample data (feature "server")

pub mod doctor;
pub mod download;
pub mod transcriber;
#[cfg(feature = "server")]
pub mod trends;
