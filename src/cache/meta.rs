//! Cache entry metadata

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::cache::key::CacheKey;

/// Metadata stored for one cached artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Original source URL
    pub source_url: String,

    /// Registration time; reads never refresh it
    pub created_at: DateTime<Utc>,

    /// Size of the stored artifact in megabytes
    pub size_mb: f64,

    /// Media duration in seconds, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Path the artifact was copied from at registration
    pub source_path: String,
}

impl CacheEntry {
    /// Age at `now`; timestamps in the future count as zero age
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        self.age_at(now) >= retention
    }
}

/// Full key -> entry mapping, mirrored to `index.json`
pub type CacheIndex = BTreeMap<CacheKey, CacheEntry>;

/// Read-only summary of the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub valid_files: usize,
    pub expired_files: usize,
    pub total_size_mb: f64,
    pub retention_hours: f64,
    pub cache_dir: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(created_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            source_url: "https://ex/a".to_string(),
            created_at,
            size_mb: 2.0,
            duration: Some(120.0),
            source_path: "/tmp/a.mp3".to_string(),
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let created = Utc::now();
        let retention = Duration::from_secs(3600);
        let e = entry(created);

        let just_before = created + chrono::Duration::seconds(3599);
        let exactly = created + chrono::Duration::seconds(3600);
        assert!(!e.is_expired_at(just_before, retention));
        assert!(e.is_expired_at(exactly, retention));
    }

    #[test]
    fn test_future_created_at_is_fresh() {
        let now = Utc::now();
        let e = entry(now + chrono::Duration::hours(1));
        assert_eq!(e.age_at(now), Duration::ZERO);
        assert!(!e.is_expired_at(now, Duration::from_secs(1)));
    }

    #[test]
    fn test_missing_duration_deserializes_as_none() {
        let json = r#"{
            "source_url": "https://ex/a",
            "created_at": "2026-01-01T00:00:00Z",
            "size_mb": 1.5,
            "source_path": "/tmp/a.mp3"
        }"#;
        let e: CacheEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.duration, None);
        assert_eq!(e.size_mb, 1.5);
    }
}
