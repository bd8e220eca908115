//! Storage layout
//!
//! One directory holds one `<key>.mp3` artifact per cache key plus `index.json`.

use std::path::{Path, PathBuf};

/// Extension of stored artifacts
pub const ARTIFACT_EXTENSION: &str = "mp3";

/// Name of the durable index file
pub const INDEX_FILE: &str = "index.json";

/// Suffix used while an artifact is being copied in
pub const PARTIAL_SUFFIX: &str = "partial";

/// Canonical artifact path for a key
pub fn artifact_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", key, ARTIFACT_EXTENSION))
}

/// Staging path used before an artifact is committed
pub fn partial_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}.{}", key, ARTIFACT_EXTENSION, PARTIAL_SUFFIX))
}

/// Path of the durable index
pub fn index_path(dir: &Path) -> PathBuf {
    dir.join(INDEX_FILE)
}

/// Whether a path follows the artifact naming convention
pub fn is_artifact(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(ARTIFACT_EXTENSION)
}
