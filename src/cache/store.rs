//! Cache store - Filesystem side of the retention cache
//!
//! Plain functions over the storage directory. None of them log or degrade;
//! that happens one level up in `RetentionCache`.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::cache::meta::CacheIndex;
use crate::core::paths::is_artifact;
use crate::error::{CacheError, Result};

/// Ensure the storage directory exists
pub fn ensure_cache_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| CacheError::io("create", dir, e))
}

/// Load the index; a missing file is an empty index
pub fn read_index(path: &Path) -> Result<CacheIndex> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(CacheIndex::new()),
        Err(e) => return Err(CacheError::io("read", path, e)),
    };

    serde_json::from_str(&content).map_err(|source| CacheError::CorruptIndex {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the full index as pretty JSON
pub fn write_index(path: &Path, index: &CacheIndex) -> Result<()> {
    let json = serde_json::to_string_pretty(index)?;
    fs::write(path, json).map_err(|e| CacheError::io("write", path, e))
}

/// Remove a file, treating "already gone" as success
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CacheError::io("remove", path, e)),
    }
}

/// Copy `from` to `to` and return the copied byte length
pub fn copy_artifact(from: &Path, to: &Path) -> Result<u64> {
    fs::copy(from, to).map_err(|e| CacheError::io("copy", from, e))?;
    let metadata = fs::metadata(to).map_err(|e| CacheError::io("stat", to, e))?;
    Ok(metadata.len())
}

/// Atomically move a staged artifact into place
pub fn commit_artifact(staged: &Path, dest: &Path) -> Result<()> {
    fs::rename(staged, dest).map_err(|e| CacheError::io("rename", staged, e))
}

/// Everything directly inside the storage directory named like an artifact.
///
/// Entries are not filtered by type; deleting a non-file fails and is
/// reported by the caller.
pub fn list_artifacts(dir: &Path) -> Vec<std::path::PathBuf> {
    walkdir::WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| is_artifact(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::CacheKey;
    use crate::cache::meta::CacheEntry;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_cache_dir_is_idempotent() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("nested/cache");
        ensure_cache_dir(&dir).unwrap();
        ensure_cache_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_read_missing_index_is_empty() {
        let temp = tempdir().unwrap();
        let index = read_index(&temp.path().join("index.json")).unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn test_read_corrupt_index_is_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_index(&path).unwrap_err();
        assert!(matches!(err, CacheError::CorruptIndex { .. }));
    }

    #[test]
    fn test_write_read_index() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("index.json");

        let mut index = CacheIndex::new();
        index.insert(
            CacheKey::from_source("https://ex/a"),
            CacheEntry {
                source_url: "https://ex/a".to_string(),
                created_at: Utc::now(),
                size_mb: 0.5,
                duration: None,
                source_path: "/tmp/a.mp3".to_string(),
            },
        );
        write_index(&path, &index).unwrap();

        let read = read_index(&path).unwrap();
        assert_eq!(read, index);
        // human-inspectable
        assert!(fs::read_to_string(&path).unwrap().contains("\n  "));
    }

    #[test]
    fn test_remove_if_exists_tolerates_missing() {
        let temp = tempdir().unwrap();
        remove_if_exists(&temp.path().join("nope.mp3")).unwrap();
    }

    #[test]
    fn test_copy_artifact_reports_length() {
        let temp = tempdir().unwrap();
        let from = temp.path().join("in.mp3");
        fs::write(&from, vec![0u8; 1234]).unwrap();

        let len = copy_artifact(&from, &temp.path().join("out.mp3")).unwrap();
        assert_eq!(len, 1234);
        assert!(from.exists());
    }

    #[test]
    fn test_list_artifacts_filters_by_extension() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.mp3"), "a").unwrap();
        fs::write(temp.path().join("b.mp3"), "b").unwrap();
        fs::write(temp.path().join("index.json"), "{}").unwrap();
        fs::write(temp.path().join("c.mp3.partial"), "c").unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("sub/d.mp3"), "d").unwrap();

        let mut names: Vec<_> = list_artifacts(temp.path())
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.mp3", "b.mp3"]);
    }

    #[test]
    fn test_remove_if_exists_reports_directories() {
        let temp = tempdir().unwrap();
        let stuck = temp.path().join("stuck.mp3");
        fs::create_dir(&stuck).unwrap();

        assert!(list_artifacts(temp.path()).contains(&stuck));
        assert!(remove_if_exists(&stuck).is_err());
    }
}
