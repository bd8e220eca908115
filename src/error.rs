//! Storage-layer errors
//!
//! These never escape the public `RetentionCache` operations: every public
//! entry point catches them, logs, and degrades to "as if no cache existed".

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error raised by cache storage operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure against the storage directory
    #[error("I/O {operation} failed: {}", path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The durable index exists but could not be parsed
    #[error("cache index is unreadable: {}", path.display())]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory index could not be serialized
    #[error("failed to serialize cache index")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    pub fn io(operation: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = CacheError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_message_names_path() {
        let err = CacheError::io(
            "copy",
            Path::new("/tmp/missing.mp3"),
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let message = err.to_string();
        assert!(message.contains("copy"));
        assert!(message.contains("/tmp/missing.mp3"));
    }
}
