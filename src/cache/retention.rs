//! Retention cache - Source URL -> stored artifact, with bounded lifetime
//!
//! Maintenance is cooperative: there is no background thread. Every `lookup`
//! and `register` first checks whether `sweep_interval` has elapsed since the
//! last sweep and, if so, runs an age-only sweep before doing its own work.
//!
//! Lookups evict lazily on age OR a missing backing file; the periodic sweep
//! evicts on age only.
//!
//! All index reads and writes happen under one mutex, so concurrent callers
//! never lose updates to `index.json`.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::cache::key::CacheKey;
use crate::cache::meta::{CacheEntry, CacheIndex, CacheStats};
use crate::cache::store;
use crate::config::CacheConfig;
use crate::core::clock::{Clock, SystemClock};
use crate::core::paths::{artifact_path, index_path, partial_path};
use crate::core::util::{bytes_to_mb, round2};
use crate::error::Result;

/// A lookup hit
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArtifact {
    pub key: CacheKey,
    /// Canonical stored path
    pub path: PathBuf,
    pub duration: Option<f64>,
    pub size_mb: f64,
}

#[derive(Debug)]
struct CacheState {
    index: CacheIndex,
    last_sweep: Option<DateTime<Utc>>,
}

/// Retention cache over one storage directory
#[derive(Debug)]
pub struct RetentionCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    index_path: PathBuf,
    state: Mutex<CacheState>,
}

impl RetentionCache {
    /// Open the cache using wall-clock time
    pub fn open(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Open the cache with an explicit time source.
    ///
    /// Never fails: an uncreatable directory or unreadable index is logged and
    /// the cache starts cold.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        if let Err(e) = store::ensure_cache_dir(&config.dir) {
            tracing::warn!(error = %e, "cache directory unavailable; caching will be degraded");
        }

        let index_path = index_path(&config.dir);
        let index = match store::read_index(&index_path) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable cache index; starting empty");
                CacheIndex::new()
            }
        };
        tracing::debug!(
            dir = %config.dir.display(),
            entries = index.len(),
            "opened retention cache"
        );

        Self {
            config,
            clock,
            index_path,
            state: Mutex::new(CacheState {
                index,
                last_sweep: None,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Canonical artifact location for a key
    pub fn artifact_path(&self, key: &CacheKey) -> PathBuf {
        artifact_path(&self.config.dir, key.as_str())
    }

    /// Find a valid artifact for `source_url`.
    ///
    /// An entry that is too old or whose file has disappeared is evicted and
    /// reported as absent.
    pub fn lookup(&self, source_url: &str) -> Option<CachedArtifact> {
        let mut state = self.lock();
        let now = self.clock.now();
        self.sweep_if_due(&mut state, now);

        let key = CacheKey::from_source(source_url);
        let entry = state.index.get(&key)?;
        let path = self.artifact_path(&key);

        if entry.is_expired_at(now, self.config.retention) {
            tracing::info!(url = source_url, %key, "cache entry expired");
        } else if !path.exists() {
            tracing::info!(url = source_url, %key, "cached artifact missing on disk");
        } else {
            tracing::info!(url = source_url, %key, "cache hit");
            return Some(CachedArtifact {
                duration: entry.duration,
                size_mb: entry.size_mb,
                key,
                path,
            });
        }

        self.evict_locked(&mut state, &key);
        None
    }

    /// Copy `artifact` into the cache under `source_url`'s key.
    ///
    /// Returns the canonical stored path, or `artifact` itself if anything
    /// goes wrong; in that case the cache is left exactly as it was.
    pub fn register(&self, source_url: &str, artifact: &Path, duration: Option<f64>) -> PathBuf {
        let mut state = self.lock();
        let now = self.clock.now();
        self.sweep_if_due(&mut state, now);

        let key = CacheKey::from_source(source_url);
        match self.try_register(&mut state, &key, source_url, artifact, duration, now) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(url = source_url, error = %e, "failed to cache artifact; using original");
                artifact.to_path_buf()
            }
        }
    }

    fn try_register(
        &self,
        state: &mut CacheState,
        key: &CacheKey,
        source_url: &str,
        artifact: &Path,
        duration: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<PathBuf> {
        let staged = partial_path(&self.config.dir, key.as_str());
        let dest = self.artifact_path(key);

        let bytes = match store::copy_artifact(artifact, &staged) {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = store::remove_if_exists(&staged);
                return Err(e);
            }
        };

        let entry = CacheEntry {
            source_url: source_url.to_string(),
            created_at: now,
            size_mb: bytes_to_mb(bytes),
            duration,
            source_path: artifact.to_string_lossy().to_string(),
        };
        let size_mb = entry.size_mb;
        let previous = state.index.insert(key.clone(), entry);

        let committed = store::write_index(&self.index_path, &state.index)
            .and_then(|()| store::commit_artifact(&staged, &dest));
        if let Err(e) = committed {
            let _ = store::remove_if_exists(&staged);
            match previous {
                Some(previous) => state.index.insert(key.clone(), previous),
                None => state.index.remove(key),
            };
            // The index may already hold the new entry on disk
            self.persist(&state.index);
            return Err(e);
        }

        tracing::info!(url = source_url, %key, size_mb = round2(size_mb), "cached artifact");
        Ok(dest)
    }

    /// Evict every entry past the retention window. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let mut state = self.lock();
        let now = self.clock.now();
        self.sweep_locked(&mut state, now)
    }

    fn sweep_if_due(&self, state: &mut CacheState, now: DateTime<Utc>) {
        let due = match state.last_sweep {
            None => true,
            Some(last) => {
                now.signed_duration_since(last)
                    .to_std()
                    .unwrap_or_default()
                    >= self.config.sweep_interval
            }
        };
        if due {
            self.sweep_locked(state, now);
        }
    }

    fn sweep_locked(&self, state: &mut CacheState, now: DateTime<Utc>) -> usize {
        let expired: Vec<CacheKey> = state
            .index
            .iter()
            .filter(|(_, entry)| entry.is_expired_at(now, self.config.retention))
            .map(|(key, _)| key.clone())
            .collect();

        let evicted = expired
            .iter()
            .filter(|key| self.evict_locked(state, key))
            .count();
        state.last_sweep = Some(now);

        if evicted > 0 {
            tracing::info!(evicted, "swept expired cache entries");
        }
        evicted
    }

    /// Remove the artifact and its index entry together.
    ///
    /// If the file cannot be deleted the entry stays indexed, so the next
    /// lookup or sweep retries instead of leaving an untracked file behind.
    fn evict_locked(&self, state: &mut CacheState, key: &CacheKey) -> bool {
        let path = self.artifact_path(key);
        if let Err(e) = store::remove_if_exists(&path) {
            tracing::warn!(%key, error = %e, "failed to delete cached artifact; keeping entry");
            return false;
        }
        if state.index.remove(key).is_some() {
            self.persist(&state.index);
        }
        tracing::debug!(%key, "evicted cache entry");
        true
    }

    fn persist(&self, index: &CacheIndex) {
        if let Err(e) = store::write_index(&self.index_path, index) {
            tracing::warn!(error = %e, "failed to persist cache index");
        }
    }

    /// Summarize the index without evicting anything
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let now = self.clock.now();

        let mut valid_files = 0;
        let mut total_size_mb = 0.0;
        for entry in state.index.values() {
            if !entry.is_expired_at(now, self.config.retention) {
                valid_files += 1;
                total_size_mb += entry.size_mb;
            }
        }

        CacheStats {
            total_files: state.index.len(),
            valid_files,
            expired_files: state.index.len() - valid_files,
            total_size_mb: round2(total_size_mb),
            retention_hours: self.config.retention_hours(),
            cache_dir: self.config.dir.to_string_lossy().to_string(),
        }
    }

    /// Snapshot of every entry in key order
    pub fn entries(&self) -> Vec<(CacheKey, CacheEntry)> {
        self.lock()
            .index
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Delete every artifact and the index. Returns the number of files removed.
    pub fn clear_all(&self) -> usize {
        let mut state = self.lock();

        let mut removed = 0;
        for path in store::list_artifacts(&self.config.dir) {
            match store::remove_if_exists(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!(error = %e, "failed to delete cached artifact"),
            }
        }
        if let Err(e) = store::remove_if_exists(&self.index_path) {
            tracing::warn!(error = %e, "failed to delete cache index");
        }
        state.index.clear();

        tracing::info!(removed, "cleared cache");
        removed
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
