//! CLI entry points for cache maintenance and inspection

use anyhow::Result;
use serde_json::json;
use std::path::Path;

use crate::cache::{CacheEntry, CacheKey, RetentionCache};
use crate::core::model::{Issue, Kind, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};

fn emit(result_set: &ResultSet, config: RenderConfig) {
    if result_set.is_empty() {
        return;
    }
    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(result_set));
}

fn entry_item(cache: &RetentionCache, key: &CacheKey, entry: &CacheEntry) -> ResultItem {
    ResultItem::new(Kind::Entry)
        .with_key(key.as_str())
        .with_path(cache.artifact_path(key).to_string_lossy())
        .with_summary(entry.source_url.clone())
        .with_data(json!(entry))
}

/// Print the cache key for a URL
pub fn run_key(url: &str, config: RenderConfig) -> Result<()> {
    let key = CacheKey::from_source(url);
    let item = ResultItem::new(Kind::Key)
        .with_key(key.as_str())
        .with_summary(url);
    emit(&ResultSet::from_iter([item]), config);
    Ok(())
}

/// Print the cached artifact for a URL; prints nothing when absent
pub fn run_lookup(cache: &RetentionCache, url: &str, config: RenderConfig) -> Result<()> {
    let result_set: ResultSet = cache
        .lookup(url)
        .map(|hit| {
            ResultItem::new(Kind::Entry)
                .with_key(hit.key.as_str())
                .with_path(hit.path.to_string_lossy())
                .with_summary(url)
                .with_data(json!({
                    "duration": hit.duration,
                    "size_mb": hit.size_mb,
                }))
        })
        .into_iter()
        .collect();
    emit(&result_set, config);
    Ok(())
}

/// Register a local file under a URL
pub fn run_register(
    cache: &RetentionCache,
    url: &str,
    file: &Path,
    duration: Option<f64>,
    config: RenderConfig,
) -> Result<()> {
    let key = CacheKey::from_source(url);
    let stored = cache.register(url, file, duration);
    let cached = stored == cache.artifact_path(&key);

    let mut item = ResultItem::new(Kind::Entry)
        .with_key(key.as_str())
        .with_path(stored.to_string_lossy())
        .with_summary(url)
        .with_data(json!({ "cached": cached }));
    if !cached {
        item = item.with_error(Issue::new(
            "NOT_CACHED",
            format!("could not cache {}; original path returned", file.display()),
        ));
    }

    emit(&ResultSet::from_iter([item]), config);
    Ok(())
}

/// Print cache statistics
pub fn run_stats(cache: &RetentionCache, config: RenderConfig) -> Result<()> {
    let stats = cache.stats();
    let item = ResultItem::new(Kind::Stats)
        .with_path(stats.cache_dir.clone())
        .with_summary(format!(
            "{} valid / {} total, {:.2} MB",
            stats.valid_files, stats.total_files, stats.total_size_mb
        ))
        .with_data(json!(stats));
    emit(&ResultSet::from_iter([item]), config);
    Ok(())
}

/// List every indexed entry, expired ones included
pub fn run_list(cache: &RetentionCache, config: RenderConfig) -> Result<()> {
    let result_set: ResultSet = cache
        .entries()
        .iter()
        .map(|(key, entry)| entry_item(cache, key, entry))
        .collect();
    emit(&result_set, config);
    Ok(())
}

/// Run an age-based sweep now
pub fn run_sweep(cache: &RetentionCache, config: RenderConfig) -> Result<()> {
    let evicted = cache.sweep_expired();
    let item = ResultItem::new(Kind::Maintenance)
        .with_summary(format!("swept {} expired entries", evicted))
        .with_data(json!({ "action": "sweep", "evicted": evicted }));
    emit(&ResultSet::from_iter([item]), config);
    Ok(())
}

/// Remove every cached artifact and the index
pub fn run_clear(cache: &RetentionCache, config: RenderConfig) -> Result<()> {
    let removed = cache.clear_all();
    let item = ResultItem::new(Kind::Maintenance)
        .with_summary(format!("removed {} cached files", removed))
        .with_data(json!({ "action": "clear", "removed_files": removed }));
    emit(&ResultSet::from_iter([item]), config);
    Ok(())
}
