//! Cache module - Retention cache for downloaded audio
//!
//! Provides:
//! - Cache keys derived from source URLs
//! - Entry metadata and the persisted index
//! - Filesystem storage helpers
//! - The retention cache itself (lookup, register, sweep, stats, clear)

pub mod commands;
pub mod key;
pub mod meta;
pub mod retention;
pub mod store;

pub use key::CacheKey;
pub use meta::CacheEntry;
pub use retention::RetentionCache;
