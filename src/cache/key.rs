//! Cache keys derived from source URLs

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::util::hash_hex;

/// Stable, fixed-length identifier of one logical source
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a source URL
    pub fn from_source(source_url: &str) -> Self {
        Self(hash_hex(source_url.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
