//! Side-cache of parsed topics.
//!
//! Entries are postcard-encoded [`TopicObject`]s under the metadata root. An
//! entry is only served while it is at least as new as the primary file, so
//! any rewrite of the primary (through the store or out of band) turns the
//! entry into a miss. The cache is never a source of truth and every failure
//! degrades to a miss.

use crate::fsutil::{remove_if_exists, write_atomic};
use crate::locator::Locator;
use crate::paths::{PathKind, PathResolver};
use crate::topic::TopicObject;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::debug;

/// Per-store cache of parsed topics, validated by modification time.
#[derive(Debug, Clone)]
pub struct MetadataCache {
    resolver: PathResolver,
}

impl MetadataCache {
    /// Creates a cache rooted at the resolver's metadata root.
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Cached topic, unless missing, unreadable or older than the primary.
    pub fn read(&self, locator: &Locator) -> Option<TopicObject> {
        let cache_path = self.resolver.resolve(locator, PathKind::MetaCache);
        let primary = self.resolver.resolve(locator, PathKind::Primary);

        let cached_at = modified(&cache_path)?;
        let written_at = modified(&primary)?;
        if cached_at < written_at {
            debug!(object = %locator, "metadata cache stale");
            return None;
        }

        let raw = fs::read(&cache_path).ok()?;
        match postcard::from_bytes(&raw) {
            Ok(topic) => Some(topic),
            Err(e) => {
                debug!(object = %locator, "discarding undecodable cache entry: {}", e);
                None
            }
        }
    }

    /// Stores `topic`. Failures are logged and otherwise ignored.
    pub fn write(&self, locator: &Locator, topic: &TopicObject) {
        let cache_path = self.resolver.resolve(locator, PathKind::MetaCache);
        let result = postcard::to_allocvec(topic)
            .map_err(|e| e.to_string())
            .and_then(|bytes| write_atomic(&cache_path, &bytes, None).map_err(|e| e.to_string()));
        if let Err(e) = result {
            debug!(object = %locator, "metadata cache write failed: {}", e);
        }
    }

    /// Drops the entry for `locator`, if any.
    pub fn invalidate(&self, locator: &Locator) {
        let cache_path = self.resolver.resolve(locator, PathKind::MetaCache);
        if let Err(e) = remove_if_exists(&cache_path) {
            debug!(object = %locator, "metadata cache invalidation failed: {}", e);
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
