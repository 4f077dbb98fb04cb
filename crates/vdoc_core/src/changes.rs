//! Per-namespace change log.
//!
//! One JSON array per namespace, oldest first. Every append drops records
//! older than the retention window. The log is guarded by a namespace-level
//! mutex key, separate from any object's key.

use crate::engine::RevisionEngine;
use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;
use crate::locator::Locator;
use crate::mutex::MutexMode;
use crate::paths::PathResolver;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

/// What happened to an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeVerb {
    /// A new revision was saved.
    Save,
    /// The latest revision was replaced in place.
    Replace,
    /// The latest revision was rolled back.
    DeleteRevision,
    /// The object arrived by move or copy.
    Move,
    /// The object was removed.
    Remove,
}

/// One change log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Topic name.
    pub topic: String,
    /// Attachment name, for attachment changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    /// When the change happened, unix seconds.
    pub time: i64,
    /// Who made it.
    pub author: String,
    /// Check-in comment.
    #[serde(default)]
    pub comment: String,
    /// Minor changes are hidden from notification consumers.
    #[serde(default)]
    pub minor: bool,
    /// Kind of change.
    pub verb: ChangeVerb,
    /// Revision after the change.
    pub revision: u32,
}

impl ChangeRecord {
    /// A record for `locator` with an empty comment.
    pub fn new(locator: &Locator, verb: ChangeVerb, author: impl Into<String>, time: i64, revision: u32) -> Self {
        Self {
            topic: locator.topic_name().to_string(),
            attachment: locator.attachment_name().map(str::to_string),
            time,
            author: author.into(),
            comment: String::new(),
            minor: false,
            verb,
            revision,
        }
    }
}

/// Appends `record` to `namespace`'s log, pruning records older than
/// `now - retention_secs`.
pub(crate) fn append(
    engine: &RevisionEngine,
    namespace: &str,
    record: ChangeRecord,
    now: i64,
    retention_secs: u64,
) -> Result<()> {
    let _token = engine
        .mutexes()
        .acquire(&PathResolver::changes_key(namespace), MutexMode::Exclusive)?;
    let path = engine.resolver().changes_path(namespace);

    let cutoff = now.saturating_sub(i64::try_from(retention_secs).unwrap_or(i64::MAX));
    let mut records = load(&path);
    records.retain(|r| r.time >= cutoff);
    records.push(record);

    let json = serde_json::to_string_pretty(&records).map_err(|e| StoreError::Serialization(e.to_string()))?;
    write_atomic(&path, json.as_bytes(), None)
}

/// Records of `namespace` at or after `since`, newest first.
pub(crate) fn since(engine: &RevisionEngine, namespace: &str, since: i64) -> Result<Vec<ChangeRecord>> {
    let _token = engine
        .mutexes()
        .acquire(&PathResolver::changes_key(namespace), MutexMode::Shared)?;
    let mut records = load(&engine.resolver().changes_path(namespace));
    records.retain(|r| r.time >= since);
    records.reverse();
    Ok(records)
}

fn load(path: &Path) -> Vec<ChangeRecord> {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
            warn!(path = %path.display(), "discarding unreadable change log: {}", e);
            Vec::new()
        }),
        Err(_) => Vec::new(),
    }
}
