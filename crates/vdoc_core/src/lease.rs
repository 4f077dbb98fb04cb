//! Edit leases: who claimed a topic for editing, and when.
//!
//! A lease is a JSON side file guarded by the owning topic's mutex. The
//! store records and returns leases; deciding whether one has expired is up
//! to the caller.

use crate::engine::RevisionEngine;
use crate::error::{Result, StoreError};
use crate::fsutil::{remove_if_exists, write_atomic};
use crate::locator::Locator;
use crate::mutex::MutexMode;
use crate::paths::PathKind;
use serde::{Deserialize, Serialize};
use std::fs;

/// An edit claim on a topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Who holds the lease.
    pub user: String,
    /// When it was taken, unix seconds.
    pub taken: i64,
}

pub(crate) fn get(engine: &RevisionEngine, locator: &Locator) -> Result<Option<Lease>> {
    let topic = locator.topic_locator();
    let _token = engine.mutexes().acquire(&topic.resource_key(), MutexMode::Shared)?;
    let path = engine.resolver().resolve(&topic, PathKind::Lease);

    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&data)
        .map(Some)
        .map_err(|e| StoreError::Deserialization(format!("{}: {}", path.display(), e)))
}

pub(crate) fn set(engine: &RevisionEngine, locator: &Locator, lease: &Lease) -> Result<()> {
    let topic = locator.topic_locator();
    let _token = engine.mutexes().acquire(&topic.resource_key(), MutexMode::Exclusive)?;
    let path = engine.resolver().resolve(&topic, PathKind::Lease);

    let json = serde_json::to_string(lease).map_err(|e| StoreError::Serialization(e.to_string()))?;
    write_atomic(&path, json.as_bytes(), None)
}

pub(crate) fn clear(engine: &RevisionEngine, locator: &Locator) -> Result<bool> {
    let topic = locator.topic_locator();
    let _token = engine.mutexes().acquire(&topic.resource_key(), MutexMode::Exclusive)?;
    remove_if_exists(&engine.resolver().resolve(&topic, PathKind::Lease))
}
