//! vdoc Core Library
//!
//! A versioned document store for text topics and binary attachments,
//! providing:
//! - Lazily created revision history (a history file appears only once an
//!   object has a second version)
//! - Reconciliation of out-of-band edits into history
//! - Per-object advisory file locks
//! - Interchangeable revision-control backends (external RCS, or in-process)
//!
//! # Quick Start
//!
//! ```
//! use vdoc_core::{Locator, SaveOptions, Store, TopicObject};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = Store::open(tmp.path()).unwrap();
//! let topic = Locator::topic("Main", "WebHome").unwrap();
//!
//! let force = SaveOptions { force_new_revision: true, ..SaveOptions::default() };
//! store.save_topic(&topic, &mut TopicObject::new("first"), "alice", &force).unwrap();
//! store.save_topic(&topic, &mut TopicObject::new("second"), "alice", &force).unwrap();
//!
//! // Old revisions stay readable
//! let old = store.read_topic(&topic, Some(1)).unwrap().unwrap();
//! assert_eq!(old.value.text(), "first");
//! assert!(!old.is_latest);
//! ```
//!
//! # Features
//!
//! ## Lenient revision lookups
//!
//! Asking for a revision past the head serves the head. Always check the
//! returned version:
//!
//! ```
//! use vdoc_core::{Locator, SaveOptions, Store, TopicObject};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = Store::open(tmp.path()).unwrap();
//! let topic = Locator::topic("Main", "WebHome").unwrap();
//! store.save_topic(&topic, &mut TopicObject::new("only"), "alice", &SaveOptions::default()).unwrap();
//!
//! let loaded = store.read_topic(&topic, Some(7)).unwrap().unwrap();
//! assert_eq!(loaded.version, 1);
//! ```
//!
//! ## Attachments
//!
//! ```
//! use vdoc_core::{Locator, SaveOptions, Store};
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = Store::open(tmp.path()).unwrap();
//! let logo = Locator::attachment("Main", "WebHome", "logo.png").unwrap();
//!
//! store.save_attachment(&logo, b"\x89PNG", "alice", &SaveOptions::default()).unwrap();
//! let loaded = store.read_attachment(&logo, None).unwrap().unwrap();
//! assert_eq!(loaded.value, b"\x89PNG");
//! ```

mod cache;
mod changes;
mod config;
mod engine;
mod error;
mod fsutil;
mod lease;
mod locator;
mod mutex;
mod paths;
mod rcs;
mod reclaim;
mod store;
mod topic;

pub use cache::MetadataCache;
pub use changes::{ChangeRecord, ChangeVerb};
pub use config::{BackendKind, ChangesConfig, Config, HistoryConfig, StorageConfig, CONFIG_FILE};
pub use engine::{Commit, Loaded, RevisionEngine, Saved};
pub use error::{ErrorKind, Result, StoreError};
pub use lease::Lease;
pub use locator::{normalize_namespace, Locator};
pub use mutex::{MutexManager, MutexMode, MutexToken};
pub use paths::{PathKind, PathResolver};
pub use rcs::{backend_for, CheckIn, CommandSet, CommandTemplate, RcsFile, RcsLite, RcsWrap, RevisionControl};
pub use reclaim::{
    reclaim, ReclaimConfig, ReclaimProgressCallback, ReclaimReport, RedundantHistory, VersionMismatch,
};
pub use store::{SaveOptions, Store};
pub use topic::{MetaRecord, RevisionInfo, TopicObject, UNKNOWN_AUTHOR};

/// Time provider trait for testing.
///
/// Allows injecting controlled time into a [`Store`] via
/// [`Store::with_time_provider`].
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}
