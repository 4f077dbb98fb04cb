//! Revision-control backends.
//!
//! The store talks to history files only through [`RevisionControl`]. Two
//! backends implement it: [`RcsWrap`] runs the external RCS tools, and
//! [`RcsLite`] keeps history in a compressed file without any external
//! process.

mod command;
mod lite;
mod wrap;

pub use command::{CommandSet, CommandTemplate};
pub use lite::RcsLite;
pub use wrap::RcsWrap;

use crate::config::{BackendKind, Config};
use crate::error::Result;
use crate::topic::RevisionInfo;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

/// A primary file together with its history file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcsFile {
    /// Latest content.
    pub file: PathBuf,
    /// History sidecar.
    pub history: PathBuf,
    /// True for attachments, whose content is stored verbatim.
    pub binary: bool,
}

impl RcsFile {
    /// Pairs a primary file with its history file.
    pub fn new(file: impl Into<PathBuf>, history: impl Into<PathBuf>, binary: bool) -> Self {
        Self {
            file: file.into(),
            history: history.into(),
            binary,
        }
    }

    /// True when a history file exists.
    pub fn has_history(&self) -> bool {
        self.history.exists()
    }

    /// Age of the primary file, if it exists.
    pub fn age(&self) -> Option<Duration> {
        let modified = std::fs::metadata(&self.file).and_then(|m| m.modified()).ok()?;
        SystemTime::now().duration_since(modified).ok()
    }
}

/// Parameters of a check-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckIn {
    /// Author recorded for the new revision.
    pub author: String,
    /// Check-in comment.
    pub comment: String,
    /// Explicit revision date (unix seconds); the backend uses "now" if absent.
    pub date: Option<i64>,
}

impl CheckIn {
    /// Check-in by `author` with `comment`, dated now.
    pub fn new(author: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            comment: comment.into(),
            date: None,
        }
    }

    /// Sets an explicit revision date.
    pub fn dated(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }
}

/// Operations on a history file.
///
/// Revision numbers are plain integers starting at 1. Lookups of revisions
/// that do not exist are clamped instead of failing, and report the revision
/// actually served.
pub trait RevisionControl: Send + Sync {
    /// Short backend name for diagnostics.
    fn name(&self) -> &'static str;

    /// Backend locks older than this may be broken by [`lock`](Self::lock).
    fn stale_after(&self) -> Duration;

    /// Sets the backend's lock on the history file, once.
    fn try_lock(&self, file: &RcsFile) -> Result<()>;

    /// Releases the backend's lock.
    fn unlock(&self, file: &RcsFile) -> Result<()>;

    /// Forcibly removes any lock, whoever holds it.
    fn break_lock(&self, file: &RcsFile) -> Result<()>;

    /// Commits the primary file's current content as the next revision.
    ///
    /// Returns `Some(rev)` when the content equals the head revision and the
    /// backend reverted to `rev` instead of creating a new revision.
    fn check_in(&self, file: &RcsFile, request: &CheckIn) -> Result<Option<u32>>;

    /// Content of the latest revision numbered `rev` or lower (the head when
    /// `rev` is past it), with the revision actually served.
    fn check_out(&self, file: &RcsFile, rev: u32) -> Result<Option<(Vec<u8>, u32)>>;

    /// Highest revision in history; 1 when there is no history.
    fn head_revision(&self, file: &RcsFile) -> Result<u32>;

    /// Removes `rev` from history and rewrites the primary file with the
    /// content of the new head.
    fn delete_revision(&self, file: &RcsFile, rev: u32) -> Result<()>;

    /// The revision current at `date`, or `None` if history starts later.
    fn revision_at_date(&self, file: &RcsFile, date: i64) -> Result<Option<u32>>;

    /// Log entry of the latest revision numbered `rev` or lower.
    fn revision_info(&self, file: &RcsFile, rev: u32) -> Result<Option<RevisionInfo>>;

    /// Sets the backend lock, breaking it once if it is stale.
    fn lock(&self, file: &RcsFile) -> Result<()> {
        match self.try_lock(file) {
            Ok(()) => Ok(()),
            Err(e) => {
                let stale = file.age().map_or(false, |age| age > self.stale_after());
                if !stale {
                    return Err(e);
                }
                warn!(
                    file = %file.file.display(),
                    backend = self.name(),
                    "breaking stale history lock: {}",
                    e
                );
                self.break_lock(file)?;
                self.try_lock(file)
            }
        }
    }
}

/// Builds the backend selected by `config`.
pub fn backend_for(config: &Config) -> Box<dyn RevisionControl> {
    let history = &config.history;
    match history.backend {
        BackendKind::Lite => Box::new(RcsLite::new(history.lock_owner.clone(), history.stale_lock())),
        BackendKind::Rcs => Box::new(
            RcsWrap::new(history.commands.clone(), history.stale_lock())
                .with_file_mode(config.storage.file_mode),
        ),
    }
}

/// Modification time of `path` in whole unix seconds.
pub(crate) fn mtime_secs(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    let secs = match modified.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    Some(secs)
}

pub(crate) fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
