//! In-process history files.
//!
//! Each history file holds every revision in full, postcard-encoded and
//! zstd-compressed, behind a short magic header. Identical check-ins are
//! detected and reported as a revert, like RCS does.

use super::{now_secs, CheckIn, RcsFile, RevisionControl};
use crate::error::{Result, StoreError};
use crate::fsutil::write_atomic;
use crate::topic::RevisionInfo;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const MAGIC: &[u8; 4] = b"VDH1";

/// Zstd compression level for history files.
const COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    locker: Option<String>,
    binary: bool,
    revisions: Vec<StoredRevision>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredRevision {
    number: u32,
    author: String,
    date: i64,
    comment: String,
    content: Vec<u8>,
}

impl StoredRevision {
    fn info(&self) -> RevisionInfo {
        RevisionInfo {
            version: self.number,
            author: self.author.clone(),
            date: self.date,
            comment: self.comment.clone(),
        }
    }
}

impl HistoryFile {
    fn head(&self) -> Option<&StoredRevision> {
        self.revisions.last()
    }

    /// Latest revision numbered `rev` or lower, else the earliest one.
    fn select(&self, rev: u32) -> Option<&StoredRevision> {
        self.revisions
            .iter()
            .rev()
            .find(|r| r.number <= rev)
            .or_else(|| self.revisions.first())
    }
}

/// Backend that keeps history without any external tool.
///
/// # Examples
///
/// ```
/// use vdoc_core::{CheckIn, RcsFile, RcsLite, RevisionControl};
/// use std::time::Duration;
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let file = RcsFile::new(tmp.path().join("a.txt"), tmp.path().join("a.txt,v"), false);
/// let rcs = RcsLite::new("www", Duration::from_secs(3600));
///
/// std::fs::write(&file.file, "one").unwrap();
/// rcs.check_in(&file, &CheckIn::new("alice", "")).unwrap();
/// std::fs::write(&file.file, "two").unwrap();
/// rcs.check_in(&file, &CheckIn::new("alice", "")).unwrap();
///
/// assert_eq!(rcs.head_revision(&file).unwrap(), 2);
/// let (content, rev) = rcs.check_out(&file, 1).unwrap().unwrap();
/// assert_eq!((content.as_slice(), rev), (&b"one"[..], 1));
/// ```
pub struct RcsLite {
    owner: String,
    stale: Duration,
}

impl RcsLite {
    /// Creates a backend that records `owner` as the lock holder.
    pub fn new(owner: impl Into<String>, stale: Duration) -> Self {
        Self {
            owner: owner.into(),
            stale,
        }
    }

    fn load(&self, path: &Path) -> Result<Option<HistoryFile>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let corrupted = |reason: String| StoreError::CorruptedHistory {
            path: path.to_path_buf(),
            reason,
        };

        let body = raw
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| corrupted("invalid magic bytes".to_string()))?;
        let decoded = zstd::decode_all(body).map_err(|e| corrupted(e.to_string()))?;
        let history = postcard::from_bytes(&decoded).map_err(|e| corrupted(e.to_string()))?;
        Ok(Some(history))
    }

    fn store(&self, path: &Path, history: &HistoryFile) -> Result<()> {
        let encoded =
            postcard::to_allocvec(history).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let compressed = zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut out = Vec::with_capacity(MAGIC.len() + compressed.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&compressed);
        write_atomic(path, &out, None)
    }

    fn failure(&self, op: &str, file: &RcsFile, stderr: String) -> StoreError {
        StoreError::Backend {
            command: format!("rcslite {} {}", op, file.history.display()),
            status: "failed".to_string(),
            stdout: String::new(),
            stderr,
        }
    }
}

impl RevisionControl for RcsLite {
    fn name(&self) -> &'static str {
        "lite"
    }

    fn stale_after(&self) -> Duration {
        self.stale
    }

    fn try_lock(&self, file: &RcsFile) -> Result<()> {
        let mut history = self.load(&file.history)?.unwrap_or_else(|| HistoryFile {
            binary: file.binary,
            ..HistoryFile::default()
        });

        match &history.locker {
            Some(holder) if holder != &self.owner => {
                Err(self.failure("lock", file, format!("locked by {}", holder)))
            }
            _ => {
                history.locker = Some(self.owner.clone());
                self.store(&file.history, &history)
            }
        }
    }

    fn unlock(&self, file: &RcsFile) -> Result<()> {
        match self.load(&file.history)? {
            Some(mut history) if history.locker.as_deref() == Some(self.owner.as_str()) => {
                history.locker = None;
                self.store(&file.history, &history)
            }
            Some(history) => match history.locker {
                Some(holder) => Err(self.failure("unlock", file, format!("locked by {}", holder))),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    fn break_lock(&self, file: &RcsFile) -> Result<()> {
        if let Some(mut history) = self.load(&file.history)? {
            history.locker = None;
            self.store(&file.history, &history)?;
        }
        Ok(())
    }

    fn check_in(&self, file: &RcsFile, request: &CheckIn) -> Result<Option<u32>> {
        self.lock(file)?;
        let mut history = self
            .load(&file.history)?
            .ok_or_else(|| self.failure("ci", file, "history vanished after lock".to_string()))?;
        history.locker = None;

        let content = fs::read(&file.file)?;
        if let Some(head) = history.head() {
            if head.content == content {
                let reverted = head.number;
                debug!(file = %file.file.display(), reverted, "unchanged check-in reverted");
                self.store(&file.history, &history)?;
                return Ok(Some(reverted));
            }
        }

        let number = history.head().map_or(1, |r| r.number + 1);
        history.revisions.push(StoredRevision {
            number,
            author: request.author.clone(),
            date: request.date.unwrap_or_else(now_secs),
            comment: request.comment.clone(),
            content,
        });
        self.store(&file.history, &history)?;
        Ok(None)
    }

    fn check_out(&self, file: &RcsFile, rev: u32) -> Result<Option<(Vec<u8>, u32)>> {
        Ok(self
            .load(&file.history)?
            .and_then(|h| h.select(rev).map(|r| (r.content.clone(), r.number))))
    }

    fn head_revision(&self, file: &RcsFile) -> Result<u32> {
        Ok(self
            .load(&file.history)?
            .and_then(|h| h.head().map(|r| r.number))
            .unwrap_or(1))
    }

    fn delete_revision(&self, file: &RcsFile, rev: u32) -> Result<()> {
        let mut history = self
            .load(&file.history)?
            .ok_or_else(|| self.failure("delete", file, "no history file".to_string()))?;

        let index = history
            .revisions
            .iter()
            .position(|r| r.number == rev)
            .ok_or_else(|| self.failure("delete", file, format!("revision {} absent", rev)))?;
        history.revisions.remove(index);
        self.store(&file.history, &history)?;

        if let Some(head) = history.head() {
            write_atomic(&file.file, &head.content, None)?;
        }
        Ok(())
    }

    fn revision_at_date(&self, file: &RcsFile, date: i64) -> Result<Option<u32>> {
        Ok(self.load(&file.history)?.and_then(|h| {
            h.revisions
                .iter()
                .rev()
                .find(|r| r.date <= date)
                .map(|r| r.number)
        }))
    }

    fn revision_info(&self, file: &RcsFile, rev: u32) -> Result<Option<RevisionInfo>> {
        Ok(self
            .load(&file.history)?
            .and_then(|h| h.select(rev).map(StoredRevision::info)))
    }
}
