//! The revision-consistency engine.
//!
//! Every object has a primary file carrying the latest content and, once it
//! has been saved with a second distinct version, a history file managed by
//! the [`RevisionControl`] backend. The engine keeps the two in step:
//!
//! - history is created lazily, by checking in the version-1 content at the
//!   moment a second version is saved;
//! - before every save, content written behind the engine's back (a newer
//!   primary file, or an embedded counter ahead of the history head) is
//!   folded into history, so revision numbers are never reused;
//! - after every write, the embedded version equals the history head, or 1
//!   when there is no history.
//!
//! Each operation runs under the object's mutex: shared for reads,
//! exclusive for writes. Topics carry their revision info inside the primary
//! file; attachments are stored verbatim and take theirs from history.

use crate::cache::MetadataCache;
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::fsutil::{copy_dir_recursive, copy_mtime, remove_if_exists, write_atomic};
use crate::locator::Locator;
use crate::mutex::{MutexManager, MutexMode, MutexToken};
use crate::paths::{PathKind, PathResolver};
use crate::rcs::{backend_for, mtime_secs, CheckIn, RcsFile, RevisionControl};
use crate::topic::{RevisionInfo, TopicObject, UNKNOWN_AUTHOR};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Comment recorded when an out-of-band change is folded into history.
const RECOVERED_COMMENT: &str = "recovered out-of-band change";

/// Who is writing, when, and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Author of the new revision.
    pub author: String,
    /// Check-in comment.
    pub comment: String,
    /// Revision date, unix seconds.
    pub date: i64,
    /// Fail with `AlreadyExists` if the object exists.
    pub insert_only: bool,
    /// Seconds after the latest revision during which a topic save by the
    /// same author replaces that revision instead of adding one.
    pub replace_window: Option<i64>,
}

impl Commit {
    /// A commit by `author` dated `date`, with an empty comment.
    pub fn new(author: impl Into<String>, date: i64) -> Self {
        Self {
            author: author.into(),
            comment: String::new(),
            date,
            insert_only: false,
            replace_window: None,
        }
    }

    /// Sets the check-in comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Makes the save fail if the object already exists.
    pub fn insert_only(mut self) -> Self {
        self.insert_only = true;
        self
    }

    /// Lets a topic save replace a recent revision by the same author.
    pub fn with_replace_window(mut self, secs: i64) -> Self {
        self.replace_window = Some(secs);
        self
    }

    /// True when `latest` is by this author and younger than the window.
    fn within_window(&self, latest: &RevisionInfo) -> bool {
        self.replace_window.map_or(false, |window| {
            latest.author == self.author && (0..window).contains(&(self.date - latest.date))
        })
    }

    fn info(&self, version: u32) -> RevisionInfo {
        RevisionInfo {
            version,
            author: self.author.clone(),
            date: self.date,
            comment: self.comment.clone(),
        }
    }

    fn check_in(&self) -> CheckIn {
        CheckIn::new(self.author.clone(), self.comment.clone()).dated(self.date)
    }
}

/// Content served by a read, with the revision actually served.
///
/// Requests for revisions that do not exist are clamped, so `version` may
/// differ from what was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded<T> {
    /// The object content.
    pub value: T,
    /// Revision served.
    pub version: u32,
    /// True when `version` is the latest revision.
    pub is_latest: bool,
}

/// Outcome of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Saved {
    /// Version the object now has.
    pub version: u32,
    /// True when the latest revision was replaced rather than a new one
    /// added.
    pub replaced: bool,
}

impl Saved {
    fn added(version: u32) -> Self {
        Self { version, replaced: false }
    }
}

/// New content for a save.
enum Body<'a> {
    Topic(&'a mut TopicObject),
    Attachment(&'a [u8]),
}

impl Body<'_> {
    /// Stamps `info` and returns the bytes to store.
    fn render(&mut self, info: RevisionInfo) -> Cow<'_, [u8]> {
        match self {
            Body::Topic(topic) => {
                topic.set_revision_info(info);
                Cow::Owned(topic.serialize().into_bytes())
            }
            Body::Attachment(data) => Cow::Borrowed(*data),
        }
    }

    /// True when `current` already holds this content, revision info aside.
    fn is_identical(&self, current: &[u8]) -> bool {
        match self {
            Body::Topic(topic) => std::str::from_utf8(current)
                .map_or(false, |text| topic.same_content(&TopicObject::deserialize(text))),
            Body::Attachment(data) => *data == current,
        }
    }
}

/// Coordinates primary files, history, cache and mutexes.
pub struct RevisionEngine {
    resolver: PathResolver,
    mutexes: MutexManager,
    cache: MetadataCache,
    backend: Box<dyn RevisionControl>,
    file_mode: u32,
    dir_mode: u32,
}

impl RevisionEngine {
    /// Builds an engine with the backend selected by `config`.
    pub fn new(config: &Config) -> Self {
        let resolver = PathResolver::new(&config.storage);
        Self {
            mutexes: MutexManager::new(resolver.clone()),
            cache: MetadataCache::new(resolver.clone()),
            backend: backend_for(config),
            file_mode: config.storage.file_mode,
            dir_mode: config.storage.dir_mode,
            resolver,
        }
    }

    /// Replaces the revision-control backend.
    pub fn with_backend(mut self, backend: Box<dyn RevisionControl>) -> Self {
        self.backend = backend;
        self
    }

    /// Path resolver in use.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// Mutex manager of this engine's session.
    pub fn mutexes(&self) -> &MutexManager {
        &self.mutexes
    }

    /// Revision-control backend in use.
    pub fn backend(&self) -> &dyn RevisionControl {
        self.backend.as_ref()
    }

    /// True when the object's primary file exists.
    pub fn exists(&self, locator: &Locator) -> bool {
        self.resolver.resolve(locator, PathKind::Primary).is_file()
    }

    /// Reads a topic at `rev` (latest when `None` or 0).
    ///
    /// Returns `Ok(None)` if the topic has never been saved.
    pub fn read_topic(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<Loaded<TopicObject>>> {
        let _token = self.lock(locator, MutexMode::Shared)?;
        let file = self.rcs_file(locator);

        let (current, cached) = match self.cache.read(locator) {
            Some(topic) => (topic, true),
            None => match read_optional(&file.file)? {
                Some(bytes) => (parse_topic(&file.file, &bytes)?, false),
                None => return Ok(None),
            },
        };
        let latest = self.latest_version(&file, current.version())?;

        match self.check_out_older(&file, rev, latest)? {
            Some((bytes, resolved)) => {
                let mut topic = parse_topic(&file.file, &bytes)?;
                topic.set_version(resolved);
                Ok(Some(Loaded {
                    value: topic,
                    version: resolved,
                    is_latest: resolved == latest,
                }))
            }
            None => {
                if !cached {
                    self.cache.write(locator, &current);
                }
                Ok(Some(Loaded {
                    value: current,
                    version: latest,
                    is_latest: true,
                }))
            }
        }
    }

    /// Reads attachment content at `rev` (latest when `None` or 0).
    pub fn read_attachment(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<Loaded<Vec<u8>>>> {
        let _token = self.lock(locator, MutexMode::Shared)?;
        let file = self.rcs_file(locator);

        let Some(current) = read_optional(&file.file)? else {
            return Ok(None);
        };
        let latest = self.latest_version(&file, None)?;

        Ok(Some(match self.check_out_older(&file, rev, latest)? {
            Some((bytes, resolved)) => Loaded {
                value: bytes,
                version: resolved,
                is_latest: resolved == latest,
            },
            None => Loaded {
                value: current,
                version: latest,
                is_latest: true,
            },
        }))
    }

    /// Saves a topic as a new revision and stamps `topic` with its info.
    ///
    /// When `commit` carries a replace window and the latest revision is
    /// the same author's and younger than it, that revision is replaced
    /// instead. The decision is made under the topic's exclusive mutex.
    /// Content identical to the latest revision is not saved again.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` when `commit.insert_only` is set and the topic
    /// exists; nothing is modified in that case.
    pub fn save_topic(&self, locator: &Locator, topic: &mut TopicObject, commit: &Commit) -> Result<Saved> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        let file = self.rcs_file(locator);

        if commit.replace_window.is_some() && !commit.insert_only {
            if let Some(latest) = self.info_locked(locator, &file, None)? {
                if commit.within_window(&latest) {
                    debug!(object = %locator, version = latest.version, "same author within replace window");
                    let version = self.replace_locked(locator, &file, Body::Topic(&mut *topic), commit)?;
                    return Ok(Saved { version, replaced: true });
                }
            }
        }
        self.save_locked(locator, &file, Body::Topic(topic), commit).map(Saved::added)
    }

    /// Saves attachment content as a new revision.
    ///
    /// Saving content identical to the latest revision is a no-op.
    pub fn save_attachment(&self, locator: &Locator, data: &[u8], commit: &Commit) -> Result<u32> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        self.save_locked(locator, &self.rcs_file(locator), Body::Attachment(data), commit)
    }

    /// Replaces the latest revision of a topic without advancing the
    /// revision number. Saves normally if the topic does not exist.
    pub fn replace_latest_topic(&self, locator: &Locator, topic: &mut TopicObject, commit: &Commit) -> Result<u32> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        self.replace_locked(locator, &self.rcs_file(locator), Body::Topic(topic), commit)
    }

    /// Replaces the latest revision of an attachment in place.
    pub fn replace_latest_attachment(&self, locator: &Locator, data: &[u8], commit: &Commit) -> Result<u32> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        self.replace_locked(locator, &self.rcs_file(locator), Body::Attachment(data), commit)
    }

    /// Rolls back the latest revision and returns the new latest version.
    ///
    /// Pending out-of-band content counts as the latest revision and is
    /// discarded. Collapsing to version 1 removes the history file.
    ///
    /// # Errors
    ///
    /// `InitialRevision` if the object is at version 1, `NotFound` if it
    /// does not exist.
    pub fn delete_latest(&self, locator: &Locator) -> Result<u32> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        let file = self.rcs_file(locator);

        let current = read_optional(&file.file)?.ok_or_else(|| StoreError::NotFound(locator.to_string()))?;
        let embedded = self.embedded_info(locator, &current).map(|info| info.version);
        let latest = self.latest_version(&file, embedded)?;
        if latest <= 1 {
            return Err(StoreError::InitialRevision(locator.to_string()));
        }

        self.cache.invalidate(locator);
        let head = self.backend.head_revision(&file)?;
        if latest > head {
            warn!(object = %locator, head, "discarding uncommitted out-of-band change");
            if let Some((content, _)) = self.backend.check_out(&file, head)? {
                write_atomic(&file.file, &content, Some(self.file_mode))?;
            }
        } else {
            debug!(object = %locator, head, "deleting head revision");
            self.backend.delete_revision(&file, head)?;
        }

        let new_head = self.backend.head_revision(&file)?;
        if new_head <= 1 {
            info!(object = %locator, "collapsing history to a single revision");
            remove_if_exists(&file.history)?;
            return Ok(1);
        }
        self.settle(&file)?;
        Ok(new_head)
    }

    /// Revision info of `rev` (latest when `None`), clamped like reads.
    pub fn revision_info(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<RevisionInfo>> {
        let _token = self.lock(locator, MutexMode::Shared)?;
        self.info_locked(locator, &self.rcs_file(locator), rev)
    }

    fn info_locked(&self, locator: &Locator, file: &RcsFile, rev: Option<u32>) -> Result<Option<RevisionInfo>> {
        let Some(current) = read_optional(&file.file)? else {
            return Ok(None);
        };
        let embedded = self.embedded_info(locator, &current);
        let latest = self.latest_version(file, embedded.as_ref().map(|info| info.version))?;

        if let Some(rev) = rev.filter(|&rev| rev > 0 && rev < latest) {
            if let Some(info) = self.backend.revision_info(file, rev)? {
                return Ok(Some(info));
            }
        }

        // Latest: attachments with committed history take it from the log
        if embedded.is_none() && file.has_history() {
            let head = self.backend.head_revision(file)?;
            if head == latest {
                if let Some(info) = self.backend.revision_info(file, head)? {
                    return Ok(Some(info));
                }
            }
        }

        let mut info = embedded.unwrap_or_else(|| {
            RevisionInfo::new(latest, UNKNOWN_AUTHOR, mtime_secs(&file.file).unwrap_or(0))
        });
        info.version = latest;
        Ok(Some(info))
    }

    /// Revision numbers from the latest down to 1; empty if absent.
    pub fn revision_history(&self, locator: &Locator) -> Result<Vec<u32>> {
        let _token = self.lock(locator, MutexMode::Shared)?;
        let file = self.rcs_file(locator);

        let Some(current) = read_optional(&file.file)? else {
            return Ok(Vec::new());
        };
        let embedded = self.embedded_info(locator, &current).map(|info| info.version);
        let latest = self.latest_version(&file, embedded)?;
        Ok((1..=latest).rev().collect())
    }

    /// The revision that was current at `date`, or `None` if the object did
    /// not exist yet.
    pub fn revision_at_date(&self, locator: &Locator, date: i64) -> Result<Option<u32>> {
        let _token = self.lock(locator, MutexMode::Shared)?;
        let file = self.rcs_file(locator);

        let Some(current) = read_optional(&file.file)? else {
            return Ok(None);
        };
        let embedded = self.embedded_info(locator, &current);
        let written = embedded
            .as_ref()
            .map(|info| info.date)
            .filter(|&d| d > 0)
            .or_else(|| mtime_secs(&file.file))
            .unwrap_or(0);

        if !file.has_history() {
            return Ok((written <= date).then_some(1));
        }

        let latest = self.latest_version(&file, embedded.map(|info| info.version))?;
        let head = self.backend.head_revision(&file)?;
        if latest > head && written <= date {
            return Ok(Some(latest));
        }
        self.backend.revision_at_date(&file, date)
    }

    /// Moves an object with its history. Moving a topic also moves its
    /// attachments and lease.
    ///
    /// # Errors
    ///
    /// `NotFound` if `from` does not exist, `TargetExists` if `to` does.
    pub fn move_object(&self, from: &Locator, to: &Locator) -> Result<()> {
        check_same_kind(from, to)?;
        let (_source, _target) = self.lock_pair(from, to, MutexMode::Exclusive)?;
        let (src, dst) = self.prepare_transfer(from, to)?;

        self.cache.invalidate(from);
        self.cache.invalidate(to);
        self.ensure_parent(&dst.file)?;
        if src.has_history() {
            fs::rename(&src.history, &dst.history)?;
        }
        fs::rename(&src.file, &dst.file)?;

        if !from.is_attachment() {
            let (src_dir, dst_dir) = (self.resolver.attachment_dir(from), self.resolver.attachment_dir(to));
            if src_dir.is_dir() {
                self.ensure_parent(&dst_dir)?;
                fs::rename(&src_dir, &dst_dir)?;
            }
            let (src_lease, dst_lease) = (
                self.resolver.resolve(from, PathKind::Lease),
                self.resolver.resolve(to, PathKind::Lease),
            );
            if src_lease.is_file() {
                self.ensure_parent(&dst_lease)?;
                fs::rename(&src_lease, &dst_lease)?;
            }
        }
        debug!(from = %from, to = %to, "moved object");
        Ok(())
    }

    /// Copies an object with its history. Copying a topic also copies its
    /// attachments.
    pub fn copy_object(&self, from: &Locator, to: &Locator) -> Result<()> {
        check_same_kind(from, to)?;
        let (_source, _target) = self.lock_pair(from, to, MutexMode::Shared)?;
        let (src, dst) = self.prepare_transfer(from, to)?;

        self.cache.invalidate(to);
        self.ensure_parent(&dst.file)?;
        fs::copy(&src.file, &dst.file)?;
        if src.has_history() {
            fs::copy(&src.history, &dst.history)?;
            self.settle(&dst)?;
        }

        if !from.is_attachment() {
            let src_dir = self.resolver.attachment_dir(from);
            if src_dir.is_dir() {
                copy_dir_recursive(&src_dir, &self.resolver.attachment_dir(to))?;
            }
        }
        debug!(from = %from, to = %to, "copied object");
        Ok(())
    }

    /// Removes an object and its history. Removing a topic also removes its
    /// attachments and lease.
    pub fn remove_object(&self, locator: &Locator) -> Result<()> {
        let _token = self.lock(locator, MutexMode::Exclusive)?;
        let file = self.rcs_file(locator);
        if !file.file.is_file() {
            return Err(StoreError::NotFound(locator.to_string()));
        }

        self.cache.invalidate(locator);
        remove_if_exists(&file.history)?;
        remove_if_exists(&file.file)?;

        if !locator.is_attachment() {
            remove_dir_if_exists(&self.resolver.attachment_dir(locator))?;
            remove_if_exists(&self.resolver.resolve(locator, PathKind::Lease))?;
        }
        debug!(object = %locator, "removed object");
        Ok(())
    }

    fn save_locked(&self, locator: &Locator, file: &RcsFile, mut body: Body<'_>, commit: &Commit) -> Result<u32> {
        let existing = read_optional(&file.file)?;
        if commit.insert_only && existing.is_some() {
            return Err(StoreError::AlreadyExists(locator.to_string()));
        }

        let head = match &existing {
            Some(current) if !file.has_history() => {
                if body.is_identical(current) {
                    debug!(object = %locator, "identical content, nothing to save");
                    return Ok(1);
                }
                self.create_history(locator, file, current)?;
                1
            }
            Some(current) => {
                let folded = self.reconcile(locator, file, current)?;
                let head = self.backend.head_revision(file)?;
                if !folded && body.is_identical(current) {
                    debug!(object = %locator, head, "identical to latest revision, nothing to save");
                    return Ok(head);
                }
                head
            }
            // Primary removed behind our back; continue numbering after history
            None if file.has_history() => self.backend.head_revision(file)?,
            None => 0,
        };

        let mut version = head + 1;
        self.cache.invalidate(locator);
        let data = body.render(commit.info(version));
        self.ensure_parent(&file.file)?;
        write_atomic(&file.file, &data, Some(self.file_mode))?;

        if version > 1 {
            if let Some(reverted) = self.backend.check_in(file, &commit.check_in())? {
                debug!(object = %locator, reverted, "check-in reverted to existing revision");
                version = reverted;
                let data = body.render(commit.info(version));
                write_atomic(&file.file, &data, Some(self.file_mode))?;
            }
            self.settle(file)?;
        }

        if let Body::Topic(topic) = &body {
            self.cache.write(locator, topic);
        }
        debug!(object = %locator, version, "saved");
        Ok(version)
    }

    fn replace_locked(&self, locator: &Locator, file: &RcsFile, mut body: Body<'_>, commit: &Commit) -> Result<u32> {
        if !file.file.is_file() {
            return self.save_locked(locator, file, body, commit);
        }
        if commit.insert_only {
            return Err(StoreError::AlreadyExists(locator.to_string()));
        }

        self.cache.invalidate(locator);
        let head = if file.has_history() {
            self.backend.head_revision(file)?
        } else {
            1
        };

        let version = if head <= 1 {
            if remove_if_exists(&file.history)? {
                info!(object = %locator, "dropping single-revision history");
            }
            let data = body.render(commit.info(1));
            write_atomic(&file.file, &data, Some(self.file_mode))?;
            1
        } else {
            debug!(object = %locator, head, "replacing head revision");
            self.backend.delete_revision(file, head)?;
            let data = body.render(commit.info(head));
            write_atomic(&file.file, &data, Some(self.file_mode))?;

            let mut version = head;
            if let Some(reverted) = self.backend.check_in(file, &commit.check_in())? {
                version = reverted;
                let data = body.render(commit.info(version));
                write_atomic(&file.file, &data, Some(self.file_mode))?;
            }
            self.settle(file)?;
            version
        };

        if let Body::Topic(topic) = &body {
            self.cache.write(locator, topic);
        }
        Ok(version)
    }

    /// Checks in the existing single-revision content as revision 1, with
    /// the author, comment and date it was saved with.
    fn create_history(&self, locator: &Locator, file: &RcsFile, current: &[u8]) -> Result<()> {
        let prior = self.embedded_info(locator, current);
        if let Some(version) = prior.as_ref().map(|p| p.version).filter(|&v| v != 1) {
            warn!(object = %locator, version, "single-revision object claims a later version");
        }
        let (author, comment, date) = match prior {
            Some(p) => (p.author, p.comment, Some(p.date).filter(|&d| d > 0)),
            None => (UNKNOWN_AUTHOR.to_string(), String::new(), None),
        };
        let date = date.or_else(|| mtime_secs(&file.file)).unwrap_or(0);

        info!(object = %locator, "creating history");
        self.backend.check_in(file, &CheckIn::new(author, comment).dated(date))?;
        Ok(())
    }

    /// Folds content written behind the engine's back into history.
    /// Returns true when there was such content.
    fn reconcile(&self, locator: &Locator, file: &RcsFile, current: &[u8]) -> Result<bool> {
        let embedded = self.embedded_info(locator, current);
        let head = self.backend.head_revision(file)?;
        if !self.is_pending(file, embedded.as_ref().map(|info| info.version), head) {
            return Ok(false);
        }

        warn!(
            object = %locator,
            head,
            embedded = embedded.as_ref().map(|info| info.version),
            "folding out-of-band change into history"
        );
        let author = embedded.map_or_else(|| UNKNOWN_AUTHOR.to_string(), |info| info.author);
        let date = mtime_secs(&file.file).unwrap_or(0);
        let request = CheckIn::new(author, RECOVERED_COMMENT).dated(date);
        if let Some(reverted) = self.backend.check_in(file, &request)? {
            debug!(object = %locator, reverted, "out-of-band change matched history");
        }
        Ok(true)
    }

    /// Latest revision number: 1 without history, one past the head while a
    /// change is pending, else the larger of embedded and head.
    fn latest_version(&self, file: &RcsFile, embedded: Option<u32>) -> Result<u32> {
        if !file.has_history() {
            return Ok(1);
        }
        let head = self.backend.head_revision(file)?;
        if self.is_pending(file, embedded, head) {
            Ok(head + 1)
        } else {
            Ok(embedded.unwrap_or(head).max(head))
        }
    }

    fn is_pending(&self, file: &RcsFile, embedded: Option<u32>, head: u32) -> bool {
        if embedded.map_or(false, |version| version > head) {
            return true;
        }
        match (mtime_secs(&file.file), mtime_secs(&file.history)) {
            (Some(primary), Some(history)) => primary > history,
            _ => false,
        }
    }

    /// Historical content for reads of a revision older than `latest`.
    fn check_out_older(&self, file: &RcsFile, rev: Option<u32>, latest: u32) -> Result<Option<(Vec<u8>, u32)>> {
        match rev {
            Some(rev) if rev > 0 && rev < latest && file.has_history() => self.backend.check_out(file, rev),
            _ => Ok(None),
        }
    }

    /// Aligns the primary's mtime with history so the write just made does
    /// not read as pending.
    fn settle(&self, file: &RcsFile) -> Result<()> {
        if file.has_history() && file.file.is_file() {
            copy_mtime(&file.history, &file.file)?;
        }
        Ok(())
    }

    fn embedded_info(&self, locator: &Locator, content: &[u8]) -> Option<RevisionInfo> {
        if locator.is_attachment() {
            return None;
        }
        TopicObject::embedded_info(&String::from_utf8_lossy(content))
    }

    fn prepare_transfer(&self, from: &Locator, to: &Locator) -> Result<(RcsFile, RcsFile)> {
        let (src, dst) = (self.rcs_file(from), self.rcs_file(to));
        if !src.file.is_file() {
            return Err(StoreError::NotFound(from.to_string()));
        }
        if dst.file.exists() || dst.has_history() {
            return Err(StoreError::TargetExists(to.to_string()));
        }
        Ok((src, dst))
    }

    fn ensure_parent(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.is_dir() {
                fs::create_dir_all(dir)?;
                crate::fsutil::set_mode(dir, Some(self.dir_mode))?;
            }
        }
        Ok(())
    }

    fn rcs_file(&self, locator: &Locator) -> RcsFile {
        RcsFile::new(
            self.resolver.resolve(locator, PathKind::Primary),
            self.resolver.resolve(locator, PathKind::History),
            locator.is_attachment(),
        )
    }

    fn lock(&self, locator: &Locator, mode: MutexMode) -> Result<MutexToken> {
        self.mutexes.acquire(&locator.resource_key(), mode)
    }

    /// Locks the source in `source_mode`, then the target exclusively.
    /// Objects under one topic share a key and get a single exclusive token.
    fn lock_pair(
        &self,
        from: &Locator,
        to: &Locator,
        source_mode: MutexMode,
    ) -> Result<(MutexToken, Option<MutexToken>)> {
        if from.resource_key() == to.resource_key() {
            return Ok((self.lock(from, MutexMode::Exclusive)?, None));
        }
        let source = self.lock(from, source_mode)?;
        let target = self.lock(to, MutexMode::Exclusive)?;
        Ok((source, Some(target)))
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn parse_topic(path: &Path, bytes: &[u8]) -> Result<TopicObject> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| StoreError::Deserialization(format!("{}: {}", path.display(), e)))?;
    Ok(TopicObject::deserialize(text))
}

fn check_same_kind(from: &Locator, to: &Locator) -> Result<()> {
    if from.is_attachment() != to.is_attachment() {
        return Err(StoreError::InvalidName {
            name: to.to_string(),
            reason: "source and target must both be topics or both be attachments".to_string(),
        });
    }
    if from == to {
        return Err(StoreError::TargetExists(to.to_string()));
    }
    Ok(())
}
