//! The storage facade.

use crate::changes::{self, ChangeRecord, ChangeVerb};
use crate::config::Config;
use crate::engine::{Commit, Loaded, RevisionEngine};
use crate::error::{Result, StoreError};
use crate::lease::{self, Lease};
use crate::locator::{normalize_namespace, Locator};
use crate::rcs::{now_secs, RevisionControl};
use crate::reclaim::{reclaim, ReclaimConfig, ReclaimProgressCallback, ReclaimReport};
use crate::topic::{RevisionInfo, TopicObject};
use crate::TimeProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for saves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Fail with `AlreadyExists` if the object exists.
    pub insert_only: bool,
    /// Always create a new revision, even for the same author within the
    /// replace window.
    pub force_new_revision: bool,
    /// Check-in comment.
    pub comment: String,
    /// Mark the change record as minor.
    pub minor: bool,
    /// Revision date to record instead of now.
    pub force_date: Option<i64>,
}

/// A versioned document store rooted at a directory.
///
/// One `Store` is one locking session. It may be shared between threads;
/// concurrent calls on the same object wait for each other.
///
/// # Examples
///
/// ```
/// use vdoc_core::{Locator, SaveOptions, Store, TopicObject};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = Store::open(tmp.path()).unwrap();
/// let home = Locator::topic("Main", "WebHome").unwrap();
///
/// let mut topic = TopicObject::new("hello world");
/// let version = store.save_topic(&home, &mut topic, "alice", &SaveOptions::default()).unwrap();
/// assert_eq!(version, 1);
///
/// let loaded = store.read_topic(&home, None).unwrap().unwrap();
/// assert_eq!(loaded.value.text(), "hello world");
/// ```
pub struct Store {
    root: PathBuf,
    config: Config,
    engine: RevisionEngine,
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl Store {
    /// Opens the store at `root`, reading `config.toml` if present.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let config = Config::load(root)?;
        Ok(Self::with_config(root, config))
    }

    /// Opens the store at `root` with an explicit configuration.
    pub fn with_config(root: impl AsRef<Path>, config: Config) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            engine: RevisionEngine::new(&config),
            config,
            time_provider: None,
        }
    }

    /// Sets a custom time provider for testing.
    ///
    /// Revision dates, change records and the replace window all use this
    /// clock instead of system time. Any `Fn() -> i64` closure works.
    pub fn with_time_provider(mut self, provider: impl TimeProvider + 'static) -> Self {
        self.time_provider = Some(Arc::new(provider));
        self
    }

    /// Replaces the revision-control backend chosen by the configuration.
    pub fn with_backend(mut self, backend: Box<dyn RevisionControl>) -> Self {
        self.engine = self.engine.with_backend(backend);
        self
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The engine behind this facade.
    pub fn engine(&self) -> &RevisionEngine {
        &self.engine
    }

    /// Current time from the time provider, or the system clock.
    pub fn now(&self) -> i64 {
        match &self.time_provider {
            Some(provider) => provider.now(),
            None => now_secs(),
        }
    }

    /// True if the topic or attachment has been saved.
    pub fn exists(&self, locator: &Locator) -> bool {
        self.engine.exists(locator)
    }

    /// Reads a topic at `rev`, or the latest revision.
    pub fn read_topic(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<Loaded<TopicObject>>> {
        expect_topic(locator)?;
        self.engine.read_topic(locator, rev)
    }

    /// Reads an attachment at `rev`, or the latest revision.
    pub fn read_attachment(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<Loaded<Vec<u8>>>> {
        expect_attachment(locator)?;
        self.engine.read_attachment(locator, rev)
    }

    /// Saves a topic and returns its new version.
    ///
    /// A save by the author of the latest revision within the configured
    /// replace window replaces that revision instead of adding one, unless
    /// `force_new_revision` is set.
    pub fn save_topic(
        &self,
        locator: &Locator,
        topic: &mut TopicObject,
        author: &str,
        options: &SaveOptions,
    ) -> Result<u32> {
        expect_topic(locator)?;
        let mut commit = self.commit(author, options);
        if !options.force_new_revision {
            let window = i64::try_from(self.config.history.replace_window_secs).unwrap_or(i64::MAX);
            commit.replace_window = Some(window);
        }
        let saved = self.engine.save_topic(locator, topic, &commit)?;
        let verb = if saved.replaced { ChangeVerb::Replace } else { ChangeVerb::Save };
        self.record(locator, verb, &commit, options.minor, saved.version)?;
        Ok(saved.version)
    }

    /// Saves attachment content and returns its new version.
    ///
    /// Re-saving content identical to the latest revision keeps its
    /// version.
    pub fn save_attachment(&self, locator: &Locator, data: &[u8], author: &str, options: &SaveOptions) -> Result<u32> {
        expect_attachment(locator)?;
        let commit = self.commit(author, options);
        let version = self.engine.save_attachment(locator, data, &commit)?;
        self.record(locator, ChangeVerb::Save, &commit, options.minor, version)?;
        Ok(version)
    }

    /// Replaces the latest revision of a topic in place, dated
    /// `options.force_date` or now.
    pub fn replace_latest_revision(
        &self,
        locator: &Locator,
        topic: &mut TopicObject,
        author: &str,
        options: &SaveOptions,
    ) -> Result<u32> {
        expect_topic(locator)?;
        let commit = self.commit(author, options);
        let version = self.engine.replace_latest_topic(locator, topic, &commit)?;
        self.record(locator, ChangeVerb::Replace, &commit, options.minor, version)?;
        Ok(version)
    }

    /// Replaces the latest revision of an attachment in place.
    pub fn replace_latest_attachment(
        &self,
        locator: &Locator,
        data: &[u8],
        author: &str,
        options: &SaveOptions,
    ) -> Result<u32> {
        expect_attachment(locator)?;
        let commit = self.commit(author, options);
        let version = self.engine.replace_latest_attachment(locator, data, &commit)?;
        self.record(locator, ChangeVerb::Replace, &commit, options.minor, version)?;
        Ok(version)
    }

    /// Rolls back the latest revision of a topic or attachment and returns
    /// the new latest version.
    pub fn delete_latest_revision(&self, locator: &Locator, author: &str) -> Result<u32> {
        let version = self.engine.delete_latest(locator)?;
        let commit = Commit::new(author, self.now());
        self.record(locator, ChangeVerb::DeleteRevision, &commit, false, version)?;
        Ok(version)
    }

    /// Moves a topic (with attachments) or an attachment.
    pub fn move_object(&self, from: &Locator, to: &Locator, author: &str) -> Result<()> {
        self.engine.move_object(from, to)?;
        let commit = Commit::new(author, self.now()).with_comment(format!("moved from {}", from));
        let version = self.latest_version(to)?;
        self.record(from, ChangeVerb::Remove, &commit, false, version)?;
        self.record(to, ChangeVerb::Move, &commit, false, version)
    }

    /// Copies a topic (with attachments) or an attachment.
    pub fn copy_object(&self, from: &Locator, to: &Locator, author: &str) -> Result<()> {
        self.engine.copy_object(from, to)?;
        let commit = Commit::new(author, self.now()).with_comment(format!("copied from {}", from));
        let version = self.latest_version(to)?;
        self.record(to, ChangeVerb::Move, &commit, false, version)
    }

    /// Removes a topic (with attachments) or an attachment.
    pub fn remove_object(&self, locator: &Locator, author: &str) -> Result<()> {
        let version = self.latest_version(locator)?;
        self.engine.remove_object(locator)?;
        let commit = Commit::new(author, self.now());
        self.record(locator, ChangeVerb::Remove, &commit, false, version)
    }

    /// Topic names in `namespace`, sorted.
    pub fn list_topics(&self, namespace: &str) -> Result<Vec<String>> {
        self.engine.resolver().topics(&normalize_namespace(namespace)?)
    }

    /// Attachment names of a topic, sorted.
    pub fn list_attachments(&self, topic: &Locator) -> Result<Vec<String>> {
        self.engine.resolver().attachments(&topic.topic_locator())
    }

    /// All namespaces, in slash form, sorted.
    pub fn list_namespaces(&self) -> Result<Vec<String>> {
        self.engine.resolver().namespaces()
    }

    /// The lease on a topic, if any.
    pub fn lease(&self, topic: &Locator) -> Result<Option<Lease>> {
        lease::get(&self.engine, topic)
    }

    /// Records a lease for `user` taken now.
    pub fn set_lease(&self, topic: &Locator, user: &str) -> Result<Lease> {
        let lease = Lease {
            user: user.to_string(),
            taken: self.now(),
        };
        lease::set(&self.engine, topic, &lease)?;
        Ok(lease)
    }

    /// Removes a topic's lease. Returns false if there was none.
    pub fn clear_lease(&self, topic: &Locator) -> Result<bool> {
        lease::clear(&self.engine, topic)
    }

    /// Appends a record to a namespace's change log.
    pub fn append_change(&self, namespace: &str, record: ChangeRecord) -> Result<()> {
        let namespace = normalize_namespace(namespace)?;
        changes::append(&self.engine, &namespace, record, self.now(), self.config.changes.retention_secs)
    }

    /// Change records of a namespace at or after `since`, newest first.
    pub fn changes_since(&self, namespace: &str, since: i64) -> Result<Vec<ChangeRecord>> {
        changes::since(&self.engine, &normalize_namespace(namespace)?, since)
    }

    /// Revision numbers of an object, latest first.
    pub fn revision_history(&self, locator: &Locator) -> Result<Vec<u32>> {
        self.engine.revision_history(locator)
    }

    /// Revision info of `rev`, or of the latest revision.
    pub fn revision_info(&self, locator: &Locator, rev: Option<u32>) -> Result<Option<RevisionInfo>> {
        self.engine.revision_info(locator, rev)
    }

    /// The revision current at `date`.
    pub fn revision_at_date(&self, locator: &Locator, date: i64) -> Result<Option<u32>> {
        self.engine.revision_at_date(locator, date)
    }

    /// Scans for redundant history files. Bypasses object mutexes; run it
    /// while the store is idle.
    pub fn reclaim(&self, config: &ReclaimConfig, progress: Option<&ReclaimProgressCallback>) -> Result<ReclaimReport> {
        reclaim(self.engine.resolver(), self.engine.backend(), config, progress)
    }

    fn commit(&self, author: &str, options: &SaveOptions) -> Commit {
        Commit {
            author: author.to_string(),
            comment: options.comment.clone(),
            date: options.force_date.unwrap_or_else(|| self.now()),
            insert_only: options.insert_only,
            replace_window: None,
        }
    }

    fn latest_version(&self, locator: &Locator) -> Result<u32> {
        Ok(self.engine.revision_info(locator, None)?.map_or(0, |info| info.version))
    }

    fn record(&self, locator: &Locator, verb: ChangeVerb, commit: &Commit, minor: bool, revision: u32) -> Result<()> {
        let mut record = ChangeRecord::new(locator, verb, commit.author.clone(), commit.date, revision);
        record.comment = commit.comment.clone();
        record.minor = minor;
        changes::append(
            &self.engine,
            locator.namespace(),
            record,
            self.now(),
            self.config.changes.retention_secs,
        )
    }
}

fn expect_topic(locator: &Locator) -> Result<()> {
    match locator.attachment_name() {
        Some(name) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason: "expected a topic, got an attachment".to_string(),
        }),
        None => Ok(()),
    }
}

fn expect_attachment(locator: &Locator) -> Result<()> {
    if locator.is_attachment() {
        Ok(())
    } else {
        Err(StoreError::InvalidName {
            name: locator.to_string(),
            reason: "expected an attachment, got a topic".to_string(),
        })
    }
}
