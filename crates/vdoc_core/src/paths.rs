//! Mapping from locators to filesystem paths.

use crate::config::StorageConfig;
use crate::error::Result;
use crate::fsutil::is_temp_file_name;
use crate::locator::{Locator, HISTORY_SUFFIX};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

const TOPIC_SUFFIX: &str = ".txt";
const LEASE_SUFFIX: &str = ".lease";
const CACHE_SUFFIX: &str = ".meta";
const CACHE_DIR: &str = ".cache";
const CHANGES_FILE: &str = ".changes";
const MUTEX_DIR: &str = ".mutex";

/// The kinds of file an object owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// Latest content.
    Primary,
    /// Revision-control history next to the primary file.
    History,
    /// Mutex lock file in the metadata root.
    Mutex,
    /// Edit lease of the owning topic.
    Lease,
    /// Parsed-topic cache.
    MetaCache,
    /// Change log of the owning namespace.
    ChangeLog,
}

/// Resolves locators to paths under the configured roots.
///
/// Topics live under `data_dir`, attachments under `pub_dir`, and every
/// derived artifact (cache, lease, change log, mutex) under `work_dir`.
///
/// ```text
/// data/Main/WebHome.txt            primary
/// data/Main/WebHome.txt,v          history
/// pub/Main/WebHome/logo.png        attachment primary
/// work/Main/WebHome.lease          lease
/// work/Main/.cache/WebHome.meta    metadata cache
/// work/Main/.changes               change log
/// work/.mutex/ab/ab12….lock        mutex
/// ```
#[derive(Debug, Clone)]
pub struct PathResolver {
    data_dir: PathBuf,
    pub_dir: PathBuf,
    work_dir: PathBuf,
}

impl PathResolver {
    /// Creates a resolver for the given storage configuration.
    pub fn new(storage: &StorageConfig) -> Self {
        Self {
            data_dir: storage.data_dir.clone(),
            pub_dir: storage.pub_dir.clone(),
            work_dir: storage.work_dir.clone(),
        }
    }

    /// Topic content root.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Attachment content root.
    pub fn pub_dir(&self) -> &Path {
        &self.pub_dir
    }

    /// Metadata root.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolves the path of `kind` for `locator`.
    pub fn resolve(&self, locator: &Locator, kind: PathKind) -> PathBuf {
        match kind {
            PathKind::Primary => self.primary(locator),
            PathKind::History => with_suffix(&self.primary(locator), HISTORY_SUFFIX),
            PathKind::Mutex => self.mutex_path(&locator.resource_key()),
            PathKind::Lease => with_suffix(
                &self.work_namespace(locator.namespace()).join(locator.topic_name()),
                LEASE_SUFFIX,
            ),
            PathKind::MetaCache => {
                let dir = self.work_namespace(locator.namespace()).join(CACHE_DIR);
                let base = match locator.attachment_name() {
                    Some(att) => dir.join(locator.topic_name()).join(att),
                    None => dir.join(locator.topic_name()),
                };
                with_suffix(&base, CACHE_SUFFIX)
            }
            PathKind::ChangeLog => self.changes_path(locator.namespace()),
        }
    }

    /// Directory holding the topics of a normalized namespace.
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        join_segments(&self.data_dir, namespace)
    }

    /// Directory holding the attachments of a topic.
    pub fn attachment_dir(&self, locator: &Locator) -> PathBuf {
        join_segments(&self.pub_dir, locator.namespace()).join(locator.topic_name())
    }

    /// Change log of a normalized namespace.
    pub fn changes_path(&self, namespace: &str) -> PathBuf {
        self.work_namespace(namespace).join(CHANGES_FILE)
    }

    /// Mutex key guarding a namespace's change log.
    pub fn changes_key(namespace: &str) -> String {
        format!("{}/{}", namespace, CHANGES_FILE)
    }

    /// Lock file for an arbitrary resource key, sharded by its BLAKE3 hash.
    pub fn mutex_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(blake3::hash(key.as_bytes()).as_bytes());
        self.work_dir
            .join(MUTEX_DIR)
            .join(&digest[..2])
            .join(format!("{}.lock", digest))
    }

    /// Topic name for a primary file name, if it names a topic.
    pub(crate) fn topic_from_file_name(file_name: &str) -> Option<&str> {
        file_name
            .strip_suffix(TOPIC_SUFFIX)
            .filter(|name| !name.is_empty() && !name.starts_with('.'))
    }

    /// Normalized names of every namespace that holds a topic directory,
    /// sorted. Nested namespaces are listed alongside their parents.
    pub fn namespaces(&self) -> Result<Vec<String>> {
        let mut found = Vec::new();
        collect_namespaces(&self.data_dir, "", &mut found)?;
        found.sort();
        Ok(found)
    }

    /// Sorted topic names of a normalized namespace.
    pub fn topics(&self, namespace: &str) -> Result<Vec<String>> {
        let mut topics: Vec<String> = list_files(&self.namespace_dir(namespace))?
            .iter()
            .filter_map(|name| Self::topic_from_file_name(name).map(str::to_string))
            .collect();
        topics.sort();
        Ok(topics)
    }

    /// Sorted attachment names of a topic.
    pub fn attachments(&self, topic: &Locator) -> Result<Vec<String>> {
        let mut names: Vec<String> = list_files(&self.attachment_dir(topic))?
            .into_iter()
            .filter(|name| !name.ends_with(HISTORY_SUFFIX) && !name.starts_with('.') && !is_temp_file_name(name))
            .collect();
        names.sort();
        Ok(names)
    }

    fn primary(&self, locator: &Locator) -> PathBuf {
        match locator.attachment_name() {
            Some(att) => self.attachment_dir(locator).join(att),
            None => with_suffix(
                &self.namespace_dir(locator.namespace()).join(locator.topic_name()),
                TOPIC_SUFFIX,
            ),
        }
    }

    fn work_namespace(&self, namespace: &str) -> PathBuf {
        join_segments(&self.work_dir, namespace)
    }
}

/// Appends `suffix` to the final component of `path`.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

fn collect_namespaces(dir: &Path, prefix: &str, found: &mut Vec<String>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let namespace = if prefix.is_empty() {
            name
        } else {
            format!("{}/{}", prefix, name)
        };
        collect_namespaces(&entry.path(), &namespace, found)?;
        found.push(namespace);
    }
    Ok(())
}

/// UTF-8 names of the regular files in `dir`; empty if `dir` is missing.
fn list_files(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
    }
    Ok(names)
}

fn join_segments(root: &Path, namespace: &str) -> PathBuf {
    namespace
        .split('/')
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}
