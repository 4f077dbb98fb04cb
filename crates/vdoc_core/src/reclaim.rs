//! Offline scan for redundant history files.
//!
//! A history file whose head revision is 1 holds nothing the primary file
//! doesn't: the object was never actually saved twice. Such files are left
//! behind by interrupted saves and can be deleted. The scan also reports
//! topics whose embedded version disagrees with the history head, without
//! repairing them; the next save reconciles those.
//!
//! The scan talks to the backend directly and takes no mutexes, so it must
//! not run alongside live writers.

use crate::error::Result;
use crate::fsutil::remove_if_exists;
use crate::locator::{normalize_namespace, Locator};
use crate::paths::{PathKind, PathResolver};
use crate::rcs::{RcsFile, RevisionControl};
use crate::topic::TopicObject;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

/// Progress callback for reclamation.
/// Called with (current, total, phase) where phase is "scan", "check", or "done".
pub type ReclaimProgressCallback = dyn Fn(usize, usize, &str);

/// Configuration for a reclamation run.
#[derive(Debug, Clone, Default)]
pub struct ReclaimConfig {
    /// Only scan this namespace (and nothing nested in it). All when `None`.
    pub namespace: Option<String>,

    /// Delete redundant history files instead of only reporting them.
    pub delete: bool,
}

/// A history file that holds a single revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedundantHistory {
    /// Owning object.
    pub locator: Locator,
    /// History file path.
    pub path: PathBuf,
    /// Size of the history file.
    pub bytes: u64,
}

/// A topic whose embedded version differs from its history head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    /// Affected topic.
    pub locator: Locator,
    /// Version recorded in the primary file.
    pub embedded: u32,
    /// Head revision of the history file.
    pub head: u32,
}

/// Report from a reclamation run.
#[derive(Debug, Default)]
pub struct ReclaimReport {
    /// Topics and attachments examined.
    pub objects_scanned: usize,

    /// Objects that have a history file.
    pub histories_scanned: usize,

    /// History files whose head revision is 1.
    pub redundant: Vec<RedundantHistory>,

    /// Topics whose embedded version disagrees with history.
    pub mismatches: Vec<VersionMismatch>,

    /// Total size of the redundant history files.
    pub bytes_reclaimable: u64,

    /// History files deleted (only with `delete`).
    pub files_deleted: usize,

    /// Bytes freed by deletion.
    pub bytes_freed: u64,

    /// Errors encountered during the scan (non-fatal).
    pub errors: Vec<String>,
}

/// Scans the selected namespaces for redundant history.
///
/// # Examples
///
/// ```
/// use vdoc_core::{ReclaimConfig, Store};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let store = Store::open(tmp.path()).unwrap();
/// let report = store.reclaim(&ReclaimConfig::default(), None).unwrap();
/// assert_eq!(report.objects_scanned, 0);
/// ```
pub fn reclaim(
    resolver: &PathResolver,
    backend: &dyn RevisionControl,
    config: &ReclaimConfig,
    progress: Option<&ReclaimProgressCallback>,
) -> Result<ReclaimReport> {
    let mut report = ReclaimReport::default();

    if let Some(cb) = progress {
        cb(0, 0, "scan");
    }
    let objects = collect_objects(resolver, config, &mut report)?;
    let total = objects.len();

    for (idx, locator) in objects.into_iter().enumerate() {
        if let Some(cb) = progress {
            cb(idx + 1, total, "check");
        }
        report.objects_scanned += 1;
        if let Err(e) = check_object(resolver, backend, config, &locator, &mut report) {
            report.errors.push(format!("{}: {}", locator, e));
        }
    }

    if let Some(cb) = progress {
        cb(total, total, "done");
    }
    Ok(report)
}

/// Every topic and attachment in the selected namespaces.
fn collect_objects(resolver: &PathResolver, config: &ReclaimConfig, report: &mut ReclaimReport) -> Result<Vec<Locator>> {
    let namespaces = match &config.namespace {
        Some(ns) => vec![normalize_namespace(ns)?],
        None => resolver.namespaces()?,
    };

    let mut objects = Vec::new();
    for namespace in namespaces {
        for topic in resolver.topics(&namespace)? {
            let locator = match Locator::topic(&namespace, &topic) {
                Ok(locator) => locator,
                Err(e) => {
                    report.errors.push(format!("{}/{}: {}", namespace, topic, e));
                    continue;
                }
            };
            for attachment in resolver.attachments(&locator)? {
                match locator.with_attachment(&attachment) {
                    Ok(att) => objects.push(att),
                    Err(e) => report.errors.push(format!("{}/{}: {}", locator, attachment, e)),
                }
            }
            objects.push(locator);
        }
    }
    debug!(count = objects.len(), "collected objects");
    Ok(objects)
}

fn check_object(
    resolver: &PathResolver,
    backend: &dyn RevisionControl,
    config: &ReclaimConfig,
    locator: &Locator,
    report: &mut ReclaimReport,
) -> Result<()> {
    let file = RcsFile::new(
        resolver.resolve(locator, PathKind::Primary),
        resolver.resolve(locator, PathKind::History),
        locator.is_attachment(),
    );
    if !file.has_history() {
        return Ok(());
    }
    report.histories_scanned += 1;

    let head = backend.head_revision(&file)?;
    if !locator.is_attachment() {
        let content = fs::read(&file.file)?;
        let embedded = TopicObject::embedded_info(&String::from_utf8_lossy(&content)).map_or(1, |info| info.version);
        if embedded != head {
            report.mismatches.push(VersionMismatch {
                locator: locator.clone(),
                embedded,
                head,
            });
        }
    }

    if head != 1 {
        return Ok(());
    }

    let bytes = fs::metadata(&file.history)?.len();
    report.bytes_reclaimable += bytes;
    report.redundant.push(RedundantHistory {
        locator: locator.clone(),
        path: file.history.clone(),
        bytes,
    });

    if config.delete {
        match remove_if_exists(&file.history) {
            Ok(_) => {
                info!(object = %locator, bytes, "deleted redundant history");
                report.files_deleted += 1;
                report.bytes_freed += bytes;
            }
            Err(e) => report
                .errors
                .push(format!("Failed to delete {}: {}", file.history.display(), e)),
        }
    }
    Ok(())
}
