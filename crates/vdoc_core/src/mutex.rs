//! Per-resource advisory file locks.
//!
//! Every storage operation on an object runs inside that object's mutex:
//! shared for reads, exclusive for writes. The mutex is an OS-level lock on
//! a lock file under the metadata root; blocking on it is the only place a
//! store call waits for another.

use crate::error::{Result, StoreError};
use crate::paths::PathResolver;
use fs2::FileExt;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use tracing::{debug, warn};
use uuid::Uuid;

/// Lock mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutexMode {
    /// Any number of concurrent holders.
    Shared,
    /// A single holder.
    Exclusive,
}

impl fmt::Display for MutexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => write!(f, "shared"),
            Self::Exclusive => write!(f, "exclusive"),
        }
    }
}

struct Held {
    key: String,
    mode: MutexMode,
    thread: ThreadId,
    path: PathBuf,
    file: File,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    held: HashMap<u64, Held>,
}

type SharedRegistry = Arc<Mutex<Registry>>;

fn registry(shared: &SharedRegistry) -> MutexGuard<'_, Registry> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hands out mutexes for one session.
///
/// A session is one manager used from one thread. A session must not lock a
/// resource against itself: asking for a lock that would wait on a lock this
/// session already holds fails with [`StoreError::MutexHeld`] instead of
/// deadlocking. Other threads sharing the manager simply block.
///
/// # Examples
///
/// ```
/// use vdoc_core::{Config, MutexManager, MutexMode, PathResolver};
/// use tempfile::TempDir;
///
/// let tmp = TempDir::new().unwrap();
/// let config = Config::rooted(tmp.path());
/// let mutexes = MutexManager::new(PathResolver::new(&config.storage));
///
/// let token = mutexes.acquire("Main/WebHome", MutexMode::Exclusive).unwrap();
/// assert!(mutexes.acquire("Main/WebHome", MutexMode::Exclusive).is_err());
/// token.release().unwrap();
/// ```
pub struct MutexManager {
    resolver: PathResolver,
    session: Uuid,
    registry: SharedRegistry,
}

impl MutexManager {
    /// Creates a manager with a fresh session id.
    pub fn new(resolver: PathResolver) -> Self {
        Self {
            resolver,
            session: Uuid::new_v4(),
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Identifier of this session, written into exclusive lock files.
    pub fn session_id(&self) -> Uuid {
        self.session
    }

    /// Blocks until the mutex for `key` is granted in `mode`.
    ///
    /// # Errors
    ///
    /// Returns `MutexHeld` if this session already holds `key` in a mode that
    /// conflicts with `mode`, and `Io` if the lock file cannot be created.
    pub fn acquire(&self, key: &str, mode: MutexMode) -> Result<MutexToken> {
        let current = thread::current().id();
        {
            let reg = registry(&self.registry);
            if let Some(existing) = reg.held.values().find(|h| {
                h.thread == current
                    && h.key == key
                    && (h.mode == MutexMode::Exclusive || mode == MutexMode::Exclusive)
            })
            {
                return Err(StoreError::MutexHeld {
                    key: key.to_string(),
                    mode: existing.mode.to_string(),
                });
            }
        }

        let path = self.resolver.mutex_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = loop {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;

            match mode {
                MutexMode::Shared => FileExt::lock_shared(&file)?,
                MutexMode::Exclusive => FileExt::lock_exclusive(&file)?,
            }

            // A releaser may have unlinked the file while we waited on it
            if still_linked(&file, &path)? {
                break file;
            }
            debug!(key, "mutex file replaced while waiting, retrying");
        };

        if mode == MutexMode::Exclusive {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            writeln!(file, "{} {}", std::process::id(), self.session)?;
        }

        let mut reg = registry(&self.registry);
        let id = reg.next_id;
        reg.next_id += 1;
        reg.held.insert(
            id,
            Held {
                key: key.to_string(),
                mode,
                thread: current,
                path,
                file,
            },
        );

        Ok(MutexToken {
            id,
            key: key.to_string(),
            mode,
            registry: Arc::clone(&self.registry),
            released: false,
        })
    }

    /// Releases a token. Equivalent to [`MutexToken::release`].
    pub fn release(&self, token: MutexToken) -> Result<()> {
        token.release()
    }

    /// Keys and modes currently held by this session.
    pub fn held(&self) -> Vec<(String, MutexMode)> {
        let mut held: Vec<_> = registry(&self.registry)
            .held
            .values()
            .map(|h| (h.key.clone(), h.mode))
            .collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        held
    }
}

impl Drop for MutexManager {
    fn drop(&mut self) {
        let leftovers: Vec<Held> = registry(&self.registry).held.drain().map(|(_, h)| h).collect();
        for held in leftovers {
            warn!(key = %held.key, mode = %held.mode, "force-releasing mutex left held at teardown");
            if let Err(e) = unlock_and_unlink(held) {
                warn!("failed to release mutex: {}", e);
            }
        }
    }
}

/// A held mutex. Released explicitly with [`release`](Self::release) or
/// when dropped.
pub struct MutexToken {
    id: u64,
    key: String,
    mode: MutexMode,
    registry: SharedRegistry,
    released: bool,
}

impl MutexToken {
    /// Resource key this token locks.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Mode the lock was granted in.
    pub fn mode(&self) -> MutexMode {
        self.mode
    }

    /// Releases the lock, removing the lock file when no one else holds it.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        release_entry(&self.registry, self.id)
    }
}

impl Drop for MutexToken {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = release_entry(&self.registry, self.id) {
                warn!(key = %self.key, "failed to release mutex: {}", e);
            }
        }
    }
}

fn release_entry(shared: &SharedRegistry, id: u64) -> Result<()> {
    let held = registry(shared).held.remove(&id);
    match held {
        Some(held) => unlock_and_unlink(held),
        // Already force-released by the manager
        None => Ok(()),
    }
}

fn unlock_and_unlink(held: Held) -> Result<()> {
    // Only unlink while we are provably the sole holder; waiters that were
    // blocked on the unlinked inode notice and retry.
    let sole = match held.mode {
        MutexMode::Exclusive => true,
        MutexMode::Shared => held.file.try_lock_exclusive().is_ok(),
    };
    if sole {
        if let Err(e) = fs::remove_file(&held.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                debug!(path = %held.path.display(), "could not remove mutex file: {}", e);
            }
        }
    }
    FileExt::unlock(&held.file)?;
    Ok(())
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let ours = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.ino() == ours.ino() && current.dev() == ours.dev()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> Result<bool> {
    Ok(path.exists())
}
