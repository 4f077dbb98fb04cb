use super::clock::MockClock;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use vdoc_core::{Config, Locator, PathKind, RcsFile, Store};

/// Parses `"Namespace.Topic"` (or `"A/B.Topic"`) into a topic locator.
pub fn topic(dotted: &str) -> Result<Locator> {
    let (namespace, name) = dotted
        .rsplit_once('.')
        .ok_or_else(|| anyhow!("expected Namespace.Topic, got {:?}", dotted))?;
    Ok(Locator::topic(namespace, name)?)
}

/// Manages an isolated store in a temporary directory
pub struct TestWorkspace {
    dir: TempDir,
    config: Config,
}

impl TestWorkspace {
    /// Create an empty workspace with the default configuration
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        let config = Config::rooted(dir.path());
        Ok(Self { dir, config })
    }

    /// Create an empty workspace with a tweaked configuration
    pub fn with_config(tweak: impl FnOnce(&mut Config)) -> Result<Self> {
        let mut workspace = Self::empty()?;
        tweak(&mut workspace.config);
        Ok(workspace)
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a store over the workspace, driven by `clock`
    pub fn open_store(&self, clock: &MockClock) -> Store {
        Store::with_config(self.path(), self.config.clone()).with_time_provider(clock.as_provider())
    }

    /// Primary and history paths of an object
    pub fn rcs_file(&self, store: &Store, locator: &Locator) -> RcsFile {
        let resolver = store.engine().resolver();
        RcsFile::new(
            resolver.resolve(locator, PathKind::Primary),
            resolver.resolve(locator, PathKind::History),
            locator.is_attachment(),
        )
    }

    /// Path of an object's history file
    pub fn history_path(&self, store: &Store, locator: &Locator) -> PathBuf {
        store.engine().resolver().resolve(locator, PathKind::History)
    }

    /// Overwrite a file and date it `ahead` into the future, so it reads
    /// as newer than anything written so far
    pub fn write_ahead(&self, path: &Path, content: &[u8], ahead: Duration) -> Result<()> {
        fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        fs::File::options()
            .write(true)
            .open(path)?
            .set_modified(SystemTime::now() + ahead)?;
        Ok(())
    }
}
