//! Initialize a new vdoc store.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use vdoc_core::{BackendKind, Config, RcsWrap, CONFIG_FILE};

/// Initialize a new store at `root`.
pub fn run(root: &Path, backend: &str) -> Result<()> {
    let backend = match backend {
        "lite" => BackendKind::Lite,
        "rcs" => BackendKind::Rcs,
        other => bail!("Unknown backend '{}' (expected 'lite' or 'rcs')", other),
    };
    if root.join(CONFIG_FILE).exists() {
        bail!("A store already exists at {}", root.display());
    }
    if backend == BackendKind::Rcs && !RcsWrap::is_available() {
        eprintln!("warning: RCS tools not found on PATH; saves will fail until they are installed");
    }

    let mut config = Config::default();
    config.history.backend = backend;

    fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;
    for dir in [
        &config.storage.data_dir,
        &config.storage.pub_dir,
        &config.storage.work_dir,
    ] {
        fs::create_dir_all(root.join(dir)).context("Failed to create store directories")?;
    }
    config.save(root).context("Failed to write configuration")?;

    println!("Initialized vdoc store in {}", root.display());
    println!();
    println!("Directory structure:");
    println!("  data/   - Topic text and history");
    println!("  pub/    - Attachments and their history");
    println!("  work/   - Caches, leases, change logs and lock files");
    println!();
    println!("Configuration written to {}", CONFIG_FILE);
    println!("  Backend: {:?}", config.history.backend);

    Ok(())
}
