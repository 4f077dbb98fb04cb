//! CLI commands.

pub mod cat;
pub mod history;
pub mod init;
pub mod reclaim;
pub mod save;

use anyhow::{Context, Result};
use std::path::Path;
use vdoc_core::{Locator, Store};

/// Opens the store at `root`.
pub fn open_store(root: &Path) -> Result<Store> {
    Store::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

/// Builds a topic or attachment locator from command arguments.
pub fn locator(namespace: &str, topic: &str, attachment: Option<&str>) -> Result<Locator> {
    let locator = match attachment {
        Some(name) => Locator::attachment(namespace, topic, name),
        None => Locator::topic(namespace, topic),
    };
    locator.context("Invalid object name")
}
