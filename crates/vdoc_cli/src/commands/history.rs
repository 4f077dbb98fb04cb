//! Show revision history.

use super::{locator, open_store};
use anyhow::{bail, Result};
use chrono::DateTime;
use console::style;
use std::path::Path;

/// Show the revisions of a topic or attachment, newest first.
pub fn run(root: &Path, namespace: &str, topic: &str, attachment: Option<&str>, limit: Option<usize>) -> Result<()> {
    let store = open_store(root)?;
    let locator = locator(namespace, topic, attachment)?;
    if !store.exists(&locator) {
        bail!("{} does not exist", locator);
    }

    let revisions = store.revision_history(&locator)?;
    println!("{} ({} revisions)", style(&locator).bold(), revisions.len());
    for rev in revisions.into_iter().take(limit.unwrap_or(usize::MAX)) {
        let Some(info) = store.revision_info(&locator, Some(rev))? else {
            continue;
        };
        let date = DateTime::from_timestamp(info.date, 0)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC");
        println!(
            "  {}  {}  {}",
            style(format!("r{}", info.version)).yellow(),
            date,
            style(&info.author).cyan()
        );
        if !info.comment.is_empty() {
            println!("        {}", info.comment);
        }
    }
    Ok(())
}
