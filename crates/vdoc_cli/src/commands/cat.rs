//! Print a topic or attachment.

use super::{locator, open_store};
use anyhow::{bail, Result};
use std::io::{self, Write};
use std::path::Path;

/// Print the content of a topic or attachment at `rev`.
pub fn run(root: &Path, namespace: &str, topic: &str, attachment: Option<&str>, rev: Option<u32>, raw: bool) -> Result<()> {
    let store = open_store(root)?;
    let locator = locator(namespace, topic, attachment)?;

    let (bytes, version, is_latest) = if locator.is_attachment() {
        match store.read_attachment(&locator, rev)? {
            Some(loaded) => (loaded.value, loaded.version, loaded.is_latest),
            None => bail!("{} does not exist", locator),
        }
    } else {
        match store.read_topic(&locator, rev)? {
            Some(loaded) => {
                let content = if raw {
                    loaded.value.serialize()
                } else {
                    loaded.value.text().to_string()
                };
                (content.into_bytes(), loaded.version, loaded.is_latest)
            }
            None => bail!("{} does not exist", locator),
        }
    };

    if let Some(requested) = rev {
        if requested != version {
            eprintln!("note: revision {} does not exist, showing {}", requested, version);
        }
    }
    tracing::debug!(object = %locator, version, is_latest, "printing");

    let mut stdout = io::stdout().lock();
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}
