//! Save a topic or attachment.

use super::{locator, open_store};
use anyhow::{Context, Result};
use console::style;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use vdoc_core::{SaveOptions, TopicObject};

/// Arguments of the save command.
pub struct SaveArgs {
    pub namespace: String,
    pub topic: String,
    pub attachment: Option<String>,
    pub file: Option<PathBuf>,
    pub author: Option<String>,
    pub message: String,
    pub force_new_revision: bool,
    pub minor: bool,
}

/// Save content from a file or stdin as a new revision.
pub fn run(root: &Path, args: &SaveArgs) -> Result<()> {
    let store = open_store(root)?;
    let locator = locator(&args.namespace, &args.topic, args.attachment.as_deref())?;

    let content = match &args.file {
        Some(path) => fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf).context("Failed to read stdin")?;
            buf
        }
    };
    let author = args
        .author
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "vdoc".to_string());
    let options = SaveOptions {
        force_new_revision: args.force_new_revision,
        comment: args.message.clone(),
        minor: args.minor,
        ..SaveOptions::default()
    };

    let version = if locator.is_attachment() {
        store.save_attachment(&locator, &content, &author, &options)?
    } else {
        let text = String::from_utf8(content).context("Topic text must be UTF-8")?;
        // Keep the existing metadata, swap the text
        let mut topic = match store.read_topic(&locator, None)? {
            Some(loaded) => loaded.value,
            None => TopicObject::default(),
        };
        topic.set_text(text);
        store.save_topic(&locator, &mut topic, &author, &options)?
    };

    println!(
        "{} Saved {} as revision {}",
        style("✓").green(),
        style(&locator).bold(),
        style(version).yellow()
    );
    Ok(())
}
