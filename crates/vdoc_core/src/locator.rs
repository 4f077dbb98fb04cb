//! Addresses of stored objects.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix reserved for history files.
pub(crate) const HISTORY_SUFFIX: &str = ",v";

/// Identifies a topic, or an attachment of a topic, inside a namespace.
///
/// Namespaces are hierarchical; `Main.Sub` and `Main/Sub` name the same
/// namespace and are stored in normalized slash form.
///
/// # Examples
///
/// ```
/// use vdoc_core::Locator;
///
/// let loc = Locator::topic("Main.Projects", "WebHome").unwrap();
/// assert_eq!(loc.namespace(), "Main/Projects");
/// assert_eq!(loc.to_string(), "Main.Projects.WebHome");
///
/// let att = loc.with_attachment("diagram.png").unwrap();
/// assert!(att.is_attachment());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Locator {
    namespace: String,
    topic: String,
    attachment: Option<String>,
}

impl Locator {
    /// Creates a locator for a topic.
    pub fn topic(namespace: &str, topic: &str) -> Result<Self> {
        let namespace = normalize_namespace(namespace)?;
        validate_name(topic, "topic")?;
        Ok(Self {
            namespace,
            topic: topic.to_string(),
            attachment: None,
        })
    }

    /// Creates a locator for an attachment of a topic.
    pub fn attachment(namespace: &str, topic: &str, attachment: &str) -> Result<Self> {
        Self::topic(namespace, topic)?.with_attachment(attachment)
    }

    /// Returns a locator for `attachment` under this locator's topic.
    pub fn with_attachment(&self, attachment: &str) -> Result<Self> {
        validate_name(attachment, "attachment")?;
        Ok(Self {
            namespace: self.namespace.clone(),
            topic: self.topic.clone(),
            attachment: Some(attachment.to_string()),
        })
    }

    /// Returns the locator of the owning topic.
    pub fn topic_locator(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            topic: self.topic.clone(),
            attachment: None,
        }
    }

    /// Normalized namespace, segments separated by `/`.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Topic name.
    pub fn topic_name(&self) -> &str {
        &self.topic
    }

    /// Attachment name, if this locator addresses an attachment.
    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_deref()
    }

    /// True when this locator addresses an attachment.
    pub fn is_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    /// Key used to derive this object's mutex.
    ///
    /// Attachments share their topic's key: a topic and everything stored
    /// under it are one locking unit.
    pub fn resource_key(&self) -> String {
        format!("{}/{}", self.namespace, self.topic)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace.replace('/', "."), self.topic)?;
        if let Some(att) = &self.attachment {
            write!(f, "/{}", att)?;
        }
        Ok(())
    }
}

/// Normalizes a dotted or slashed namespace into slash form.
///
/// # Errors
///
/// Returns `InvalidName` if the namespace is empty or any segment is invalid.
pub fn normalize_namespace(namespace: &str) -> Result<String> {
    let segments: Vec<&str> = namespace.split(['.', '/']).collect();
    if namespace.is_empty() || segments.iter().any(|s| s.is_empty()) {
        return Err(StoreError::InvalidName {
            name: namespace.to_string(),
            reason: "empty namespace segment".to_string(),
        });
    }
    for segment in &segments {
        validate_name(segment, "namespace")?;
    }
    Ok(segments.join("/"))
}

fn validate_name(name: &str, what: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some(format!("empty {} name", what))
    } else if name.starts_with('.') {
        Some(format!("{} name starts with '.'", what))
    } else if name.contains(['/', '\\', '\0']) {
        Some(format!("{} name contains a path separator or NUL", what))
    } else if name.ends_with(HISTORY_SUFFIX) {
        Some(format!("{} name ends with reserved suffix {}", what, HISTORY_SUFFIX))
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StoreError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
