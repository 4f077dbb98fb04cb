use anyhow::Result;
use vdoc_core::Store;

/// Declarative assertions on store state.
///
/// Topics are named `"Namespace.Topic"`.
pub enum Assertion {
    // Revisions
    LatestVersion {
        topic: String,
        version: u32,
    },
    RevisionAuthor {
        topic: String,
        rev: u32,
        author: String,
    },
    RevisionComment {
        topic: String,
        rev: u32,
        comment: String,
    },

    // Content
    TopicText {
        topic: String,
        rev: Option<u32>,
        text: String,
        served: u32,
    },
    AttachmentData {
        topic: String,
        name: String,
        rev: Option<u32>,
        data: Vec<u8>,
        served: u32,
    },

    // History files
    HasHistory {
        topic: String,
    },
    NoHistory {
        topic: String,
    },
    HistoryHead {
        topic: String,
        head: u32,
    },

    // Change log
    ChangeCount {
        namespace: String,
        count: usize,
    },

    // Custom
    Custom(Box<dyn Fn(&Store) -> Result<()> + Send + Sync>),
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LatestVersion { topic, version } => write!(f, "LatestVersion({}, {})", topic, version),
            Self::RevisionAuthor { topic, rev, author } => {
                write!(f, "RevisionAuthor({}, r{}, {:?})", topic, rev, author)
            }
            Self::RevisionComment { topic, rev, comment } => {
                write!(f, "RevisionComment({}, r{}, {:?})", topic, rev, comment)
            }
            Self::TopicText { topic, rev, text, served } => {
                write!(f, "TopicText({}, {:?} -> r{}, {:?})", topic, rev, served, text)
            }
            Self::AttachmentData {
                topic, name, rev, served, ..
            } => write!(f, "AttachmentData({}/{}, {:?} -> r{})", topic, name, rev, served),
            Self::HasHistory { topic } => write!(f, "HasHistory({})", topic),
            Self::NoHistory { topic } => write!(f, "NoHistory({})", topic),
            Self::HistoryHead { topic, head } => write!(f, "HistoryHead({}, {})", topic, head),
            Self::ChangeCount { namespace, count } => write!(f, "ChangeCount({}, {})", namespace, count),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}
