//! Error types for vdoc_core operations.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`StoreError`], for callers that branch on
/// the kind of failure rather than on the exact variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request conflicts with the current state of the store.
    Conflict,
    /// The revision-control backend failed.
    Backend,
    /// A filesystem operation failed.
    Io,
    /// The request itself is malformed (bad name, bad config, bad data).
    Invalid,
    /// A required object does not exist.
    NotFound,
}

/// Core error type for vdoc_core operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// An insert-only save targeted an object that already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The initial revision of an object cannot be deleted.
    #[error("cannot delete the initial revision of {0}")]
    InitialRevision(String),

    /// The session already holds a lock on this resource that would
    /// deadlock against the requested one.
    #[error("mutex for {key} already held by this session ({mode})")]
    MutexHeld {
        /// Resource key
        key: String,
        /// Mode of the lock already held
        mode: String,
    },

    /// A move or copy target is already occupied.
    #[error("target already exists: {0}")]
    TargetExists(String),

    /// The object named by a move/copy/remove does not exist.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Invalid namespace, topic or attachment name.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// A revision-control command exited unsuccessfully.
    #[error("{command} failed ({status}): {stderr}")]
    Backend {
        /// The command line that was run
        command: String,
        /// Exit status description
        status: String,
        /// Captured standard output
        stdout: String,
        /// Captured standard error
        stderr: String,
    },

    /// The history file could not be decoded.
    #[error("corrupted history at {}: {}", path.display(), reason)]
    CorruptedHistory {
        /// Path to the history file
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Returns the coarse kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyExists(_)
            | Self::InitialRevision(_)
            | Self::MutexHeld { .. }
            | Self::TargetExists(_) => ErrorKind::Conflict,
            Self::Backend { .. } | Self::CorruptedHistory { .. } => ErrorKind::Backend,
            Self::Io(_) => ErrorKind::Io,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidName { .. }
            | Self::Serialization(_)
            | Self::Deserialization(_)
            | Self::ConfigError(_) => ErrorKind::Invalid,
        }
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::AlreadyExists(_) => Some("Save without insert-only to update the existing object."),
            Self::InitialRevision(_) => Some("Remove the object instead of deleting its only revision."),
            Self::CorruptedHistory { .. } => {
                Some("Run 'vdoc reclaim' to inspect history files, or restore the file from backup.")
            }
            Self::Backend { .. } => {
                Some("Check that the RCS tools are installed, or switch [history] backend to \"lite\".")
            }
            Self::MutexHeld { .. } => Some("Release the existing token before locking the resource again."),
            _ => None,
        }
    }
}

/// Convenience Result type for vdoc_core operations.
pub type Result<T> = std::result::Result<T, StoreError>;
