//! Error types for sentinel
//!
//! Only start-time and backend-fatal failures ever reach a caller; the
//! registration variants are absorbed by the tree synchronizer for every
//! path except the watched root.

use std::io;
use std::path::PathBuf;

/// Result type for sentinel - convenience wrapper around Result<T, Error>
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The notification source refused a watch: the path vanished, access
    /// was denied or the platform's handle budget is exhausted.
    #[error("failed to watch {}: {reason}", path.display())]
    Registration { path: PathBuf, reason: String },

    /// A path was registered twice. The synchronizer never does this on
    /// purpose, so this always indicates a bookkeeping bug.
    #[error("path is already watched: {}", .0.display())]
    DuplicateWatch(PathBuf),

    /// `start()` was called on a root that cannot be watched.
    #[error("cannot start watcher: {0}")]
    Start(String),

    /// The backend hit a condition it cannot recover from, typically the
    /// removal of the watched root.
    #[error("watcher backend failed: {0}")]
    BackendFatal(String),

    /// Invalid state for the requested operation
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// An error from the notify library
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}
