//! Event vocabulary shared by every stage of the pipeline.
//!
//! Raw signals come from a [`NotificationSource`](crate::source::NotificationSource),
//! become [`PrimitiveEvent`]s once they are timestamped on the pump, and
//! leave the debouncer as caller-facing [`SemanticEvent`]s.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// The four actions reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Created,
    Modified,
    Deleted,
    Renamed,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Created,
        Action::Modified,
        Action::Deleted,
        Action::Renamed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Modified => "MODIFIED",
            Self::Deleted => "DELETED",
            Self::Renamed => "RENAMED",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a path-level signal, before any pairing or collapsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Added,
    Removed,
    Modified,
    RenamedFrom,
    RenamedTo,
}

/// What a notification source pushes into its [`SignalSink`](crate::source::SignalSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSignal {
    Change {
        kind: PrimitiveKind,
        path: PathBuf,
        /// Pairing token for the two halves of an atomic rename.
        token: Option<u64>,
    },
    /// The backend dropped events and can no longer vouch for the tree.
    Rescan,
    /// The backend failed outright.
    Failure(String),
}

impl RawSignal {
    pub fn change(kind: PrimitiveKind, path: impl Into<PathBuf>) -> Self {
        Self::Change {
            kind,
            path: path.into(),
            token: None,
        }
    }

    pub fn rename_half(kind: PrimitiveKind, path: impl Into<PathBuf>, token: u64) -> Self {
        Self::Change {
            kind,
            path: path.into(),
            token: Some(token),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveEvent {
    pub kind: PrimitiveKind,
    pub path: PathBuf,
    pub timestamp: Instant,
    pub token: Option<u64>,
}

impl PrimitiveEvent {
    pub fn new(kind: PrimitiveKind, path: impl Into<PathBuf>, timestamp: Instant) -> Self {
        Self {
            kind,
            path: path.into(),
            timestamp,
            token: None,
        }
    }

    pub fn with_token(mut self, token: u64) -> Self {
        self.token = Some(token);
        self
    }
}

/// One normalized change, as delivered to the caller's callback.
///
/// `directory` and `file` are kept as OS strings so names that are not
/// valid UTF-8 survive untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticEvent {
    pub action: Action,
    pub directory: PathBuf,
    pub file: OsString,
    /// Destination directory, `Renamed` only.
    pub new_directory: Option<PathBuf>,
    /// Destination file name, `Renamed` only.
    pub new_file: Option<OsString>,
}

impl SemanticEvent {
    /// Full path of the affected entry (the source side for renames).
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file)
    }

    /// Full destination path of a rename.
    pub fn new_path(&self) -> Option<PathBuf> {
        match (&self.new_directory, &self.new_file) {
            (Some(dir), Some(file)) => Some(dir.join(file)),
            _ => None,
        }
    }

    pub fn is_under(&self, root: &Path) -> bool {
        self.directory.starts_with(root)
    }
}

impl fmt::Display for SemanticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.path().display())?;
        if let Some(new_path) = self.new_path() {
            write!(f, " -> {}", new_path.display())?;
        }
        Ok(())
    }
}
