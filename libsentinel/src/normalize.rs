//! Raw event normalizer.
//!
//! Maps primitive events onto the caller-facing action vocabulary. Rename
//! halves that never find their partner degrade to `Deleted` (old name) and
//! `Created` (new name); they are never dropped.

use crate::event::{Action, PrimitiveEvent, PrimitiveKind, RawSignal, SemanticEvent};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Timestamp a raw change signal. Control signals yield `None`.
pub fn to_primitive(signal: &RawSignal, now: Instant) -> Option<PrimitiveEvent> {
    match signal {
        RawSignal::Change { kind, path, token } => Some(PrimitiveEvent {
            kind: *kind,
            path: path.clone(),
            timestamp: now,
            token: *token,
        }),
        RawSignal::Rescan | RawSignal::Failure(_) => None,
    }
}

/// Split an absolute path into its directory and file name.
pub fn split_path(path: &Path) -> (PathBuf, OsString) {
    let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let file = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| path.as_os_str().to_os_string());
    (directory, file)
}

/// Single-event mapping, used for everything that is not a paired rename.
pub fn to_semantic(event: &PrimitiveEvent) -> SemanticEvent {
    let action = match event.kind {
        PrimitiveKind::Added | PrimitiveKind::RenamedTo => Action::Created,
        PrimitiveKind::Removed | PrimitiveKind::RenamedFrom => Action::Deleted,
        PrimitiveKind::Modified => Action::Modified,
    };
    let (directory, file) = split_path(&event.path);
    SemanticEvent {
        action,
        directory,
        file,
        new_directory: None,
        new_file: None,
    }
}

/// Merge the two halves of a rename into one `Renamed` event.
pub fn merge_rename(from: &PrimitiveEvent, to: &PrimitiveEvent) -> SemanticEvent {
    let (directory, file) = split_path(&from.path);
    let (new_directory, new_file) = split_path(&to.path);
    SemanticEvent {
        action: Action::Renamed,
        directory,
        file,
        new_directory: Some(new_directory),
        new_file: Some(new_file),
    }
}
