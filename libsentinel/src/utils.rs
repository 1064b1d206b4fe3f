//! Misc shared helpers.

use std::env;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve a watch root to its canonical absolute form.
///
/// A path that cannot be canonicalized (it usually does not exist) is made
/// absolute against the current directory instead, with `.` and `..`
/// folded lexically, so [`Watcher::start`](crate::Watcher::start) can
/// report it.
pub fn resolve_root(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir().unwrap_or_default().join(path)
    };

    let mut out = PathBuf::new();
    for comp in absolute.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
