//! Watch descriptor table.
//!
//! Sole owner of the notification source, and therefore of every native
//! handle. Maps canonical paths to [`WatchId`]s and back.

use crate::error::{Error, Result};
use crate::source::NotificationSource;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Opaque handle for one native watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "wd#{}", self.0)
    }
}

pub struct DescriptorTable {
    source: Box<dyn NotificationSource>,
    by_path: HashMap<PathBuf, WatchId>,
    by_id: HashMap<WatchId, PathBuf>,
    next_id: u64,
}

impl DescriptorTable {
    pub fn new(source: Box<dyn NotificationSource>) -> Self {
        Self {
            source,
            by_path: HashMap::new(),
            by_id: HashMap::new(),
            next_id: 1,
        }
    }

    /// Open a native watch on `path`.
    ///
    /// A path that is already registered is rejected with
    /// [`Error::DuplicateWatch`]; the caller is expected to have checked.
    pub fn register(&mut self, path: &Path) -> Result<WatchId> {
        if self.by_path.contains_key(path) {
            return Err(Error::DuplicateWatch(path.to_path_buf()));
        }

        self.source.open(path)?;

        let id = WatchId(self.next_id);
        self.next_id += 1;
        self.by_path.insert(path.to_path_buf(), id);
        self.by_id.insert(id, path.to_path_buf());
        trace!(%id, path = %path.display(), "registered");
        Ok(id)
    }

    /// Close a native watch. Unknown ids are ignored, and so is a source
    /// that no longer knows the path: the directory may be gone already.
    pub fn unregister(&mut self, id: WatchId) {
        let Some(path) = self.by_id.remove(&id) else {
            return;
        };
        self.by_path.remove(&path);

        if let Err(e) = self.source.close(&path) {
            debug!(%id, path = %path.display(), error = %e, "close failed, watch already gone");
        } else {
            trace!(%id, path = %path.display(), "unregistered");
        }
    }

    pub fn lookup(&self, path: &Path) -> Option<WatchId> {
        self.by_path.get(path).copied()
    }

    /// Number of live native handles.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Close every outstanding handle.
    pub fn release_all(&mut self) {
        if self.is_empty() {
            return;
        }
        let mut ids: Vec<WatchId> = self.by_id.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.unregister(id);
        }
    }
}

impl Drop for DescriptorTable {
    fn drop(&mut self) {
        self.release_all();
    }
}
