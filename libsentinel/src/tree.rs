//! Directory tree synchronizer.
//!
//! Mirrors the watched hierarchy with one native watch per directory and
//! keeps that mirror in step with the signals the pump feeds it. Every
//! descent, initial or reactive, consults the guard set of canonical
//! realpaths: a directory that resolves to something already watched
//! becomes an unwatched leaf marker and is never entered. This is what
//! keeps symlink cycles finite.
//!
//! Symlinked directories are only entered once every real directory the
//! walk can reach has been registered, so an alias never takes a realpath
//! away from the directory it points at. When a watched realpath is
//! released, markers that resolve to it are descended again.

use crate::error::{Error, Result};
use crate::event::{PrimitiveEvent, PrimitiveKind};
use crate::exclude::PathExclusions;
use crate::table::{DescriptorTable, WatchId};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// One directory in the mirror.
#[derive(Debug)]
pub struct WatchNode {
    /// Logical path under the canonical root.
    pub path: PathBuf,
    pub name: OsString,
    /// `None` for a leaf marker closing a cycle.
    pub handle: Option<WatchId>,
    pub realpath: PathBuf,
    /// Canonical target when `path` itself is a symlink.
    pub link_target: Option<PathBuf>,
    pub children: BTreeMap<OsString, WatchNode>,
}

impl WatchNode {
    pub fn is_marker(&self) -> bool {
        self.handle.is_none()
    }
}

pub struct DirectoryTree {
    root: WatchNode,
    table: DescriptorTable,
    exclusions: PathExclusions,
    guard: HashSet<PathBuf>,
}

/// The pieces of the tree a descent needs, borrowed apart from the nodes.
struct Descent<'a> {
    table: &'a mut DescriptorTable,
    guard: &'a mut HashSet<PathBuf>,
    exclusions: &'a PathExclusions,
    /// Symlinks met on the way, entered after the real directories.
    links: Vec<PathBuf>,
    /// Every entry met on the way, when the caller wants them reported.
    found: Option<Vec<PathBuf>>,
}

impl DirectoryTree {
    /// Register `root` and everything below it.
    ///
    /// Only the root is allowed to fail: anything underneath that cannot be
    /// watched is logged and left out.
    pub fn build(
        root: &Path,
        mut table: DescriptorTable,
        exclusions: PathExclusions,
    ) -> Result<Self> {
        let realpath = fs::canonicalize(root)
            .map_err(|e| Error::Start(format!("{}: {e}", root.display())))?;
        if !realpath.is_dir() {
            return Err(Error::Start(format!("{} is not a directory", root.display())));
        }
        let handle = table
            .register(root)
            .map_err(|e| Error::Start(e.to_string()))?;

        let mut guard = HashSet::new();
        guard.insert(realpath.clone());

        let mut tree = Self {
            root: WatchNode {
                path: root.to_path_buf(),
                name: root.file_name().map(|n| n.to_os_string()).unwrap_or_default(),
                handle: Some(handle),
                realpath,
                link_target: None,
                children: BTreeMap::new(),
            },
            table,
            exclusions,
            guard,
        };
        tree.descend(vec![root.to_path_buf()], false);

        debug!(
            root = %tree.root.path.display(),
            watched = tree.watched_count(),
            "initial walk complete"
        );
        Ok(tree)
    }

    /// Dispatch one primitive event to the matching reaction. Returns the
    /// entries found inside a directory that was just attached.
    pub fn apply(&mut self, event: &PrimitiveEvent) -> Vec<PathBuf> {
        match event.kind {
            PrimitiveKind::Added | PrimitiveKind::RenamedTo => self.on_added(&event.path),
            PrimitiveKind::Removed | PrimitiveKind::RenamedFrom => {
                self.on_removed(&event.path);
                Vec::new()
            }
            PrimitiveKind::Modified => Vec::new(),
        }
    }

    /// A new entry appeared. Directories get a node, a watch and a walk of
    /// whatever they already contain.
    ///
    /// Returns every file and directory met during that walk, the added
    /// path itself excluded. Those may have been created before their
    /// parent's watch existed, so the platform never reports them.
    pub fn on_added(&mut self, path: &Path) -> Vec<PathBuf> {
        if path == self.root.path || self.contains(path) || self.exclusions.is_excluded(path) {
            return Vec::new();
        }
        match path.parent().and_then(|p| find(&self.root, p)) {
            Some(parent) if !parent.is_marker() => {}
            Some(_) => return Vec::new(),
            None => {
                trace!(path = %path.display(), "parent not in tree");
                return Vec::new();
            }
        }

        let found = self.descend(vec![path.to_path_buf()], true);
        if self.contains(path) {
            debug!(path = %path.display(), found = found.len(), "directory added");
        }
        found
    }

    /// An entry went away. If it was a node, the node and its whole subtree
    /// are detached and released. Returns whether anything was removed.
    pub fn on_removed(&mut self, path: &Path) -> bool {
        let (Some(parent_path), Some(name)) = (path.parent(), path.file_name()) else {
            return false;
        };
        if path == self.root.path {
            return false;
        }
        let Some(parent) = find_mut(&mut self.root, parent_path) else {
            return false;
        };
        let Some(node) = parent.children.remove(name) else {
            return false;
        };

        let freed = release(node, &mut self.table, &mut self.guard);
        debug!(path = %path.display(), released = freed.len(), "directory removed");
        if !freed.is_empty() {
            self.revive(&freed);
        }
        true
    }

    /// Release every node, the root included.
    pub fn teardown(&mut self) {
        let children = std::mem::take(&mut self.root.children);
        let mut released = 0;
        for child in children.into_values() {
            released += release(child, &mut self.table, &mut self.guard).len();
        }
        if let Some(id) = self.root.handle.take() {
            self.table.unregister(id);
            self.guard.remove(&self.root.realpath);
            released += 1;
        }
        self.table.release_all();
        debug!(root = %self.root.path.display(), released, "tree torn down");
    }

    pub fn contains(&self, path: &Path) -> bool {
        find(&self.root, path).is_some()
    }

    pub fn is_watched(&self, path: &Path) -> bool {
        self.table.lookup(path).is_some()
    }

    /// Live native handles.
    pub fn watched_count(&self) -> usize {
        self.table.len()
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.handle.is_some() {
                out.push(node.path.clone());
            }
            stack.extend(node.children.values());
        }
        out.sort();
        out
    }

    pub fn node(&self, path: &Path) -> Option<&WatchNode> {
        find(&self.root, path)
    }

    /// Attach a node for each of `paths`, then for every symlink met while
    /// doing so. The root's own path stands for a walk of its children.
    fn descend(&mut self, paths: Vec<PathBuf>, report: bool) -> Vec<PathBuf> {
        let Self {
            root,
            table,
            exclusions,
            guard,
        } = self;
        let mut descent = Descent {
            table,
            guard,
            exclusions,
            links: Vec::new(),
            found: report.then(Vec::new),
        };

        let mut queue = VecDeque::from(paths);
        while let Some(path) = queue.pop_front() {
            if path == root.path {
                descent.populate(root);
            } else {
                descent.attach(root, &path);
            }
            queue.extend(descent.links.drain(..));
        }
        descent.found.unwrap_or_default()
    }

    /// Give markers whose realpath was just released a second chance.
    fn revive(&mut self, freed: &[PathBuf]) {
        let mut markers = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if node.is_marker() && freed.contains(&node.realpath) {
                markers.push((node.link_target.is_some(), node.path.clone()));
            } else {
                stack.extend(node.children.values());
            }
        }
        if markers.is_empty() {
            return;
        }

        // real directories before aliases, then by name
        markers.sort();
        debug!(markers = markers.len(), "re-walking markers");
        self.descend(markers.into_iter().map(|(_, path)| path).collect(), false);
    }
}

impl Descent<'_> {
    /// Enumerate `node`'s children. Real directories are attached on the
    /// spot, symlinks are queued.
    fn populate(&mut self, node: &mut WatchNode) {
        let entries = WalkDir::new(&node.path)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    // raced with a delete, or unreadable
                    debug!(dir = %node.path.display(), error = %e, "skipping entry");
                    continue;
                }
            };
            if self.exclusions.is_excluded(entry.path()) {
                continue;
            }
            if let Some(found) = self.found.as_mut() {
                found.push(entry.path().to_path_buf());
            }

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                self.links.push(entry.path().to_path_buf());
            } else if file_type.is_dir() {
                if let Some(child) = self.make_node(entry.path()) {
                    node.children.insert(child.name.clone(), child);
                }
            }
        }
    }

    /// Hang the node for `path` under its parent, replacing a marker that
    /// may be sitting there.
    fn attach(&mut self, root: &mut WatchNode, path: &Path) {
        let (Some(parent_path), Some(name)) = (path.parent(), path.file_name()) else {
            return;
        };
        let Some(parent) = find_mut(root, parent_path) else {
            trace!(path = %path.display(), "parent no longer in tree");
            return;
        };
        if parent.is_marker() || parent.children.get(name).is_some_and(|c| !c.is_marker()) {
            return;
        }

        match self.make_node(path) {
            Some(child) => {
                parent.children.insert(child.name.clone(), child);
            }
            None => {
                parent.children.remove(name);
            }
        }
    }

    /// Build the node for `path`, or `None` if it is not a directory that
    /// can be watched.
    fn make_node(&mut self, path: &Path) -> Option<WatchNode> {
        if self.exclusions.is_excluded(path) {
            return None;
        }
        let name = path.file_name()?.to_os_string();
        let meta = fs::symlink_metadata(path).ok()?;
        let is_link = meta.file_type().is_symlink();
        if !is_link && !meta.is_dir() {
            return None;
        }

        // dangling links and vanished entries fall out here
        let realpath = fs::canonicalize(path).ok()?;
        if is_link && !realpath.is_dir() {
            return None;
        }
        let link_target = is_link.then(|| realpath.clone());

        if self.guard.contains(&realpath) {
            debug!(
                path = %path.display(),
                target = %realpath.display(),
                "already watched, leaving a marker"
            );
            return Some(WatchNode {
                path: path.to_path_buf(),
                name,
                handle: None,
                realpath,
                link_target,
                children: BTreeMap::new(),
            });
        }

        let handle = match self.table.register(path) {
            Ok(id) => id,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot watch, skipping subtree");
                return None;
            }
        };
        self.guard.insert(realpath.clone());

        let mut node = WatchNode {
            path: path.to_path_buf(),
            name,
            handle: Some(handle),
            realpath,
            link_target,
            children: BTreeMap::new(),
        };
        self.populate(&mut node);
        Some(node)
    }
}

/// Unregister a detached subtree. Returns the realpaths it gave up.
fn release(
    node: WatchNode,
    table: &mut DescriptorTable,
    guard: &mut HashSet<PathBuf>,
) -> Vec<PathBuf> {
    let mut freed = Vec::new();
    let mut stack = vec![node];
    while let Some(node) = stack.pop() {
        if let Some(id) = node.handle {
            table.unregister(id);
            guard.remove(&node.realpath);
            freed.push(node.realpath);
        }
        stack.extend(node.children.into_values());
    }
    freed
}

fn relative_names<'p>(root: &Path, path: &'p Path) -> Option<Vec<&'p std::ffi::OsStr>> {
    let rel = path.strip_prefix(root).ok()?;
    rel.components()
        .map(|c| match c {
            Component::Normal(name) => Some(name),
            _ => None,
        })
        .collect()
}

fn find<'t>(root: &'t WatchNode, path: &Path) -> Option<&'t WatchNode> {
    let mut node = root;
    for name in relative_names(&root.path, path)? {
        node = node.children.get(name)?;
    }
    Some(node)
}

fn find_mut<'t>(root: &'t mut WatchNode, path: &Path) -> Option<&'t mut WatchNode> {
    let names = relative_names(&root.path, path)?;
    let mut node = root;
    for name in names {
        node = node.children.get_mut(name)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::RecordingSource;
    use std::time::Instant;
    use tempfile::tempdir;

    fn canonical_tempdir() -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        (tmp, root)
    }

    fn build(root: &Path, source: &RecordingSource, patterns: &[&str]) -> Result<DirectoryTree> {
        let table = DescriptorTable::new(Box::new(source.clone()));
        let exclusions = PathExclusions::new(root, patterns).unwrap();
        DirectoryTree::build(root, table, exclusions)
    }

    #[test]
    fn initial_walk_watches_every_directory() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("d")).unwrap();
        fs::write(root.join("a/file.txt"), b"x").unwrap();

        let source = RecordingSource::new();
        let tree = build(&root, &source, &[]).unwrap();

        assert_eq!(tree.watched_count(), 5);
        assert_eq!(source.live(), 5);
        assert!(tree.is_watched(&root.join("a/b/c")));
        assert!(!tree.contains(&root.join("a/file.txt")));
        assert_eq!(
            tree.watched_paths(),
            vec![
                root.clone(),
                root.join("a"),
                root.join("a/b"),
                root.join("a/b/c"),
                root.join("d"),
            ]
        );
    }

    #[test]
    fn excluded_subtrees_are_not_watched() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::create_dir_all(root.join("src")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &["node_modules"]).unwrap();
        assert_eq!(tree.watched_count(), 2);
        assert!(!tree.contains(&root.join("node_modules")));

        fs::create_dir_all(root.join("src/node_modules")).unwrap();
        tree.on_added(&root.join("src/node_modules"));
        assert_eq!(tree.watched_count(), 2);
    }

    #[test]
    fn missing_root_fails_to_start() {
        let (_tmp, root) = canonical_tempdir();
        let err = build(&root.join("nope"), &RecordingSource::new(), &[]).err().unwrap();
        assert!(matches!(err, Error::Start(_)), "got: {err}");
    }

    #[test]
    fn refused_root_fails_to_start() {
        let (_tmp, root) = canonical_tempdir();
        let source = RecordingSource::new();
        source.refuse(&root);
        let err = build(&root, &source, &[]).err().unwrap();
        assert!(matches!(err, Error::Start(_)), "got: {err}");
    }

    #[test]
    fn refused_child_is_skipped_quietly() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("locked/inner")).unwrap();
        fs::create_dir_all(root.join("open")).unwrap();

        let source = RecordingSource::new();
        source.refuse(&root.join("locked"));
        let tree = build(&root, &source, &[]).unwrap();

        assert!(!tree.contains(&root.join("locked")));
        assert!(!tree.contains(&root.join("locked/inner")));
        assert!(tree.is_watched(&root.join("open")));
    }

    #[test]
    fn added_directory_is_walked() {
        let (_tmp, root) = canonical_tempdir();
        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();
        assert_eq!(tree.watched_count(), 1);

        fs::create_dir_all(root.join("x/y/z")).unwrap();
        fs::write(root.join("x/y/early.txt"), b"e").unwrap();
        let found = tree.apply(&PrimitiveEvent::new(
            PrimitiveKind::Added,
            root.join("x"),
            Instant::now(),
        ));
        assert_eq!(tree.watched_count(), 4);
        assert_eq!(
            found,
            vec![
                root.join("x/y"),
                root.join("x/y/early.txt"),
                root.join("x/y/z"),
            ]
        );

        // the nested creations arrive later and must not double-register
        assert!(tree.on_added(&root.join("x/y")).is_empty());
        assert!(tree.on_added(&root.join("x/y/z")).is_empty());
        assert_eq!(tree.watched_count(), 4);
        assert_eq!(source.ledger.lock().unwrap().opened_total, 4);
    }

    #[test]
    fn added_file_and_orphans_are_ignored() {
        let (_tmp, root) = canonical_tempdir();
        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        fs::write(root.join("plain.txt"), b"data").unwrap();
        assert!(tree.on_added(&root.join("plain.txt")).is_empty());
        tree.on_added(&root.join("not/yet/there"));
        tree.on_added(Path::new("/elsewhere/entirely"));
        assert_eq!(tree.watched_count(), 1);
    }

    #[test]
    fn removal_releases_whole_subtree() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("keep")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();
        assert_eq!(source.live(), 5);

        fs::remove_dir_all(root.join("a")).unwrap();
        assert!(tree.on_removed(&root.join("a")));
        assert_eq!(source.live(), 2);
        assert!(!tree.contains(&root.join("a/b")));

        // reported again by the directory's own watch
        assert!(!tree.on_removed(&root.join("a")));
        assert!(!tree.on_removed(&root));
        assert!(tree.is_watched(&root));
    }

    #[test]
    fn rename_moves_the_subtree() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("old/inner")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        fs::rename(root.join("old"), root.join("new")).unwrap();
        let now = Instant::now();
        tree.apply(&PrimitiveEvent::new(PrimitiveKind::RenamedFrom, root.join("old"), now));
        tree.apply(&PrimitiveEvent::new(PrimitiveKind::RenamedTo, root.join("new"), now));

        assert!(!tree.contains(&root.join("old")));
        assert!(tree.is_watched(&root.join("new/inner")));
        assert_eq!(source.live(), 3);
    }

    #[test]
    fn modified_changes_nothing() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir(root.join("a")).unwrap();
        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        tree.apply(&PrimitiveEvent::new(PrimitiveKind::Modified, root.join("a"), Instant::now()));
        assert_eq!(tree.watched_count(), 2);
    }

    #[test]
    fn teardown_releases_every_handle() {
        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("a/b")).unwrap();
        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        tree.teardown();
        assert_eq!(tree.watched_count(), 0);
        assert_eq!(source.live(), 0);
        tree.teardown();
        assert_eq!(source.ledger.lock().unwrap().closed_total, 3);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycle_becomes_a_marker() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("a/b")).unwrap();
        symlink(&root, root.join("a/b/back_to_root")).unwrap();
        symlink(root.join("a"), root.join("alias_of_a")).unwrap();

        let source = RecordingSource::new();
        let tree = build(&root, &source, &[]).unwrap();

        assert_eq!(tree.watched_count(), 3);
        let marker = tree.node(&root.join("a/b/back_to_root")).unwrap();
        assert!(marker.is_marker());
        assert_eq!(marker.link_target.as_deref(), Some(root.as_path()));
        assert!(marker.children.is_empty());
        assert!(tree.node(&root.join("alias_of_a")).unwrap().is_marker());
    }

    #[cfg(unix)]
    #[test]
    fn symlink_to_outside_directory_is_followed() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        let (_other, elsewhere) = canonical_tempdir();
        fs::create_dir(elsewhere.join("deep")).unwrap();
        symlink(&elsewhere, root.join("link")).unwrap();
        symlink(root.join("dangling-target"), root.join("dangling")).unwrap();

        let source = RecordingSource::new();
        let tree = build(&root, &source, &[]).unwrap();

        let link = tree.node(&root.join("link")).unwrap();
        assert!(!link.is_marker());
        assert_eq!(link.link_target.as_deref(), Some(elsewhere.as_path()));
        assert!(tree.is_watched(&root.join("link/deep")));
        assert!(!tree.contains(&root.join("dangling")));
    }

    #[cfg(unix)]
    #[test]
    fn removing_a_link_frees_its_realpath() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        let (_other, elsewhere) = canonical_tempdir();
        symlink(&elsewhere, root.join("first")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        fs::remove_file(root.join("first")).unwrap();
        tree.on_removed(&root.join("first"));
        symlink(&elsewhere, root.join("second")).unwrap();
        tree.on_added(&root.join("second"));

        assert!(tree.is_watched(&root.join("second")));
    }

    #[test]
    fn excluded_entries_are_not_reported() {
        let (_tmp, root) = canonical_tempdir();
        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &["*.swp", "target"]).unwrap();

        fs::create_dir_all(root.join("pkg/target/debug")).unwrap();
        fs::write(root.join("pkg/.lib.rs.swp"), b"").unwrap();
        fs::write(root.join("pkg/lib.rs"), b"").unwrap();

        let found = tree.on_added(&root.join("pkg"));
        assert_eq!(found, vec![root.join("pkg/lib.rs")]);
        assert_eq!(tree.watched_count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn alias_sorting_first_leaves_the_real_directory_watched() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        fs::create_dir_all(root.join("b_real/inner")).unwrap();
        fs::create_dir_all(root.join("a/deeper")).unwrap();
        fs::create_dir_all(root.join("z")).unwrap();
        symlink(root.join("b_real"), root.join("a_alias")).unwrap();
        symlink(root.join("z"), root.join("a/deeper/to_z")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();

        assert!(tree.is_watched(&root.join("b_real")));
        assert!(tree.is_watched(&root.join("b_real/inner")));
        assert!(tree.is_watched(&root.join("z")));
        assert!(tree.node(&root.join("a_alias")).unwrap().is_marker());
        assert!(tree.node(&root.join("a/deeper/to_z")).unwrap().is_marker());
        assert!(!tree.contains(&root.join("a_alias/inner")));

        // dropping the alias leaves its target alone
        fs::remove_file(root.join("a_alias")).unwrap();
        assert!(tree.on_removed(&root.join("a_alias")));
        assert!(tree.is_watched(&root.join("b_real")));
        assert!(tree.is_watched(&root.join("b_real/inner")));
        assert_eq!(tree.watched_count(), 6);
    }

    #[cfg(unix)]
    #[test]
    fn released_realpath_revives_its_marker() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        let (_other, elsewhere) = canonical_tempdir();
        fs::create_dir(elsewhere.join("sub")).unwrap();
        symlink(&elsewhere, root.join("first")).unwrap();
        symlink(&elsewhere, root.join("second")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();
        assert!(tree.is_watched(&root.join("first/sub")));
        assert!(tree.node(&root.join("second")).unwrap().is_marker());
        assert_eq!(tree.watched_count(), 3);

        fs::remove_file(root.join("first")).unwrap();
        assert!(tree.on_removed(&root.join("first")));

        assert!(tree.is_watched(&root.join("second")));
        assert!(tree.is_watched(&root.join("second/sub")));
        assert_eq!(tree.watched_count(), 3);
        assert_eq!(
            tree.watched_paths(),
            vec![root.clone(), root.join("second"), root.join("second/sub")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn marker_of_a_deleted_target_is_dropped() {
        use std::os::unix::fs::symlink;

        let (_tmp, root) = canonical_tempdir();
        fs::create_dir(root.join("target")).unwrap();
        symlink(root.join("target"), root.join("alias")).unwrap();

        let source = RecordingSource::new();
        let mut tree = build(&root, &source, &[]).unwrap();
        assert!(tree.node(&root.join("alias")).unwrap().is_marker());

        fs::remove_dir(root.join("target")).unwrap();
        assert!(tree.on_removed(&root.join("target")));

        assert!(!tree.contains(&root.join("alias")));
        assert_eq!(tree.watched_paths(), vec![root.clone()]);
        assert_eq!(source.live(), 1);
    }
}
