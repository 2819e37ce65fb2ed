/// A registered top-level mirrored directory and its reconciliation engine.
///
/// `RootNode::sync` diffs a [`PathElement`] snapshot against the mirrored
/// subtree and applies the minimal set of insertions, removals and time
/// updates, publishing one [`Update`] per affected node. No state survives
/// between calls: every call is a function of (mirror, snapshot).
///
/// # Event ordering
///
/// - Removals are computed from the children present *before* the pass, so
///   additions in the same pass never influence what gets pruned.
/// - Recursive removal reports descendants before their parent, so a
///   consumer mirroring the tree can always delete bottom-up.
/// - Pruning and kind-swap removals carry the initiator of the `sync` call
///   that caused them.
use super::node::NodeIndex;
use super::path::{file_name, normalize};
use super::snapshot::PathElement;
use super::tree::{MirrorTree, ROOT};
use super::update::{Update, UpdateKind};
use crate::error::SyncError;
use crate::events::Reporter;
use std::collections::{HashMap, HashSet};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// One mirrored filesystem subtree.
#[derive(Debug)]
pub struct RootNode<I> {
    path: PathBuf,
    tree: MirrorTree,
    reporter: Reporter<I>,
}

impl<I: Clone> RootNode<I> {
    /// Create an empty mirror of the directory at `path`.
    pub fn new(path: PathBuf, reporter: Reporter<I>) -> Self {
        let path = normalize(&path);
        let tree = MirrorTree::new(file_name(&path));
        Self {
            path,
            tree,
            reporter,
        }
    }

    /// Absolute path of the mirrored directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &MirrorTree {
        &self.tree
    }

    /// Resolve an absolute path to a node of this root. `.` and `..` are
    /// collapsed first, so `root/a/..` names the root itself.
    pub fn resolve(&self, path: &Path) -> Option<NodeIndex> {
        let path = normalize(path);
        let relative = path.strip_prefix(&self.path).ok()?;
        self.tree.resolve(ROOT, relative)
    }

    /// Absolute path of a node.
    pub fn absolute_path(&self, index: NodeIndex) -> PathBuf {
        if index == ROOT {
            return self.path.clone();
        }
        self.path.join(self.tree.relative_path(index))
    }

    /// Reconcile the mirror with `desired`, which may describe the root
    /// itself or any path below it.
    pub fn sync(&mut self, desired: &PathElement, initiator: &I) {
        let path = normalize(&desired.path);
        let segments: Vec<OsString> = match path.strip_prefix(&self.path) {
            Ok(relative) => relative
                .components()
                .filter_map(|component| match component {
                    Component::Normal(segment) => Some(segment.to_os_string()),
                    _ => None,
                })
                .collect(),
            Err(_) => {
                self.report(SyncError::OutsideRoot {
                    root: self.path.clone(),
                    path: desired.path.clone(),
                });
                return;
            }
        };

        let Some((name, parents)) = segments.split_last() else {
            if desired.is_directory {
                self.sync_content(ROOT, desired, initiator);
            } else {
                self.report(SyncError::ReplaceRootWithFile {
                    root: self.path.clone(),
                });
            }
            return;
        };

        let parent = parents
            .iter()
            .try_fold(ROOT, |current, segment| self.tree.child_named(current, segment));
        match parent {
            Some(parent) if self.tree.node(parent).is_dir() => {
                let existing = self.tree.child_named(parent, name);
                self.sync_child(parent, name, existing, desired, initiator);
            }
            _ => self.report(SyncError::MissingParent {
                path: desired.path.clone(),
            }),
        }
    }

    fn sync_child(
        &mut self,
        parent: NodeIndex,
        name: &OsStr,
        mut existing: Option<NodeIndex>,
        desired: &PathElement,
        initiator: &I,
    ) {
        if let Some(child) = existing {
            if self.tree.node(child).is_dir() != desired.is_directory {
                self.remove_node(child, initiator);
                existing = None;
            }
        }

        match existing {
            None if desired.is_directory => {
                let child = self.tree.insert_directory(parent, name);
                self.emit(UpdateKind::Creation, child, initiator);
                self.sync_content(child, desired, initiator);
            }
            None => {
                let child = self.tree.insert_file(parent, name, desired.last_modified);
                self.emit(UpdateKind::Creation, child, initiator);
            }
            Some(child) if desired.is_directory => {
                self.sync_content(child, desired, initiator);
            }
            Some(child) => {
                if self.tree.update_modification_time(child, desired.last_modified) {
                    self.emit(UpdateKind::Modification, child, initiator);
                }
            }
        }
    }

    /// Reconcile the children of `dir` with `desired.children`.
    ///
    /// Existing children are indexed by name once per directory, so a flat
    /// directory costs one pass rather than one lookup walk per entry.
    fn sync_content(&mut self, dir: NodeIndex, desired: &PathElement, initiator: &I) {
        let dir_path = self.absolute_path(dir);
        // Desired children that are direct children of `dir`, by name.
        // Anything else is routed through `sync` and reported there.
        let mut direct: Vec<Option<OsString>> = Vec::with_capacity(desired.children.len());
        let mut wanted: HashSet<OsString> = HashSet::with_capacity(desired.children.len());
        for child in &desired.children {
            let path = normalize(&child.path);
            let name = match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) if parent == dir_path.as_path() => Some(name.to_os_string()),
                _ => None,
            };
            if let Some(name) = &name {
                wanted.insert(name.clone());
            }
            direct.push(name);
        }

        let stale: Vec<NodeIndex> = self
            .tree
            .children(dir)
            .iter()
            .copied()
            .filter(|&child| !wanted.contains(self.tree.node(child).os_name()))
            .collect();
        for child in stale {
            self.remove_node(child, initiator);
        }

        let existing: HashMap<OsString, NodeIndex> = self
            .tree
            .children(dir)
            .iter()
            .map(|&child| (self.tree.node(child).os_name().to_os_string(), child))
            .collect();
        for (child, name) in desired.children.iter().zip(direct) {
            match name {
                Some(name) => {
                    // An earlier entry of this pass may have replaced the
                    // indexed node; fall back to a fresh lookup then.
                    let known = existing
                        .get(&name)
                        .copied()
                        .filter(|&index| {
                            self.tree
                                .get(index)
                                .is_some_and(|node| node.parent == Some(dir) && node.os_name() == name.as_os_str())
                        })
                        .or_else(|| self.tree.child_named(dir, &name));
                    self.sync_child(dir, &name, known, child, initiator);
                }
                None => self.sync(child, initiator),
            }
        }
    }

    /// Remove `index` and its whole subtree, reporting a DELETION for every
    /// descendant before the node itself. The root is never removed: passing
    /// it prunes every descendant and leaves the root registered.
    fn remove_node(&mut self, index: NodeIndex, initiator: &I) {
        for node in self.tree.post_order(index) {
            if node != ROOT {
                self.emit(UpdateKind::Deletion, node, initiator);
            }
        }
        self.tree.detach(index);
    }

    /// Mirror a single new directory at `path` without populating it.
    ///
    /// No-op when `path` already resolves to a directory.
    pub fn add_directory(&mut self, path: &Path, initiator: &I) {
        if let Some(index) = self.resolve(path) {
            if self.tree.node(index).is_dir() {
                return;
            }
        }
        self.sync(&PathElement::directory(path, Vec::new()), initiator);
    }

    /// Mirror a file at `path` stamped `time`, or advance its modification
    /// time when it is already mirrored as a file.
    pub fn update_modification_time(&mut self, path: &Path, time: SystemTime, initiator: &I) {
        match self.resolve(path) {
            Some(index) if !self.tree.node(index).is_dir() => {
                if self.tree.update_modification_time(index, time) {
                    self.emit(UpdateKind::Modification, index, initiator);
                }
            }
            _ => self.sync(&PathElement::file(path, time), initiator),
        }
    }

    /// Remove the node at `path` and its subtree. Returns `false` when
    /// nothing is mirrored there.
    pub fn delete(&mut self, path: &Path, initiator: &I) -> bool {
        match self.resolve(path) {
            Some(index) => {
                self.remove_node(index, initiator);
                true
            }
            None => false,
        }
    }

    /// Export the mirrored subtree at `index` as a snapshot.
    pub fn snapshot(&self, index: NodeIndex) -> PathElement {
        let node = self.tree.node(index);
        let path = self.absolute_path(index);
        match node.last_modified() {
            Some(time) => PathElement::file(path, time),
            None => PathElement::directory(
                path,
                node.children()
                    .iter()
                    .map(|&child| self.snapshot(child))
                    .collect(),
            ),
        }
    }

    fn emit(&self, kind: UpdateKind, index: NodeIndex, initiator: &I) {
        let relative = self.tree.relative_path(index);
        debug!(?kind, root = %self.path.display(), path = %relative.display(), "mirror update");
        let update = Update::new(kind, &self.path, relative, initiator.clone());
        match kind {
            UpdateKind::Creation => self.reporter.creations.publish(update.clone()),
            UpdateKind::Deletion => self.reporter.deletions.publish(update.clone()),
            UpdateKind::Modification => self.reporter.modifications.publish(update.clone()),
        }
        self.reporter.updates.publish(update);
    }

    fn report(&self, error: SyncError) {
        warn!("{error}");
        self.reporter.errors.publish(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use std::time::{Duration, UNIX_EPOCH};

    // ── Helpers ──────────────────────────────────────────────────────────────

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    /// One subscriber on every channel of a reporter.
    struct Recorder {
        updates: Receiver<Update<&'static str>>,
        creations: Receiver<Update<&'static str>>,
        deletions: Receiver<Update<&'static str>>,
        modifications: Receiver<Update<&'static str>>,
        errors: Receiver<SyncError>,
    }

    impl Recorder {
        fn new(reporter: &Reporter<&'static str>) -> Self {
            Self {
                updates: reporter.updates.subscribe(),
                creations: reporter.creations.subscribe(),
                deletions: reporter.deletions.subscribe(),
                modifications: reporter.modifications.subscribe(),
                errors: reporter.errors.subscribe(),
            }
        }

        fn take(rx: &Receiver<Update<&'static str>>) -> Vec<String> {
            rx.try_iter()
                .map(|u| u.relative_path.to_string_lossy().replace('\\', "/"))
                .collect()
        }

        fn creations(&self) -> Vec<String> {
            Self::take(&self.creations)
        }

        fn deletions(&self) -> Vec<String> {
            Self::take(&self.deletions)
        }

        fn modifications(&self) -> Vec<String> {
            Self::take(&self.modifications)
        }

        fn errors(&self) -> Vec<SyncError> {
            self.errors.try_iter().collect()
        }

        fn is_quiet(&self) -> bool {
            self.updates.is_empty()
                && self.creations.is_empty()
                && self.deletions.is_empty()
                && self.modifications.is_empty()
                && self.errors.is_empty()
        }
    }

    fn names(root: &RootNode<&'static str>, path: &str) -> Vec<String> {
        let index = root.resolve(Path::new(path)).unwrap();
        root.tree()
            .children(index)
            .iter()
            .map(|&c| root.tree().node(c).name.to_string())
            .collect()
    }

    /// `/tmp/root` holding `a/`, `a/f.txt` and `b.txt`.
    fn initial_snapshot() -> PathElement {
        PathElement::directory(
            "/tmp/root",
            vec![
                PathElement::directory("/tmp/root/a", vec![PathElement::file("/tmp/root/a/f.txt", at(1))]),
                PathElement::file("/tmp/root/b.txt", at(1)),
            ],
        )
    }

    fn seeded() -> (RootNode<&'static str>, Recorder) {
        let reporter = Reporter::default();
        let mut root = RootNode::new(PathBuf::from("/tmp/root"), reporter.clone());
        root.sync(&initial_snapshot(), &"scan");
        (root, Recorder::new(&reporter))
    }

    // ── Reconciliation ──────────────────────────────────────────────────────

    #[test]
    fn test_initial_sync_creates_everything_parent_first() {
        let reporter = Reporter::default();
        let recorder = Recorder::new(&reporter);
        let mut root = RootNode::new(PathBuf::from("/tmp/root"), reporter);

        root.sync(&initial_snapshot(), &"scan");

        assert_eq!(recorder.creations(), ["a", "a/f.txt", "b.txt"]);
        assert!(recorder.deletions().is_empty());
        assert_eq!(root.tree().len(), 4);
    }

    #[test]
    fn test_resync_with_same_snapshot_is_silent() {
        let (mut root, recorder) = seeded();
        root.sync(&initial_snapshot(), &"scan");
        assert!(recorder.is_quiet());
    }

    #[test]
    fn test_resync_with_unnormalized_paths_is_silent() {
        let (mut root, recorder) = seeded();
        let same = PathElement::directory(
            "/tmp/root/./",
            vec![
                PathElement::directory("/tmp/root/b.txt/../a/", vec![PathElement::file("/tmp/root/a/./f.txt", at(1))]),
                PathElement::file("/tmp/root/a/../b.txt", at(1)),
            ],
        );

        root.sync(&same, &"scan");
        assert!(recorder.is_quiet());
        assert_eq!(names(&root, "/tmp/root"), ["a", "b.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_resync_with_non_utf8_name_is_silent() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = OsStr::from_bytes(b"\xffbad.txt");
        let snapshot = PathElement::directory(
            "/tmp/root",
            vec![PathElement::file(Path::new("/tmp/root").join(raw), at(1))],
        );
        let reporter = Reporter::default();
        let mut root = RootNode::new(PathBuf::from("/tmp/root"), reporter.clone());
        let updates = reporter.updates.subscribe();

        root.sync(&snapshot, &"scan");
        let created: Vec<Update<&str>> = updates.try_iter().collect();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].relative_path.as_os_str(), raw, "update path must keep raw bytes");

        root.sync(&snapshot, &"scan");
        assert!(updates.try_recv().is_err(), "second pass must not churn");
        assert!(root.resolve(&Path::new("/tmp/root").join(raw)).is_some());
        assert_eq!(root.snapshot(ROOT), snapshot);
    }

    #[test]
    fn test_large_flat_directory_keeps_order() {
        let reporter = Reporter::default();
        let mut root = RootNode::new(PathBuf::from("/tmp/root"), reporter.clone());
        let files: Vec<PathElement> = (0..2_000)
            .rev()
            .map(|i| PathElement::file(format!("/tmp/root/f{i:05}.txt"), at(1)))
            .collect();
        let mut snapshot = PathElement::directory("/tmp/root", files);

        root.sync(&snapshot, &"scan");
        let creations = reporter.creations.subscribe();
        root.sync(&snapshot, &"scan");
        assert!(creations.try_recv().is_err());

        snapshot.sort_mirror_order();
        assert_eq!(root.snapshot(ROOT), snapshot);
    }

    #[test]
    fn test_resync_prunes_then_adds() {
        let (mut root, recorder) = seeded();
        let next = PathElement::directory(
            "/tmp/root",
            vec![
                PathElement::directory("/tmp/root/a", vec![]),
                PathElement::file("/tmp/root/b.txt", at(1)),
                PathElement::file("/tmp/root/c.txt", at(2)),
            ],
        );

        root.sync(&next, &"scan");

        let ordered: Vec<(UpdateKind, String)> = recorder
            .updates
            .try_iter()
            .map(|u| (u.kind, u.relative_path.to_string_lossy().replace('\\', "/")))
            .collect();
        assert_eq!(
            ordered,
            [
                (UpdateKind::Deletion, "a/f.txt".to_string()),
                (UpdateKind::Creation, "c.txt".to_string()),
            ]
        );
        assert_eq!(recorder.deletions(), ["a/f.txt"]);
        assert_eq!(recorder.creations(), ["c.txt"]);
        assert!(recorder.modifications().is_empty());
        assert_eq!(names(&root, "/tmp/root"), ["a", "b.txt", "c.txt"]);
    }

    #[test]
    fn test_newer_file_time_emits_single_modification() {
        let (mut root, recorder) = seeded();
        let mut next = initial_snapshot();
        next.children[1].last_modified = at(5);

        root.sync(&next, &"scan");
        assert_eq!(recorder.modifications(), ["b.txt"]);

        // Older time than stored: ignored.
        next.children[1].last_modified = at(3);
        root.sync(&next, &"scan");
        assert!(recorder.is_quiet());
    }

    #[test]
    fn test_kind_swap_replaces_node() {
        let (mut root, recorder) = seeded();
        let next = PathElement::directory(
            "/tmp/root",
            vec![
                PathElement::file("/tmp/root/a", at(9)),
                PathElement::file("/tmp/root/b.txt", at(1)),
            ],
        );

        root.sync(&next, &"swap");

        assert_eq!(recorder.deletions(), ["a/f.txt", "a"]);
        assert_eq!(recorder.creations(), ["a"]);
        assert_eq!(names(&root, "/tmp/root"), ["a", "b.txt"]);
        let a = root.resolve(Path::new("/tmp/root/a")).unwrap();
        assert!(!root.tree().node(a).is_dir());
    }

    #[test]
    fn test_pruning_carries_sync_initiator() {
        let reporter = Reporter::default();
        let mut root = RootNode::new(PathBuf::from("/tmp/root"), reporter.clone());
        root.sync(&initial_snapshot(), &"first");
        let deletions = reporter.deletions.subscribe();

        root.sync(&PathElement::directory("/tmp/root", vec![]), &"second");

        let initiators: Vec<&str> = deletions.try_iter().map(|u| u.initiator).collect();
        assert_eq!(initiators, ["second", "second", "second"]);
    }

    #[test]
    fn test_sync_of_nested_element_only_touches_that_branch() {
        let (mut root, recorder) = seeded();
        root.sync(
            &PathElement::directory("/tmp/root/a", vec![PathElement::file("/tmp/root/a/g.txt", at(1))]),
            &"scan",
        );

        assert_eq!(recorder.deletions(), ["a/f.txt"]);
        assert_eq!(recorder.creations(), ["a/g.txt"]);
        assert_eq!(names(&root, "/tmp/root"), ["a", "b.txt"]);
    }

    #[test]
    fn test_missing_parent_reports_error_without_mutation() {
        let (mut root, recorder) = seeded();
        root.sync(&PathElement::file("/tmp/root/nope/x.txt", at(1)), &"scan");

        assert_eq!(
            recorder.errors(),
            [SyncError::MissingParent {
                path: PathBuf::from("/tmp/root/nope/x.txt")
            }]
        );
        assert!(recorder.is_quiet());
        assert_eq!(root.tree().len(), 4);
    }

    #[test]
    fn test_file_under_file_reports_missing_parent() {
        let (mut root, recorder) = seeded();
        root.sync(&PathElement::file("/tmp/root/b.txt/x", at(1)), &"scan");
        assert!(matches!(recorder.errors()[..], [SyncError::MissingParent { .. }]));
    }

    #[test]
    fn test_replacing_root_with_file_is_rejected() {
        let (mut root, recorder) = seeded();
        root.sync(&PathElement::file("/tmp/root", at(1)), &"scan");

        assert_eq!(
            recorder.errors(),
            [SyncError::ReplaceRootWithFile {
                root: PathBuf::from("/tmp/root")
            }]
        );
        assert_eq!(root.tree().len(), 4);
    }

    #[test]
    fn test_outside_root_is_rejected() {
        let (mut root, recorder) = seeded();
        root.sync(&PathElement::file("/elsewhere/x", at(1)), &"scan");
        assert!(matches!(recorder.errors()[..], [SyncError::OutsideRoot { .. }]));
    }

    // ── Single-node operations ──────────────────────────────────────────────

    #[test]
    fn test_add_directory_creates_one_node() {
        let (mut root, recorder) = seeded();
        root.add_directory(Path::new("/tmp/root/newdir"), &"user");
        root.add_directory(Path::new("/tmp/root/newdir"), &"user");

        assert_eq!(recorder.creations(), ["newdir"]);
        assert!(root.resolve(Path::new("/tmp/root/newdir")).is_some());
        assert_eq!(names(&root, "/tmp/root"), ["a", "newdir", "b.txt"]);
    }

    #[test]
    fn test_update_modification_time_creates_or_advances() {
        let (mut root, recorder) = seeded();
        root.update_modification_time(Path::new("/tmp/root/new.txt"), at(1), &"user");
        assert_eq!(recorder.creations(), ["new.txt"]);

        root.update_modification_time(Path::new("/tmp/root/new.txt"), at(1), &"user");
        assert!(recorder.is_quiet());

        root.update_modification_time(Path::new("/tmp/root/new.txt"), at(2), &"user");
        assert_eq!(recorder.modifications(), ["new.txt"]);
    }

    #[test]
    fn test_delete_reports_children_before_parent() {
        let (mut root, recorder) = seeded();
        assert!(root.delete(Path::new("/tmp/root/a"), &"user"));

        let deleted: Vec<Update<&str>> = recorder.deletions.try_iter().collect();
        let paths: Vec<String> = deleted
            .iter()
            .map(|u| u.relative_path.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(paths, ["a/f.txt", "a"]);
        assert!(deleted.iter().all(|u| u.initiator == "user"));
        assert!(!root.delete(Path::new("/tmp/root/a"), &"user"));
    }

    #[test]
    fn test_delete_root_prunes_contents_only() {
        let (mut root, recorder) = seeded();
        assert!(root.delete(Path::new("/tmp/root"), &"user"));

        assert_eq!(recorder.deletions(), ["a/f.txt", "a", "b.txt"]);
        assert!(root.tree().is_empty());
        assert!(root.resolve(Path::new("/tmp/root")).is_some());
    }

    #[test]
    fn test_snapshot_round_trips_mirror_state() {
        let (root, _recorder) = seeded();
        assert_eq!(root.snapshot(ROOT), initial_snapshot());
    }
}
