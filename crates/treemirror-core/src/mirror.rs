/// The mirror: an ordered forest of mirrored roots.
///
/// Every path-addressed operation is routed to the roots whose path is a
/// prefix of the target (its "top-level ancestors"). Roots may not overlap,
/// so in practice that is zero or one root.
///
/// Paths are normalized lexically before routing: `.` is dropped and `..`
/// pops the preceding segment, so `root/a/..` addresses the root itself.
///
/// `Mirror` is not internally synchronized. Share it through
/// [`SharedMirror`] and serialize writers (the I/O façade does both).
use crate::error::{MirrorError, SyncError};
use crate::events::Reporter;
use crate::model::path::normalize;
use crate::model::{PathElement, RootNode, Update};
use compact_str::CompactString;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// A mirror shared between the caller and watcher callbacks.
pub type SharedMirror<I> = Arc<Mutex<Mirror<I>>>;

/// One direct child of a mirrored directory, as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorEntry {
    pub name: CompactString,
    pub is_directory: bool,
    /// `None` for directories.
    pub last_modified: Option<SystemTime>,
}

/// In-memory mirror of one or more directory trees.
#[derive(Debug)]
pub struct Mirror<I> {
    roots: Vec<RootNode<I>>,
    reporter: Reporter<I>,
}

impl<I: Clone> Default for Mirror<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Clone> Mirror<I> {
    pub fn new() -> Self {
        Self {
            roots: Vec::new(),
            reporter: Reporter::default(),
        }
    }

    /// Wrap a fresh mirror for sharing with the I/O façade.
    pub fn shared() -> SharedMirror<I> {
        Arc::new(Mutex::new(Self::new()))
    }

    // ── Channels ───────────────────────────────────────────

    pub fn subscribe_creations(&self) -> Receiver<Update<I>> {
        self.reporter.creations.subscribe()
    }

    pub fn subscribe_deletions(&self) -> Receiver<Update<I>> {
        self.reporter.deletions.subscribe()
    }

    pub fn subscribe_modifications(&self) -> Receiver<Update<I>> {
        self.reporter.modifications.subscribe()
    }

    /// Every update of any kind, in emission order.
    pub fn subscribe_updates(&self) -> Receiver<Update<I>> {
        self.reporter.updates.subscribe()
    }

    /// Reconciliation desync errors.
    pub fn subscribe_errors(&self) -> Receiver<SyncError> {
        self.reporter.errors.subscribe()
    }

    // ── Roots ──────────────────────────────────────────────

    /// Register `path` as a mirrored root. The root starts empty; push a
    /// snapshot through [`Mirror::sync`] to populate it.
    pub fn add_top_level_directory(&mut self, path: impl Into<PathBuf>) -> Result<(), MirrorError> {
        let path = normalize(&path.into());
        if !path.is_absolute() {
            return Err(MirrorError::RelativeRoot(path));
        }
        if let Some(existing) = self
            .roots
            .iter()
            .find(|root| path.starts_with(root.path()) || root.path().starts_with(&path))
        {
            return Err(MirrorError::OverlappingRoot {
                path,
                existing: existing.path().to_path_buf(),
            });
        }

        info!("Mirroring {}", path.display());
        self.roots.push(RootNode::new(path, self.reporter.clone()));
        Ok(())
    }

    /// Registered root paths in registration order.
    pub fn roots(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|root| root.path().to_path_buf()).collect()
    }

    fn top_level_ancestors<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a RootNode<I>> {
        self.roots.iter().filter(move |root| path.starts_with(root.path()))
    }

    fn top_level_ancestors_mut<'a>(
        &'a mut self,
        path: &'a Path,
    ) -> impl Iterator<Item = &'a mut RootNode<I>> {
        self.roots.iter_mut().filter(move |root| path.starts_with(root.path()))
    }

    // ── Queries ────────────────────────────────────────────

    /// `true` iff some root mirrors `path` and actually holds a node there.
    pub fn contains(&self, path: &Path) -> bool {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path)
            .any(|root| root.resolve(&path).is_some());
        found
    }

    /// `true` iff `path` falls inside some root's namespace, mirrored or not.
    pub fn contains_prefix_of(&self, path: &Path) -> bool {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path).next().is_some();
        found
    }

    /// `Some(true)` for a mirrored directory, `Some(false)` for a file.
    pub fn is_directory(&self, path: &Path) -> Option<bool> {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path).find_map(|root| {
            root.resolve(&path)
                .map(|index| root.tree().node(index).is_dir())
        });
        found
    }

    /// Stored modification time of a mirrored file.
    pub fn last_modified(&self, path: &Path) -> Option<SystemTime> {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path).find_map(|root| {
            root.resolve(&path)
                .and_then(|index| root.tree().node(index).last_modified())
        });
        found
    }

    /// Direct children of a mirrored directory, in mirror order.
    pub fn children(&self, path: &Path) -> Option<Vec<MirrorEntry>> {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path).find_map(|root| {
            let index = root.resolve(&path)?;
            let tree = root.tree();
            if !tree.node(index).is_dir() {
                return None;
            }
            Some(
                tree.children(index)
                    .iter()
                    .map(|&child| {
                        let node = tree.node(child);
                        MirrorEntry {
                            name: node.name.clone(),
                            is_directory: node.is_dir(),
                            last_modified: node.last_modified(),
                        }
                    })
                    .collect(),
            )
        });
        found
    }

    /// Export the mirrored subtree at `path` as a snapshot.
    pub fn snapshot(&self, path: &Path) -> Option<PathElement> {
        let path = normalize(path);
        let found = self.top_level_ancestors(&path)
            .find_map(|root| root.resolve(&path).map(|index| root.snapshot(index)));
        found
    }

    /// Number of mirrored nodes across all roots, roots included.
    pub fn len(&self) -> usize {
        self.roots.iter().map(|root| root.tree().len()).sum()
    }

    /// Returns `true` if no root is registered.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    // ── Mutations ──────────────────────────────────────────

    /// Reconcile the mirror with a snapshot of any mirrored path.
    pub fn sync(&mut self, snapshot: &PathElement, initiator: &I) {
        let path = normalize(&snapshot.path);
        let mut routed = false;
        for root in self.top_level_ancestors_mut(&path) {
            root.sync(snapshot, initiator);
            routed = true;
        }
        if !routed {
            debug!("Ignoring snapshot of unmirrored {}", path.display());
        }
    }

    /// Mirror one new, unpopulated directory.
    pub fn add_directory(&mut self, path: &Path, initiator: &I) {
        let path = normalize(path);
        for root in self.top_level_ancestors_mut(&path) {
            root.add_directory(&path, initiator);
        }
    }

    /// Mirror `path` and every missing ancestor below its root, shallowest
    /// first, as produced by a recursive directory creation.
    pub fn add_directories(&mut self, path: &Path, initiator: &I) {
        let path = normalize(path);
        for root in self.top_level_ancestors_mut(&path) {
            let Ok(relative) = path.strip_prefix(root.path()) else {
                continue;
            };
            let mut current = root.path().to_path_buf();
            for component in relative.components() {
                current.push(component);
                root.add_directory(&current, initiator);
            }
        }
    }

    /// Mirror a file, or advance the stored time of an existing one.
    pub fn add_file(&mut self, path: &Path, last_modified: SystemTime, initiator: &I) {
        self.update_modification_time(path, last_modified, initiator);
    }

    /// Advance the stored time of a mirrored file, mirroring it first if it
    /// is absent (or currently a directory).
    pub fn update_modification_time(&mut self, path: &Path, last_modified: SystemTime, initiator: &I) {
        let path = normalize(path);
        for root in self.top_level_ancestors_mut(&path) {
            root.update_modification_time(&path, last_modified, initiator);
        }
    }

    /// Remove the node at `path` and its subtree, reporting every removal
    /// with `initiator`. Returns `true` if something was removed.
    pub fn delete(&mut self, path: &Path, initiator: &I) -> bool {
        let path = normalize(path);
        let mut removed = false;
        for root in self.top_level_ancestors_mut(&path) {
            removed |= root.delete(&path, initiator);
        }
        removed
    }
}
