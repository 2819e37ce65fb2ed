/// Arena-backed mirror tree for one mirrored root.
///
/// All nodes live in a single slot vector. Relationships between nodes use
/// `NodeIndex` rather than heap pointers. Removed subtrees free their slots
/// onto a free list so long-running mirrors with churn do not grow without
/// bound.
use super::node::{compare_names, MirrorNode, NodeIndex, NodeKind};
use std::cmp::Ordering;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Index of the root directory in every `MirrorTree`.
pub const ROOT: NodeIndex = NodeIndex(0);

/// The node arena of a single mirrored subtree. Slot 0 is always the root.
#[derive(Debug, Clone)]
pub struct MirrorTree {
    slots: Vec<Option<MirrorNode>>,
    free: Vec<NodeIndex>,
    live: usize,
}

impl MirrorTree {
    /// Create a tree holding only an empty root directory named `root_name`.
    pub fn new(root_name: &OsStr) -> Self {
        Self {
            slots: vec![Some(MirrorNode::new_dir(root_name, None))],
            free: Vec::new(),
            live: 1,
        }
    }

    /// Get the node at the given index.
    ///
    /// Panics on a freed slot; indices handed out by this tree are only
    /// stale after the caller removed that subtree.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &MirrorNode {
        self.slots[index.idx()]
            .as_ref()
            .expect("stale NodeIndex: slot was freed")
    }

    /// The node at `index`, or `None` if the slot has been freed.
    #[inline]
    pub fn get(&self, index: NodeIndex) -> Option<&MirrorNode> {
        self.slots.get(index.idx()).and_then(Option::as_ref)
    }

    #[inline]
    fn node_mut(&mut self, index: NodeIndex) -> &mut MirrorNode {
        self.slots[index.idx()]
            .as_mut()
            .expect("stale NodeIndex: slot was freed")
    }

    /// Children of `parent` in mirror order.
    #[inline]
    pub fn children(&self, parent: NodeIndex) -> &[NodeIndex] {
        self.node(parent).children()
    }

    /// Number of live nodes, the root included.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns `true` if the root has no children.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.children(ROOT).is_empty()
    }

    /// Find the direct child of `parent` named exactly `name`.
    pub fn child_named(&self, parent: NodeIndex, name: &OsStr) -> Option<NodeIndex> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&child| self.node(child).os_name() == name)
    }

    /// Descend from `from` one segment at a time.
    ///
    /// An empty path resolves to `from` itself. Returns `None` as soon as a
    /// segment is missing, and for any `..`, root or prefix component:
    /// callers normalize first, so those never name a node of this tree.
    pub fn resolve(&self, from: NodeIndex, relative: &Path) -> Option<NodeIndex> {
        let mut current = from;
        for component in relative.components() {
            match component {
                Component::Normal(segment) => current = self.child_named(current, segment)?,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(current)
    }

    /// Insert an empty directory under `parent`, keeping mirror order.
    ///
    /// Lands before the first file or the first directory whose name
    /// compares greater than `name`.
    pub fn insert_directory(&mut self, parent: NodeIndex, name: &OsStr) -> NodeIndex {
        let node = MirrorNode::new_dir(name, Some(parent));
        // Children are sorted, so the insertion point is a partition point.
        let position = self.children(parent).partition_point(|&child| {
            let sibling = self.node(child);
            sibling.is_dir() && compare_names(&sibling.name, &node.name) != Ordering::Greater
        });
        self.attach(parent, position, node)
    }

    /// Insert a file under `parent`, keeping mirror order.
    ///
    /// Lands before the first file whose name compares greater than `name`;
    /// never before a directory.
    pub fn insert_file(&mut self, parent: NodeIndex, name: &OsStr, last_modified: SystemTime) -> NodeIndex {
        let node = MirrorNode::new_file(name, last_modified, Some(parent));
        let position = self.children(parent).partition_point(|&child| {
            let sibling = self.node(child);
            sibling.is_dir() || compare_names(&sibling.name, &node.name) != Ordering::Greater
        });
        self.attach(parent, position, node)
    }

    fn attach(&mut self, parent: NodeIndex, position: usize, node: MirrorNode) -> NodeIndex {
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index.idx()] = Some(node);
                index
            }
            None => {
                self.slots.push(Some(node));
                NodeIndex::new(self.slots.len() - 1)
            }
        };
        self.live += 1;
        match &mut self.node_mut(parent).kind {
            NodeKind::Directory { children } => children.insert(position, index),
            NodeKind::File { .. } => unreachable!("attach under a file node"),
        }
        index
    }

    /// Forward a modification time to a file node. See
    /// [`MirrorNode::update_modification_time`].
    pub fn update_modification_time(&mut self, index: NodeIndex, time: SystemTime) -> bool {
        self.node_mut(index).update_modification_time(time)
    }

    /// All nodes of the subtree at `index`, children before parents.
    pub fn post_order(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        // Explicit stack: (node, children already pushed).
        let mut stack = vec![(index, false)];
        while let Some((current, expanded)) = stack.pop() {
            if expanded {
                order.push(current);
                continue;
            }
            stack.push((current, true));
            for &child in self.children(current).iter().rev() {
                stack.push((child, false));
            }
        }
        order
    }

    /// Unlink `index` from its parent and free the whole subtree.
    ///
    /// The root cannot be detached; calling this with [`ROOT`] frees every
    /// descendant and leaves the root empty.
    pub fn detach(&mut self, index: NodeIndex) {
        if index == ROOT {
            for child in self.children(ROOT).to_vec() {
                self.detach(child);
            }
            return;
        }

        if let Some(parent) = self.node(index).parent {
            if let NodeKind::Directory { children } = &mut self.node_mut(parent).kind {
                children.retain(|&child| child != index);
            }
        }
        for freed in self.post_order(index) {
            self.slots[freed.idx()] = None;
            self.free.push(freed);
            self.live -= 1;
        }
    }

    /// Path of `index` relative to the root, built by walking up the
    /// parent links. The root itself yields an empty path.
    pub fn relative_path(&self, index: NodeIndex) -> PathBuf {
        let mut segments = Vec::new();
        let mut current = index;
        while let Some(parent) = self.node(current).parent {
            segments.push(self.node(current).os_name());
            current = parent;
        }
        segments.iter().rev().collect()
    }
}
