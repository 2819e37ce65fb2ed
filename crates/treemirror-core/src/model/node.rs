/// A single node in the arena-allocated mirror tree.
///
/// Nodes live in a flat slot vector owned by [`super::MirrorTree`].
/// Parent-child relationships use indices rather than pointers: the owning
/// relation is membership in a directory's `children` list, while `parent`
/// is a non-owning back-link used only for path reconstruction and detach.
use compact_str::CompactString;
use std::cmp::Ordering;
use std::ffi::{OsStr, OsString};
use std::time::SystemTime;

/// Lightweight index into the arena slot vector.
///
/// Uses `u32` to keep nodes small. Supports up to ~4 billion nodes per
/// mirrored root.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// What a node is. Files are leaves by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A directory with its children kept in mirror order:
    /// directories first, then files, each run sorted case-insensitively.
    Directory { children: Vec<NodeIndex> },
    /// A regular file and the newest modification time observed for it.
    File { last_modified: SystemTime },
}

/// A single file or directory in the mirror.
#[derive(Debug, Clone)]
pub struct MirrorNode {
    /// File or directory name only (NOT the full path), lossily decoded
    /// for display and ordering.
    /// Full paths are reconstructed on demand by walking up via `parent`.
    pub name: CompactString,

    /// The exact OS name when it is not valid UTF-8. Lookups and path
    /// reconstruction go through [`MirrorNode::os_name`].
    raw_name: Option<OsString>,

    /// Index of the parent node. `None` for the root of a mirrored subtree.
    pub parent: Option<NodeIndex>,

    pub kind: NodeKind,
}

impl MirrorNode {
    /// Create an empty directory node.
    pub fn new_dir(name: &OsStr, parent: Option<NodeIndex>) -> Self {
        let (name, raw_name) = split_name(name);
        Self {
            name,
            raw_name,
            parent,
            kind: NodeKind::Directory {
                children: Vec::new(),
            },
        }
    }

    /// Create a file node stamped with `last_modified`.
    pub fn new_file(name: &OsStr, last_modified: SystemTime, parent: Option<NodeIndex>) -> Self {
        let (name, raw_name) = split_name(name);
        Self {
            name,
            raw_name,
            parent,
            kind: NodeKind::File { last_modified },
        }
    }

    /// The name exactly as the filesystem reported it.
    #[inline]
    pub fn os_name(&self) -> &OsStr {
        match &self.raw_name {
            Some(raw) => raw,
            None => OsStr::new(self.name.as_str()),
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    /// Children of a directory; always empty for files.
    #[inline]
    pub fn children(&self) -> &[NodeIndex] {
        match &self.kind {
            NodeKind::Directory { children } => children,
            NodeKind::File { .. } => &[],
        }
    }

    /// Modification time of a file; `None` for directories.
    #[inline]
    pub fn last_modified(&self) -> Option<SystemTime> {
        match self.kind {
            NodeKind::File { last_modified } => Some(last_modified),
            NodeKind::Directory { .. } => None,
        }
    }

    /// Advance the stored modification time.
    ///
    /// Returns `true` and stores `time` only when it is strictly newer than
    /// the current value. Equal or older times, and directories, are a no-op.
    /// Every MODIFICATION event is gated on this returning `true`.
    pub fn update_modification_time(&mut self, time: SystemTime) -> bool {
        match &mut self.kind {
            NodeKind::File { last_modified } if time > *last_modified => {
                *last_modified = time;
                true
            }
            _ => false,
        }
    }
}

/// UTF-8 names are stored once; others keep their raw bytes beside a
/// lossy display copy.
fn split_name(name: &OsStr) -> (CompactString, Option<OsString>) {
    match name.to_str() {
        Some(utf8) => (CompactString::new(utf8), None),
        None => (
            CompactString::new(name.to_string_lossy()),
            Some(name.to_os_string()),
        ),
    }
}

/// Case-insensitive name ordering used for the mirror sort invariant.
///
/// Compares the lowercase expansion of both names character by character,
/// so `"B.txt"` sorts after `"a.txt"` and `"A"` ties with `"a"`.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}
