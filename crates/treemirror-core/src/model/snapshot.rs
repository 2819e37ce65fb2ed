/// Point-in-time description of on-disk contents.
///
/// A `PathElement` tree is the desired state handed to reconciliation. It is
/// produced by a recursive scan (see [`crate::scanner`]), synthesized by the
/// single-node mirror operations, or exported from the mirror itself.
use super::node::compare_names;
use super::path::file_name;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// One snapshot entry with its (recursively described) children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathElement {
    /// Absolute path of the entry.
    pub path: PathBuf,
    pub is_directory: bool,
    /// Modification time of a file. Directories carry `UNIX_EPOCH`;
    /// reconciliation only compares file times.
    pub last_modified: SystemTime,
    /// Entries inside a directory; always empty for files.
    pub children: Vec<PathElement>,
}

impl PathElement {
    /// A directory element with the given children.
    pub fn directory(path: impl Into<PathBuf>, children: Vec<PathElement>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            last_modified: UNIX_EPOCH,
            children,
        }
    }

    /// A file element.
    pub fn file(path: impl Into<PathBuf>, last_modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            last_modified,
            children: Vec::new(),
        }
    }

    /// Last path segment, lossily decoded; empty for paths without one.
    pub fn name(&self) -> String {
        file_name(&self.path).to_string_lossy().into_owned()
    }

    /// Sort children (recursively) into mirror order: directories first,
    /// then files, each run case-insensitive by name.
    pub fn sort_mirror_order(&mut self) {
        self.children.sort_by(|a, b| {
            b.is_directory
                .cmp(&a.is_directory)
                .then_with(|| compare_names(&a.name(), &b.name()))
        });
        for child in &mut self.children {
            child.sort_mirror_order();
        }
    }

    /// Total number of elements in this snapshot, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(PathElement::count).sum::<usize>()
    }
}
