/// Change events emitted by the mirror.
///
/// Every mutation of a mirrored subtree produces exactly one `Update` per
/// affected node. Consumers (tree views, loggers) replay them to keep their
/// own structures in step with the mirror.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What happened to the node named by an [`Update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Creation,
    Deletion,
    Modification,
}

/// An immutable change record.
///
/// `base_dir` is the mirrored root the node lives under and
/// `relative_path` locates the node inside it. `initiator` is the opaque
/// token the caller passed to the operation that caused the change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update<I> {
    pub kind: UpdateKind,
    pub base_dir: PathBuf,
    pub relative_path: PathBuf,
    pub initiator: I,
}

impl<I> Update<I> {
    pub fn new(kind: UpdateKind, base_dir: &Path, relative_path: PathBuf, initiator: I) -> Self {
        Self {
            kind,
            base_dir: base_dir.to_path_buf(),
            relative_path,
            initiator,
        }
    }

    /// Absolute path of the affected node.
    pub fn path(&self) -> PathBuf {
        self.base_dir.join(&self.relative_path)
    }
}
