/// Data model for the mirror.
///
/// Re-exports the arena-allocated node tree, the per-root reconciliation
/// engine, change events, and snapshot elements.
pub mod node;
pub mod path;
pub mod root;
pub mod snapshot;
pub mod tree;
pub mod update;

pub use node::{compare_names, MirrorNode, NodeIndex, NodeKind};
pub use root::RootNode;
pub use snapshot::PathElement;
pub use tree::{MirrorTree, ROOT};
pub use update::{Update, UpdateKind};
