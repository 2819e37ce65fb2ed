/// treemirror core — directory-tree mirroring and reconciliation.
///
/// This crate contains the mirror engine with zero frontend dependencies.
/// It keeps an ordered in-memory tree in step with one or more filesystem
/// subtrees, using snapshots and watcher callbacks as its only inputs.
///
/// # Modules
///
/// - [`model`] — Arena-allocated node tree, per-root reconciliation, events.
/// - [`mirror`] — The forest of mirrored roots and path routing.
/// - [`events`] — Multi-subscriber broadcast channels.
/// - [`io`] — Future-returning façade that mutates the mirror on success.
/// - [`watcher`] — The watcher boundary and a `std::fs` reference watcher.
/// - [`scanner`] — Parallel recursive scan producing snapshots.
/// - [`error`] — Error types.
pub mod error;
pub mod events;
pub mod io;
pub mod mirror;
pub mod model;
pub mod scanner;
pub mod watcher;

pub use error::{MirrorError, SyncError, WatchError};
pub use mirror::{Mirror, MirrorEntry, SharedMirror};
pub use model::{PathElement, Update, UpdateKind};
