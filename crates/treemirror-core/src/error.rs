/// Error types for the mirror engine.
///
/// - [`WatchError`] — outcome of a watcher I/O operation, surfaced on the
///   returned [`crate::io::IoFuture`] unchanged.
/// - [`SyncError`] — reconciliation desync, published on the mirror's
///   errors channel instead of being returned.
/// - [`MirrorError`] — rejected root registration.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`crate::watcher::Watcher`] operation.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(PathBuf),

    #[error("text of {path} is not representable as {charset}")]
    Encoding { path: PathBuf, charset: &'static str },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The watcher refused the operation instead of blocking the caller.
    #[error("watcher queue is full ({capacity} operations pending)")]
    QueueFull { capacity: usize },

    /// The watcher dropped the operation without reporting an outcome.
    #[error("watcher disconnected before the operation completed")]
    Disconnected,
}

impl WatchError {
    /// Classify an `io::Error` raised while operating on `path`.
    pub fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::AlreadyExists => Self::AlreadyExists(path),
            io::ErrorKind::NotFound => Self::NotFound(path),
            io::ErrorKind::DirectoryNotEmpty => Self::DirectoryNotEmpty(path),
            _ => Self::Io { path, source },
        }
    }
}

/// A snapshot disagreed with the mirror in a way reconciliation cannot fix.
///
/// The offending branch is skipped without partial mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("cannot replace mirrored root {root} with a file")]
    ReplaceRootWithFile { root: PathBuf },

    #[error("desync: parent of {path} is not mirrored")]
    MissingParent { path: PathBuf },

    #[error("desync: {path} is outside mirrored root {root}")]
    OutsideRoot { root: PathBuf, path: PathBuf },
}

/// Root registration failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MirrorError {
    #[error("mirrored roots must be absolute paths: {0}")]
    RelativeRoot(PathBuf),

    #[error("{path} overlaps already mirrored root {existing}")]
    OverlappingRoot { path: PathBuf, existing: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_io_classifies_kinds() {
        let err = WatchError::from_io("/x", io::Error::from(io::ErrorKind::AlreadyExists));
        assert!(matches!(err, WatchError::AlreadyExists(p) if p == PathBuf::from("/x")));

        let err = WatchError::from_io("/x", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, WatchError::NotFound(_)));

        let err = WatchError::from_io("/x", io::Error::from(io::ErrorKind::DirectoryNotEmpty));
        assert!(matches!(err, WatchError::DirectoryNotEmpty(_)));

        let err = WatchError::from_io("/x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, WatchError::Io { .. }));
    }
}
