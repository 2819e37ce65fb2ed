/// The watcher boundary.
///
/// A [`Watcher`] performs filesystem operations on its own background
/// worker and reports each outcome through exactly one of two callbacks.
/// The mirror never touches the filesystem itself; everything it learns
/// arrives through these callbacks or through scan snapshots.
///
/// - [`local::LocalWatcher`] — `std::fs` on one dedicated worker thread.
pub mod local;

pub use local::{LocalWatcher, WatcherConfig};

use crate::error::WatchError;
use crate::model::PathElement;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Success continuation carrying the operation's payload.
pub type OnSuccess<T> = Box<dyn FnOnce(T) + Send + 'static>;

/// Failure continuation.
pub type OnFailure = Box<dyn FnOnce(WatchError) + Send + 'static>;

/// Text encodings understood by the text read/write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    /// Strict UTF-8; invalid input is an [`WatchError::Encoding`].
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per char, code points 0–255 only.
    Latin1,
}

impl Charset {
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
        }
    }

    /// Decode `bytes`; `None` if they are not valid in this charset.
    pub fn decode(self, bytes: Vec<u8>) -> Option<String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes).ok(),
            Charset::Latin1 => Some(bytes.into_iter().map(char::from).collect()),
        }
    }

    /// Encode `text`; `None` if some char has no representation.
    pub fn encode(self, text: &str) -> Option<Vec<u8>> {
        match self {
            Charset::Utf8 => Some(text.as_bytes().to_vec()),
            Charset::Latin1 => text.chars().map(|c| u8::try_from(c).ok()).collect(),
        }
    }
}

/// Asynchronous filesystem operations with callback completion.
///
/// Implementations must invoke exactly one of `on_success` / `on_failure`
/// per call and must never block the caller. Outcomes normally arrive from a
/// background context; an operation the implementation refuses up front
/// (see [`WatchError::QueueFull`]) may fail on the calling thread before the
/// call returns.
/// Dropping both callbacks unused is treated by the I/O façade as
/// [`WatchError::Disconnected`].
///
/// Callbacks mutate the shared mirror; implementations that run callbacks
/// on more than one thread rely on the mirror's lock for serialization.
pub trait Watcher: Send + Sync {
    /// Create one directory; its parent must exist. Succeeds with the
    /// created path.
    fn create_directory(&self, path: PathBuf, on_success: OnSuccess<PathBuf>, on_failure: OnFailure);

    /// Create a directory and every missing ancestor. Succeeds with the
    /// created path.
    fn create_directories(&self, path: PathBuf, on_success: OnSuccess<PathBuf>, on_failure: OnFailure);

    /// Create an empty file that must not already exist. Succeeds with its
    /// modification time.
    fn create_file(&self, path: PathBuf, on_success: OnSuccess<SystemTime>, on_failure: OnFailure);

    /// Delete a file or an empty directory. Succeeds with whether the
    /// target existed.
    fn delete(&self, path: PathBuf, on_success: OnSuccess<bool>, on_failure: OnFailure);

    /// Delete a file or a whole directory tree, all or nothing.
    fn delete_tree(&self, path: PathBuf, on_success: OnSuccess<()>, on_failure: OnFailure);

    fn read_binary_file(&self, path: PathBuf, on_success: OnSuccess<Vec<u8>>, on_failure: OnFailure);

    fn read_text_file(
        &self,
        path: PathBuf,
        charset: Charset,
        on_success: OnSuccess<String>,
        on_failure: OnFailure,
    );

    /// Replace a file's content. Succeeds with the new modification time.
    fn write_binary_file(
        &self,
        path: PathBuf,
        bytes: Vec<u8>,
        on_success: OnSuccess<SystemTime>,
        on_failure: OnFailure,
    );

    /// Replace a file's content with encoded text. Succeeds with the new
    /// modification time.
    fn write_text_file(
        &self,
        path: PathBuf,
        text: String,
        charset: Charset,
        on_success: OnSuccess<SystemTime>,
        on_failure: OnFailure,
    );

    /// Recursively describe the tree at `path`.
    fn scan(&self, path: PathBuf, on_success: OnSuccess<PathElement>, on_failure: OnFailure);

    /// Start watching a single directory. Failures are reported through
    /// the watcher's own error stream, not to the caller.
    fn watch_or_stream_error(&self, path: &Path);

    /// Start watching `path` and each of its ancestors not yet watched.
    fn watch_up_or_stream_error(&self, path: &Path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_round_trip() {
        let bytes = Charset::Latin1.encode("caf\u{e9}").unwrap();
        assert_eq!(bytes, vec![b'c', b'a', b'f', 0xe9]);
        assert_eq!(Charset::Latin1.decode(bytes).unwrap(), "caf\u{e9}");
    }

    #[test]
    fn test_latin1_rejects_wide_chars() {
        assert!(Charset::Latin1.encode("\u{20ac}").is_none());
    }

    #[test]
    fn test_utf8_rejects_invalid_bytes() {
        assert!(Charset::Utf8.decode(vec![0xff, 0xfe]).is_none());
        assert_eq!(Charset::Utf8.decode(b"ok".to_vec()).unwrap(), "ok");
    }
}
