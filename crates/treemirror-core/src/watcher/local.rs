/// `std::fs`-backed watcher running every operation on one worker thread.
///
/// Operations are queued on a bounded `crossbeam_channel` and executed in
/// submission order by the `treemirror-watcher` thread, which also runs the
/// success/failure callbacks. Because there is exactly one worker, every
/// mirror mutation performed by those callbacks is serialized.
///
/// Submitting never blocks: when the queue is full the operation is refused
/// and its failure callback runs immediately with
/// [`WatchError::QueueFull`].
///
/// Watch requests are recorded (see [`LocalWatcher::watched_paths`]) but no
/// OS change notifications are subscribed; pair this watcher with periodic
/// [`crate::io::MirrorIo::rescan`] calls to pick up external changes.
use super::{Charset, OnFailure, OnSuccess, Watcher};
use crate::error::WatchError;
use crate::model::PathElement;
use crate::scanner;
use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Maximum number of queued operations before new ones are refused.
pub const JOB_QUEUE_CAPACITY: usize = 1_024;

/// A queued operation. Called with `None` on the worker to run it, or with
/// the error that kept it off the queue.
type Job = Box<dyn FnOnce(Option<WatchError>) + Send + 'static>;

/// Tuning for [`LocalWatcher`].
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Capacity of the operation queue.
    pub queue_capacity: usize,
    /// Follow symbolic links while scanning.
    pub follow_links: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: JOB_QUEUE_CAPACITY,
            follow_links: false,
        }
    }
}

/// Reference [`Watcher`] performing real filesystem I/O.
pub struct LocalWatcher {
    jobs: Option<Sender<Job>>,
    config: WatcherConfig,
    watched: Arc<Mutex<BTreeSet<PathBuf>>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl LocalWatcher {
    /// Spawn the worker thread.
    pub fn new(config: WatcherConfig) -> Self {
        let (tx, rx) = bounded::<Job>(config.queue_capacity.max(1));

        let thread = thread::Builder::new()
            .name("treemirror-watcher".into())
            .spawn(move || {
                debug!("Watcher worker started");
                for job in rx {
                    job(None);
                }
                debug!("Watcher worker stopped");
            })
            .expect("failed to spawn watcher thread");

        Self {
            jobs: Some(tx),
            config,
            watched: Arc::new(Mutex::new(BTreeSet::new())),
            thread: Some(thread),
        }
    }

    /// Directories recorded by the watch requests so far, sorted.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watched.lock().iter().cloned().collect()
    }

    /// Queue `op` on the worker and route its outcome to one callback.
    ///
    /// A refused operation fails on the calling thread before this returns.
    fn submit<T, F>(&self, op: F, on_success: OnSuccess<T>, on_failure: OnFailure)
    where
        T: 'static,
        F: FnOnce() -> Result<T, WatchError> + Send + 'static,
    {
        let job: Job = Box::new(move |refused| match refused {
            Some(err) => on_failure(err),
            None => match op() {
                Ok(value) => on_success(value),
                Err(err) => on_failure(err),
            },
        });
        let Some(jobs) = &self.jobs else {
            job(Some(WatchError::Disconnected));
            return;
        };
        match jobs.try_send(job) {
            Ok(()) => {}
            Err(TrySendError::Full(job)) => {
                warn!("Watcher queue is full; operation refused");
                job(Some(WatchError::QueueFull {
                    capacity: self.config.queue_capacity.max(1),
                }));
            }
            Err(TrySendError::Disconnected(job)) => {
                warn!("Watcher worker is not running; operation refused");
                job(Some(WatchError::Disconnected));
            }
        }
    }
}

impl Default for LocalWatcher {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

impl Drop for LocalWatcher {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain remaining jobs and exit.
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() {
                let _ = thread.join();
            }
        }
    }
}

// ─── Filesystem operations (run on the worker) ──────────────────────────────

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> WatchError + '_ {
    move |err| WatchError::from_io(path, err)
}

fn modified(path: &Path) -> Result<SystemTime, WatchError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(io_err(path))
}

fn delete_entry(path: &Path) -> Result<bool, WatchError> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(WatchError::from_io(path, err)),
    };
    if meta.is_dir() {
        // Checked up front: not every platform reports ENOTEMPTY distinctly.
        let mut entries = fs::read_dir(path).map_err(io_err(path))?;
        if entries.next().is_some() {
            return Err(WatchError::DirectoryNotEmpty(path.to_path_buf()));
        }
        fs::remove_dir(path).map_err(io_err(path))?;
    } else {
        fs::remove_file(path).map_err(io_err(path))?;
    }
    Ok(true)
}

fn delete_tree_entry(path: &Path) -> Result<(), WatchError> {
    let meta = fs::symlink_metadata(path).map_err(io_err(path))?;
    if meta.is_dir() {
        fs::remove_dir_all(path).map_err(io_err(path))
    } else {
        fs::remove_file(path).map_err(io_err(path))
    }
}

fn create_empty_file(path: &Path) -> Result<SystemTime, WatchError> {
    fs::File::create_new(path).map_err(io_err(path))?;
    modified(path)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<SystemTime, WatchError> {
    fs::write(path, bytes).map_err(io_err(path))?;
    modified(path)
}

impl Watcher for LocalWatcher {
    fn create_directory(&self, path: PathBuf, on_success: OnSuccess<PathBuf>, on_failure: OnFailure) {
        self.submit(
            move || {
                fs::create_dir(&path).map_err(io_err(&path))?;
                Ok(path)
            },
            on_success,
            on_failure,
        );
    }

    fn create_directories(&self, path: PathBuf, on_success: OnSuccess<PathBuf>, on_failure: OnFailure) {
        self.submit(
            move || {
                fs::create_dir_all(&path).map_err(io_err(&path))?;
                Ok(path)
            },
            on_success,
            on_failure,
        );
    }

    fn create_file(&self, path: PathBuf, on_success: OnSuccess<SystemTime>, on_failure: OnFailure) {
        self.submit(move || create_empty_file(&path), on_success, on_failure);
    }

    fn delete(&self, path: PathBuf, on_success: OnSuccess<bool>, on_failure: OnFailure) {
        self.submit(move || delete_entry(&path), on_success, on_failure);
    }

    fn delete_tree(&self, path: PathBuf, on_success: OnSuccess<()>, on_failure: OnFailure) {
        self.submit(move || delete_tree_entry(&path), on_success, on_failure);
    }

    fn read_binary_file(&self, path: PathBuf, on_success: OnSuccess<Vec<u8>>, on_failure: OnFailure) {
        self.submit(move || fs::read(&path).map_err(io_err(&path)), on_success, on_failure);
    }

    fn read_text_file(
        &self,
        path: PathBuf,
        charset: Charset,
        on_success: OnSuccess<String>,
        on_failure: OnFailure,
    ) {
        self.submit(
            move || {
                let bytes = fs::read(&path).map_err(io_err(&path))?;
                charset.decode(bytes).ok_or_else(|| WatchError::Encoding {
                    path,
                    charset: charset.name(),
                })
            },
            on_success,
            on_failure,
        );
    }

    fn write_binary_file(
        &self,
        path: PathBuf,
        bytes: Vec<u8>,
        on_success: OnSuccess<SystemTime>,
        on_failure: OnFailure,
    ) {
        self.submit(move || write_bytes(&path, &bytes), on_success, on_failure);
    }

    fn write_text_file(
        &self,
        path: PathBuf,
        text: String,
        charset: Charset,
        on_success: OnSuccess<SystemTime>,
        on_failure: OnFailure,
    ) {
        self.submit(
            move || {
                let bytes = charset.encode(&text).ok_or_else(|| WatchError::Encoding {
                    path: path.clone(),
                    charset: charset.name(),
                })?;
                write_bytes(&path, &bytes)
            },
            on_success,
            on_failure,
        );
    }

    fn scan(&self, path: PathBuf, on_success: OnSuccess<PathElement>, on_failure: OnFailure) {
        let follow_links = self.config.follow_links;
        self.submit(
            move || scanner::scan_tree(&path, follow_links),
            on_success,
            on_failure,
        );
    }

    fn watch_or_stream_error(&self, path: &Path) {
        if !path.is_dir() {
            warn!("Cannot watch {}: not a directory", path.display());
            return;
        }
        debug!("Watching {}", path.display());
        self.watched.lock().insert(path.to_path_buf());
    }

    fn watch_up_or_stream_error(&self, path: &Path) {
        let mut watched = self.watched.lock();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() || watched.contains(ancestor) {
                break;
            }
            if !ancestor.is_dir() {
                warn!("Cannot watch {}: not a directory", ancestor.display());
                break;
            }
            debug!("Watching {}", ancestor.display());
            watched.insert(ancestor.to_path_buf());
        }
    }
}
