/// Asynchronous I/O façade over a [`Watcher`] and a [`SharedMirror`].
///
/// Every operation returns an [`IoFuture`] immediately and proceeds in three
/// steps:
///
/// 1. the watcher performs the filesystem work on its background worker;
/// 2. on success, the watcher callback applies the matching mirror mutation
///    while holding the mirror lock (on failure nothing is mutated);
/// 3. the outcome is handed to the client executor, which resolves the
///    future.
///
/// So for any single operation: mirror mutated → future resolved →
/// continuation runs on the client executor. Watcher errors reach the
/// future untranslated.
pub mod executor;
pub mod future;

pub use executor::{ClientExecutor, InlineExecutor, Task, ThreadExecutor};
pub use future::{Completion, IoFuture};

use crate::error::MirrorError;
use crate::mirror::SharedMirror;
use crate::model::PathElement;
use crate::watcher::{Charset, OnFailure, OnSuccess, Watcher};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

/// Mirror-maintaining front end for filesystem operations.
pub struct MirrorIo<I, W> {
    mirror: SharedMirror<I>,
    watcher: Arc<W>,
    executor: Arc<dyn ClientExecutor>,
}

impl<I, W> MirrorIo<I, W>
where
    I: Clone + Send + 'static,
    W: Watcher + 'static,
{
    pub fn new(mirror: SharedMirror<I>, watcher: W, executor: Arc<dyn ClientExecutor>) -> Self {
        Self {
            mirror,
            watcher: Arc::new(watcher),
            executor,
        }
    }

    pub fn mirror(&self) -> &SharedMirror<I> {
        &self.mirror
    }

    pub fn watcher(&self) -> &W {
        &self.watcher
    }

    /// Register a mirrored root and ask the watcher to watch it.
    pub fn add_top_level_directory(&self, path: impl Into<PathBuf>) -> Result<(), MirrorError> {
        let path = path.into();
        self.mirror.lock().add_top_level_directory(path.clone())?;
        self.watcher.watch_or_stream_error(&path);
        Ok(())
    }

    /// Start `op` on the watcher; on success run `apply` (the mirror
    /// mutation) on the watcher's thread, then complete on the executor.
    fn run<T, R, S, A>(&self, start: S, apply: A) -> IoFuture<R>
    where
        T: 'static,
        R: Send + 'static,
        S: FnOnce(&W, OnSuccess<T>, OnFailure),
        A: FnOnce(&SharedMirror<I>, &W, T) -> R + Send + 'static,
    {
        let (completion, future) = Completion::new(Arc::clone(&self.executor));
        // Only one of the two callbacks ever fires; whichever does takes the
        // completion. If both are dropped, so is the completion.
        let slot = Arc::new(Mutex::new(Some(completion)));
        let failure_slot = Arc::clone(&slot);
        let mirror = Arc::clone(&self.mirror);
        let watcher = Arc::clone(&self.watcher);

        start(
            &self.watcher,
            Box::new(move |value| {
                let result = apply(&mirror, &*watcher, value);
                if let Some(completion) = slot.lock().take() {
                    completion.complete(Ok(result));
                }
            }),
            Box::new(move |err| {
                debug!("Watcher operation failed: {err}");
                if let Some(completion) = failure_slot.lock().take() {
                    completion.complete(Err(err));
                }
            }),
        );
        future
    }

    /// Create one directory. Mirrored (and watched) only when it falls
    /// under a registered root.
    pub fn create_directory(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<PathBuf> {
        let path = path.into();
        self.run(
            move |w, ok, err| w.create_directory(path, ok, err),
            move |mirror, watcher, created: PathBuf| {
                let mirrored = {
                    let mut mirror = mirror.lock();
                    let mirrored = mirror.contains_prefix_of(&created);
                    if mirrored {
                        mirror.add_directory(&created, &initiator);
                    }
                    mirrored
                };
                if mirrored {
                    watcher.watch_or_stream_error(&created);
                }
                created
            },
        )
    }

    /// Create a directory with all missing ancestors. The created chain is
    /// mirrored (and watched) only when it falls under a registered root.
    pub fn create_directories(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<PathBuf> {
        let path = path.into();
        self.run(
            move |w, ok, err| w.create_directories(path, ok, err),
            move |mirror, watcher, created: PathBuf| {
                let mirrored = {
                    let mut mirror = mirror.lock();
                    let mirrored = mirror.contains_prefix_of(&created);
                    if mirrored {
                        mirror.add_directories(&created, &initiator);
                    }
                    mirrored
                };
                if mirrored {
                    watcher.watch_up_or_stream_error(&created);
                }
                created
            },
        )
    }

    /// Create an empty file and mirror it with its modification time.
    pub fn create_file(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<SystemTime> {
        let path = path.into();
        let target = path.clone();
        self.run(
            move |w, ok, err| w.create_file(path, ok, err),
            move |mirror, _, last_modified: SystemTime| {
                mirror.lock().add_file(&target, last_modified, &initiator);
                last_modified
            },
        )
    }

    /// Delete a file or empty directory. The mirror drops the node only if
    /// the watcher reports that something was actually removed.
    pub fn delete(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<bool> {
        let path = path.into();
        let target = path.clone();
        self.run(
            move |w, ok, err| w.delete(path, ok, err),
            move |mirror, _, existed: bool| {
                if existed {
                    mirror.lock().delete(&target, &initiator);
                }
                existed
            },
        )
    }

    /// Delete a whole tree and drop it from the mirror.
    pub fn delete_tree(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<()> {
        let path = path.into();
        let target = path.clone();
        self.run(
            move |w, ok, err| w.delete_tree(path, ok, err),
            move |mirror, _, ()| {
                mirror.lock().delete(&target, &initiator);
            },
        )
    }

    pub fn read_binary_file(&self, path: impl Into<PathBuf>) -> IoFuture<Vec<u8>> {
        let path = path.into();
        self.run(
            move |w, ok, err| w.read_binary_file(path, ok, err),
            |_, _, bytes: Vec<u8>| bytes,
        )
    }

    pub fn read_text_file(&self, path: impl Into<PathBuf>, charset: Charset) -> IoFuture<String> {
        let path = path.into();
        self.run(
            move |w, ok, err| w.read_text_file(path, charset, ok, err),
            |_, _, text: String| text,
        )
    }

    /// Replace a file's bytes. The mirror records only the new
    /// modification time, never the content.
    pub fn write_binary_file(
        &self,
        path: impl Into<PathBuf>,
        bytes: Vec<u8>,
        initiator: I,
    ) -> IoFuture<SystemTime> {
        let path = path.into();
        let target = path.clone();
        self.run(
            move |w, ok, err| w.write_binary_file(path, bytes, ok, err),
            move |mirror, _, last_modified: SystemTime| {
                mirror
                    .lock()
                    .update_modification_time(&target, last_modified, &initiator);
                last_modified
            },
        )
    }

    /// Replace a file's text. The mirror records only the new
    /// modification time, never the content.
    pub fn write_text_file(
        &self,
        path: impl Into<PathBuf>,
        text: String,
        charset: Charset,
        initiator: I,
    ) -> IoFuture<SystemTime> {
        let path = path.into();
        let target = path.clone();
        self.run(
            move |w, ok, err| w.write_text_file(path, text, charset, ok, err),
            move |mirror, _, last_modified: SystemTime| {
                mirror
                    .lock()
                    .update_modification_time(&target, last_modified, &initiator);
                last_modified
            },
        )
    }

    /// Scan `path` on the watcher and reconcile the mirror with the result.
    /// Resolves with the number of scanned entries.
    pub fn rescan(&self, path: impl Into<PathBuf>, initiator: I) -> IoFuture<usize> {
        let path = path.into();
        self.run(
            move |w, ok, err| w.scan(path, ok, err),
            move |mirror, _, snapshot: PathElement| {
                info!("Reconciling {} ({} entries)", snapshot.path.display(), snapshot.count());
                mirror.lock().sync(&snapshot, &initiator);
                snapshot.count()
            },
        )
    }
}
