/// Client executors: where completed operations hand their results over.
///
/// The watcher's worker thread should not run caller code. Once the mirror
/// has been updated, the façade passes the completion to a
/// [`ClientExecutor`], and everything waiting on the future resumes there.
/// [`ThreadExecutor`] keeps continuations off the worker; [`InlineExecutor`]
/// does not, and is meant for tests.
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread;
use tracing::debug;

/// A unit of work handed to a [`ClientExecutor`].
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion tasks in the caller's chosen context.
pub trait ClientExecutor: Send + Sync + 'static {
    fn execute(&self, task: Task);
}

impl<E: ClientExecutor + ?Sized> ClientExecutor for Arc<E> {
    fn execute(&self, task: Task) {
        (**self).execute(task)
    }
}

/// Runs every task immediately on the completing thread.
///
/// With [`crate::watcher::LocalWatcher`] that thread is the watcher's own
/// worker, so continuations run inside the watcher context and stall every
/// queued operation while they run. Use it in tests, or when the caller only
/// blocks on futures from its own thread; give anything that does real work
/// in a continuation a [`ThreadExecutor`] instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl ClientExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task();
    }
}

/// A dedicated client thread draining a task queue in order.
///
/// The thread exits once every clone of the executor has been dropped and
/// the queue is empty.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    tasks: Sender<Task>,
}

impl ThreadExecutor {
    /// Spawn the client thread under `name`.
    pub fn new(name: &str) -> Self {
        let (tx, rx) = unbounded::<Task>();
        let thread_name = name.to_owned();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                for task in rx {
                    task();
                }
                debug!("Client executor {thread_name} stopped");
            })
            .expect("failed to spawn client executor thread");
        Self { tasks: tx }
    }
}

impl ClientExecutor for ThreadExecutor {
    fn execute(&self, task: Task) {
        // The receiver only disappears if the thread panicked; the dropped
        // task then resolves its future as disconnected.
        let _ = self.tasks.send(task);
    }
}
