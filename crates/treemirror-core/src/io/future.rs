/// Result holders returned by the I/O façade.
///
/// [`IoFuture`] is a `std::future::Future` backed by a
/// `futures::channel::oneshot`. The sending half lives in a [`Completion`]
/// owned by the watcher callbacks; completing it schedules the send on the
/// client executor, so wakers and continuations fire there.
use super::executor::ClientExecutor;
use crate::error::WatchError;
use futures::channel::oneshot;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Pending outcome of one façade operation.
#[must_use = "an IoFuture does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct IoFuture<T> {
    rx: oneshot::Receiver<Result<T, WatchError>>,
}

impl<T> IoFuture<T> {
    /// Block the current thread until the operation completes.
    ///
    /// Must not be called from the client executor's own thread, which is
    /// where the completion is delivered.
    pub fn wait(self) -> Result<T, WatchError> {
        futures::executor::block_on(self)
    }

    /// The outcome if it has already been delivered.
    pub fn try_take(&mut self) -> Option<Result<T, WatchError>> {
        match self.rx.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(WatchError::Disconnected)),
        }
    }
}

impl<T> Future for IoFuture<T> {
    type Output = Result<T, WatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(WatchError::Disconnected)))
    }
}

/// Sending half of an [`IoFuture`].
///
/// Dropping it without completing resolves the future with
/// [`WatchError::Disconnected`].
pub struct Completion<T> {
    tx: oneshot::Sender<Result<T, WatchError>>,
    executor: Arc<dyn ClientExecutor>,
}

impl<T: Send + 'static> Completion<T> {
    /// A linked completion / future pair delivering on `executor`.
    pub fn new(executor: Arc<dyn ClientExecutor>) -> (Self, IoFuture<T>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx, executor }, IoFuture { rx })
    }

    /// Hand `result` to the client executor, which resolves the future.
    pub fn complete(self, result: Result<T, WatchError>) {
        let Self { tx, executor } = self;
        executor.execute(Box::new(move || {
            // The caller may have dropped the future; nothing to resume then.
            let _ = tx.send(result);
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::executor::{InlineExecutor, ThreadExecutor};

    #[test]
    fn test_complete_resolves_future() {
        let (completion, future) = Completion::new(Arc::new(InlineExecutor));
        completion.complete(Ok(5));
        assert_eq!(future.wait().unwrap(), 5);
    }

    #[test]
    fn test_dropped_completion_is_disconnected() {
        let (completion, mut future) = Completion::<u8>::new(Arc::new(InlineExecutor));
        drop(completion);
        assert!(matches!(future.try_take(), Some(Err(WatchError::Disconnected))));
    }

    #[test]
    fn test_pending_future_has_no_outcome() {
        let (_completion, mut future) = Completion::<u8>::new(Arc::new(InlineExecutor));
        assert!(future.try_take().is_none());
    }

    #[test]
    fn test_completion_delivered_through_thread_executor() {
        let executor = Arc::new(ThreadExecutor::new("treemirror-test-future"));
        let (completion, future) = Completion::new(executor);
        std::thread::spawn(move || completion.complete(Err::<(), _>(WatchError::NotFound("/x".into()))));
        assert!(matches!(future.wait(), Err(WatchError::NotFound(_))));
    }
}
