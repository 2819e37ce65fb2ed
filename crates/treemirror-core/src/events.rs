/// Push-based event channels.
///
/// A [`Broadcaster`] fans every published value out to all current
/// subscribers. Each subscriber gets its own unbounded `crossbeam_channel`
/// queue, so:
///
/// - late subscribers miss everything published before they subscribed;
/// - every subscriber observes values in publication order;
/// - a dropped `Receiver` is pruned on the next publish.
///
/// Publishing never blocks, so it is safe from the watcher's worker thread.
use crate::error::SyncError;
use crate::model::Update;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;

/// A multi-subscriber broadcast channel. Clones share the subscriber list.
#[derive(Debug)]
pub struct Broadcaster<T> {
    subscribers: Arc<Mutex<Vec<Sender<T>>>>,
}

impl<T> Clone for Broadcaster<T> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<T> Default for Broadcaster<T> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> Broadcaster<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Only values published from now on arrive.
    pub fn subscribe(&self) -> Receiver<T> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Deliver `value` to every live subscriber.
    pub fn publish(&self, value: T) {
        let mut subscribers = self.subscribers.lock();
        match subscribers.len() {
            0 => {}
            1 => {
                if subscribers[0].send(value).is_err() {
                    subscribers.clear();
                }
            }
            _ => subscribers.retain(|tx| tx.send(value.clone()).is_ok()),
        }
    }

    /// Number of subscribers that were live at the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

/// The channels a mirror reports through. Shared by the mirror and every
/// root it owns.
///
/// `updates` carries every creation, deletion and modification in one
/// stream, for consumers that need the order across kinds.
#[derive(Debug)]
pub struct Reporter<I> {
    pub updates: Broadcaster<Update<I>>,
    pub creations: Broadcaster<Update<I>>,
    pub deletions: Broadcaster<Update<I>>,
    pub modifications: Broadcaster<Update<I>>,
    pub errors: Broadcaster<SyncError>,
}

impl<I> Clone for Reporter<I> {
    fn clone(&self) -> Self {
        Self {
            updates: self.updates.clone(),
            creations: self.creations.clone(),
            deletions: self.deletions.clone(),
            modifications: self.modifications.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<I> Default for Reporter<I> {
    fn default() -> Self {
        Self {
            updates: Broadcaster::default(),
            creations: Broadcaster::default(),
            deletions: Broadcaster::default(),
            modifications: Broadcaster::default(),
            errors: Broadcaster::default(),
        }
    }
}
