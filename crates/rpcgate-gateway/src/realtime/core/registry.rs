use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    /// Subscribers whose queue was full; the item was dropped for them only.
    pub lagged: usize,
    /// Subscribers whose receiver was gone; they were removed.
    pub removed: usize,
}

struct Entry<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

struct Inner<T> {
    next_id: u64,
    open: bool,
    subs: Vec<Entry<T>>,
}

/// Set of live subscriber queues.
///
/// The lock guards membership only: dispatch takes a snapshot of the senders
/// and delivers outside the lock with non-blocking sends.
pub struct SubscriberRegistry<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> Default for SubscriberRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SubscriberRegistry<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                open: true,
                subs: Vec::new(),
            }),
        }
    }

    // Membership stays consistent even if a holder panicked mid-operation.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a queue. Returns `None` once the registry is closed.
    pub fn add(&self, tx: mpsc::Sender<T>) -> Option<u64> {
        let mut g = self.lock();
        if !g.open {
            return None;
        }
        let id = g.next_id;
        g.next_id += 1;
        g.subs.push(Entry { id, tx });
        Some(id)
    }

    pub fn remove(&self, id: u64) -> bool {
        let mut g = self.lock();
        let before = g.subs.len();
        g.subs.retain(|e| e.id != id);
        g.subs.len() != before
    }

    /// Drop every subscriber whose id is listed.
    pub fn remove_on_failure(&self, failed: &[u64]) -> usize {
        if failed.is_empty() {
            return 0;
        }
        let mut g = self.lock();
        let before = g.subs.len();
        g.subs.retain(|e| !failed.contains(&e.id));
        before - g.subs.len()
    }

    /// Clone of the current senders, in registration order.
    pub fn snapshot_for_dispatch(&self) -> Vec<(u64, mpsc::Sender<T>)> {
        self.lock().subs.iter().map(|e| (e.id, e.tx.clone())).collect()
    }

    /// Refuse new subscribers and drop all queues, which ends every receiver.
    pub fn close(&self) -> usize {
        let mut g = self.lock();
        g.open = false;
        let n = g.subs.len();
        g.subs.clear();
        n
    }

    pub fn is_open(&self) -> bool {
        self.lock().open
    }

    pub fn len(&self) -> usize {
        self.lock().subs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone> SubscriberRegistry<T> {
    /// Offer `item` to every subscriber without waiting. Closed receivers are
    /// pruned; full queues lose this item only.
    pub fn fan_out(&self, item: &T) -> FanOut {
        let mut out = FanOut::default();
        let mut failed = Vec::new();
        for (id, tx) in self.snapshot_for_dispatch() {
            match tx.try_send(item.clone()) {
                Ok(()) => out.delivered += 1,
                Err(TrySendError::Full(_)) => out.lagged += 1,
                Err(TrySendError::Closed(_)) => failed.push(id),
            }
        }
        out.removed = self.remove_on_failure(&failed);
        out
    }
}
