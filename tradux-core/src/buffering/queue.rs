//! Bounded FIFO queues between pipeline workers.
//!
//! Thin wrapper over a crossbeam bounded channel that makes the full-queue
//! policy explicit per queue. Capacity is never exceeded; producers never
//! block. Consumers receive with a timeout so the running flag is observed
//! within one timeout period.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::trace;

/// What a producer does when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullPolicy {
    /// Evict the longest-waiting item to make room for the new one.
    /// For consumers that only care about fresh data (presentation pairs).
    DropOldest,
    /// Discard the new item. For best-effort stages (synthesis, playback).
    DropNewest,
}

/// Create a bounded queue with the given full-queue policy.
pub fn channel<T>(capacity: usize, policy: FullPolicy) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = bounded(capacity);
    let dropped = Arc::new(AtomicUsize::new(0));
    (
        QueueSender {
            tx,
            // The sender half keeps a Receiver clone: crossbeam channels are
            // mpmc, so evicting the oldest item is a try_recv away.
            rx: rx.clone(),
            policy,
            dropped: Arc::clone(&dropped),
        },
        QueueReceiver { rx, dropped },
    )
}

/// Producer half of a bounded queue.
pub struct QueueSender<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    policy: FullPolicy,
    dropped: Arc<AtomicUsize>,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            policy: self.policy,
            dropped: Arc::clone(&self.dropped),
        }
    }
}

impl<T> QueueSender<T> {
    /// Enqueue without blocking, applying the full-queue policy.
    ///
    /// Returns `true` if the item was enqueued, `false` if it was dropped
    /// (or the consumer side is gone).
    pub fn push(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(item)) => match self.policy {
                FullPolicy::DropNewest => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    trace!("queue full — dropped newest item");
                    false
                }
                FullPolicy::DropOldest => {
                    // Evict one, then retry once. A concurrent producer may
                    // have refilled the slot; the new item is dropped then.
                    let _ = self.rx.try_recv();
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    match self.tx.try_send(item) {
                        Ok(()) => true,
                        Err(_) => {
                            trace!("queue full after eviction — dropped newest item");
                            false
                        }
                    }
                }
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Items discarded so far under the full-queue policy.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half of a bounded queue.
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
    dropped: Arc<AtomicUsize>,
}

impl<T> QueueReceiver<T> {
    /// Blocking receive with a bounded timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued and keep only the most recent item.
    ///
    /// Most-recent-wins semantics for polled consumers: if several items
    /// arrived between polls, only the latest is shown, the rest are
    /// consumed silently.
    pub fn drain_latest(&self) -> Option<T> {
        let mut latest = None;
        while let Ok(item) = self.rx.try_recv() {
            latest = Some(item);
        }
        latest
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Items the producer side discarded so far.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}
