//! Bounded FIFO wait queue (spec.md §4.4).

use tokio::sync::{mpsc, Mutex};

/// A bounded, strictly-FIFO queue of pending work.
///
/// Backed by a [`tokio::sync::mpsc`] bounded channel — spec.md §9's Open
/// Question notes the reference's "underlying bounded channel" blocks
/// `enqueue` rather than rejecting when a race fills the queue between the
/// admission check and the send; a `tokio::mpsc` channel has exactly that
/// behaviour, which is the specified-as-intended choice.
///
/// `tryReserve`'s non-blocking size read comes from `Sender::capacity()`,
/// which is O(1) and lock-free; only `dequeue`/`close` touch the
/// single-consumer receiver behind a mutex.
pub struct WaitQueue<T> {
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
    max_size: usize,
}

impl<T: Send + 'static> WaitQueue<T> {
    pub fn new(max_size: usize) -> Self {
        let (tx, rx) = mpsc::channel(max_size.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
            max_size: max_size.max(1),
        }
    }

    /// Current size, without blocking. Used by admission to decide
    /// reject-vs-enqueue; racy against concurrent enqueues by design
    /// (spec.md §4.4: "advisory only").
    pub fn current_size(&self) -> usize {
        self.max_size.saturating_sub(self.tx.capacity())
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Appends an item. Only call this after observing `current_size() <
    /// max_size` — if the queue fills in the race window this briefly
    /// blocks instead of rejecting (spec.md §4.4, §9 Open Question).
    /// Returns the item back on error, which only happens after `close()`.
    pub async fn enqueue(&self, item: T) -> Result<(), T> {
        self.tx.send(item).await.map_err(|e| e.0)
    }

    /// Blocks until an item is available, or returns `None` once the queue
    /// is closed and drained.
    pub async fn dequeue(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Stops accepting new items; already-buffered items remain dequeuable
    /// (spec.md §4.4: "permits the dispatcher to exit; used only at
    /// shutdown").
    pub async fn close(&self) {
        self.rx.lock().await.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fifo_ordering_is_preserved() {
        let q = WaitQueue::new(10);
        for i in 0..5 {
            q.enqueue(i).await.unwrap();
        }
        for i in 0..5 {
            assert_eq!(q.dequeue().await, Some(i));
        }
    }

    #[tokio::test]
    async fn current_size_tracks_pending_items() {
        let q = WaitQueue::new(3);
        assert_eq!(q.current_size(), 0);
        q.enqueue(1).await.unwrap();
        q.enqueue(2).await.unwrap();
        assert_eq!(q.current_size(), 2);
        q.dequeue().await;
        assert_eq!(q.current_size(), 1);
    }

    #[tokio::test]
    async fn close_drains_existing_then_returns_none() {
        let q = WaitQueue::new(3);
        q.enqueue(1).await.unwrap();
        q.close().await;
        assert_eq!(q.dequeue().await, Some(1));
        assert_eq!(q.dequeue().await, None);
    }

    #[tokio::test]
    async fn enqueue_after_close_fails() {
        let q = WaitQueue::new(3);
        q.close().await;
        assert!(q.enqueue(1).await.is_err());
    }

    #[tokio::test]
    async fn never_exceeds_max_size_without_blocking() {
        let q = WaitQueue::new(2);
        q.enqueue(1).await.unwrap();
        q.enqueue(2).await.unwrap();
        assert_eq!(q.current_size(), 2);

        let blocked = tokio::time::timeout(std::time::Duration::from_millis(50), q.enqueue(3)).await;
        assert!(blocked.is_err(), "enqueue past capacity should block, not silently succeed");
    }
}
