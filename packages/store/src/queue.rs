//! Single-writer save queue.
//!
//! Every mutating request goes through [`SaveQueue::add`]. A fair async mutex
//! admits one entry at a time in the order entries first asked for it, so a
//! write never overlaps another write. A failed entry releases the slot like a
//! successful one: its error goes back to its caller and the next entry runs.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{watch, Mutex};
use tracing::debug;

/// Aggregate progress of the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    /// The queue went from empty to non-empty
    Busy { category: Option<String> },
    /// The queue drained; `category` belongs to the last entry that finished
    Done { category: Option<String> },
}

impl QueueStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, QueueStatus::Busy { .. })
    }
}

pub struct SaveQueue {
    slot: Mutex<()>,
    pending: AtomicUsize,
    status: watch::Sender<QueueStatus>,
}

impl Default for SaveQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveQueue {
    pub fn new() -> Self {
        let (status, _) = watch::channel(QueueStatus::Idle);
        Self {
            slot: Mutex::new(()),
            pending: AtomicUsize::new(0),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> QueueStatus {
        self.status.borrow().clone()
    }

    /// Entries waiting or running
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Run `work` once every earlier entry has settled.
    ///
    /// `work` is only called when the entry reaches the front, so it reads
    /// whatever state its predecessors left behind.
    ///
    /// The entry takes its place in line when the returned future is first
    /// polled, not when `add` is called. Futures built up front and awaited
    /// out of order run in the order they are first polled.
    pub async fn add<F, Fut, T, E>(&self, category: Option<&str>, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let _pending = PendingGuard::enter(self, category);
        let _slot = self.slot.lock().await;
        work().await
    }
}

/// Counts an entry in while it waits or runs, and publishes the busy/done edges
struct PendingGuard<'a> {
    queue: &'a SaveQueue,
    category: Option<String>,
}

impl<'a> PendingGuard<'a> {
    fn enter(queue: &'a SaveQueue, category: Option<&str>) -> Self {
        let category = category.map(str::to_string);
        if queue.pending.fetch_add(1, Ordering::SeqCst) == 0 {
            debug!(category = ?category, "Save queue busy");
            queue.status.send_replace(QueueStatus::Busy {
                category: category.clone(),
            });
        }
        Self { queue, category }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.queue.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!(category = ?self.category, "Save queue drained");
            self.queue.status.send_replace(QueueStatus::Done {
                category: self.category.take(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_entries_apply_in_enqueue_order() {
        let queue = SaveQueue::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let slow = {
            let log = log.clone();
            queue.add(Some("save"), move || async move {
                log.lock().unwrap().push("a:start");
                tokio::time::sleep(Duration::from_millis(30)).await;
                log.lock().unwrap().push("a:end");
                Ok::<_, ()>("a")
            })
        };
        let fast = {
            let log = log.clone();
            queue.add(Some("save"), move || async move {
                log.lock().unwrap().push("b:start");
                log.lock().unwrap().push("b:end");
                Ok::<_, ()>("b")
            })
        };

        let (a, b) = tokio::join!(slow, fast);

        assert_eq!(a, Ok("a"));
        assert_eq!(b, Ok("b"));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:start", "a:end", "b:start", "b:end"]
        );
    }

    #[tokio::test]
    async fn test_failure_does_not_block_successors() {
        let queue = SaveQueue::new();

        let failing = queue.add(None, || async { Err::<(), _>("boom") });
        let next = queue.add(None, || async { Ok::<_, &str>(7) });
        let (failed, next) = tokio::join!(failing, next);

        assert_eq!(failed, Err("boom"));
        assert_eq!(next, Ok(7));
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn test_status_reports_busy_then_done() {
        let queue = SaveQueue::new();
        let mut status = queue.subscribe();
        assert_eq!(queue.status(), QueueStatus::Idle);

        let entry = queue.add(Some("publish"), || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok::<_, ()>(())
        });
        let watcher = async {
            status.changed().await.unwrap();
            status.borrow_and_update().clone()
        };
        let (_, seen) = tokio::join!(entry, watcher);

        assert_eq!(
            seen,
            QueueStatus::Busy {
                category: Some("publish".to_string())
            }
        );
        assert_eq!(
            queue.status(),
            QueueStatus::Done {
                category: Some("publish".to_string())
            }
        );
    }
}
