//! Reference Queue - Notification of Cleared Handles
//!
//! When a handle bound to a queue is cleared, its id is appended to the
//! queue's tail. Entries come out in clearing order. `poll` never blocks;
//! `poll_wait` parks the caller until an entry arrives or the timeout
//! expires. Waiting on a queue never holds the collector's heap lock, so a
//! blocked consumer cannot stall collection.

use super::{QueueHandle, RefId};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// ReferenceQueue - FIFO of cleared reference ids
pub struct ReferenceQueue {
    id: QueueHandle,
    entries: Mutex<VecDeque<RefId>>,
    available: Condvar,
    enqueued_total: AtomicU64,
}

impl ReferenceQueue {
    pub fn new(id: QueueHandle) -> Self {
        Self {
            id,
            entries: Mutex::new(VecDeque::new()),
            available: Condvar::new(),
            enqueued_total: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> QueueHandle {
        self.id
    }

    /// Append a cleared reference to the tail
    pub fn enqueue(&self, reference: RefId) {
        self.entries.lock().push_back(reference);
        self.enqueued_total.fetch_add(1, Ordering::Relaxed);
        self.available.notify_one();
    }

    /// Remove and return the head, if any
    pub fn poll(&self) -> Option<RefId> {
        self.entries.lock().pop_front()
    }

    /// Remove the head, waiting up to `timeout` for one to arrive
    pub fn poll_wait(&self, timeout: Duration) -> Option<RefId> {
        let mut entries = self.entries.lock();
        let deadline = match Instant::now().checked_add(timeout) {
            Some(deadline) => deadline,
            None => {
                // Effectively unbounded
                while entries.is_empty() {
                    self.available.wait(&mut entries);
                }
                return entries.pop_front();
            },
        };

        loop {
            if let Some(reference) = entries.pop_front() {
                return Some(reference);
            }
            if self
                .available
                .wait_until(&mut entries, deadline)
                .timed_out()
            {
                return entries.pop_front();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Entries ever enqueued, including ones already polled
    pub fn enqueued_total(&self) -> u64 {
        self.enqueued_total.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ReferenceQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceQueue")
            .field("id", &self.id)
            .field("len", &self.len())
            .field("enqueued_total", &self.enqueued_total())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn queue() -> ReferenceQueue {
        ReferenceQueue::new(QueueHandle::from_raw(1))
    }

    #[test]
    fn test_fifo_order() {
        let queue = queue();
        assert!(queue.is_empty());

        queue.enqueue(RefId::from_raw(1));
        queue.enqueue(RefId::from_raw(2));
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.poll(), Some(RefId::from_raw(1)));
        assert_eq!(queue.poll(), Some(RefId::from_raw(2)));
        assert_eq!(queue.poll(), None);
        assert_eq!(queue.enqueued_total(), 2);
    }

    #[test]
    fn test_poll_wait_times_out() {
        let queue = queue();
        let start = Instant::now();
        assert_eq!(queue.poll_wait(Duration::from_millis(20)), None);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_poll_wait_returns_ready_entry() {
        let queue = queue();
        queue.enqueue(RefId::from_raw(5));
        assert_eq!(queue.poll_wait(Duration::ZERO), Some(RefId::from_raw(5)));
    }

    #[test]
    fn test_poll_wait_wakes_on_enqueue() {
        let queue = Arc::new(queue());
        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                queue.enqueue(RefId::from_raw(42));
            })
        };

        let got = queue.poll_wait(Duration::from_secs(5));
        producer.join().unwrap();
        assert_eq!(got, Some(RefId::from_raw(42)));
    }
}
