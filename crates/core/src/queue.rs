//! Priority-class item queues
//!
//! Each manager owns four of these: input and result, one pair per
//! priority class. The queue is a plain FIFO; the two-class discipline
//! lives in the poppers, which always try the HP queue before the LP
//! queue.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;

use overseer_protocol::Item;

/// Thread-safe FIFO of items, logically unbounded
pub struct ItemQueue {
    items: Mutex<VecDeque<Item>>,
    notify: Notify,
}

impl ItemQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Append an item, waking one blocked popper
    pub fn push(&self, item: Item) {
        self.items.lock().push_back(item);
        self.notify.notify_one();
    }

    /// Remove the oldest item without waiting
    pub fn try_pop(&self) -> Option<Item> {
        self.items.lock().pop_front()
    }

    /// Remove the oldest item, waiting until one is available
    ///
    /// Cancellation is the caller's concern: select this against a
    /// cancellation token at the blocking point.
    pub async fn pop(&self) -> Item {
        loop {
            // Arm the notification before checking, so a push between
            // the check and the await is not lost.
            let notified = self.notify.notified();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    /// Discard all queued items atomically, returning how many there were
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let discarded = items.len();
        items.clear();
        discarded
    }
}

impl Default for ItemQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
