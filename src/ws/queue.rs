use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::message::Message;

/// A message waiting to be transmitted, stamped with the time it was enqueued.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct QueuedMessage {
    pub enqueued_at: Instant,
    pub message: Message,
}

/// Unbounded outbound queue.
///
/// FIFO for appended messages; `prepend` jumps the line, so consecutive prepends come out
/// last-in-first-out. Producers never block. A single drainer (the sender task) pops.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    entries: Mutex<VecDeque<QueuedMessage>>,
    notify: Notify,
}

impl OutboundQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, message: Message, prepend: bool) {
        let entry = QueuedMessage {
            enqueued_at: Instant::now(),
            message,
        };

        // Entries are independent of each other; a poisoned lock is still usable.
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if prepend {
            entries.push_front(entry);
        } else {
            entries.push_back(entry);
        }
        drop(entries);

        self.notify.notify_one();
    }

    /// The oldest entry (or most recent prepend), without removing it.
    #[must_use]
    pub fn peek_front(&self) -> Option<QueuedMessage> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .front()
            .cloned()
    }

    pub fn pop_front(&self) -> Option<QueuedMessage> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves after the next enqueue, or immediately if one happened since the last wait.
    pub(crate) async fn enqueued(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Parameters;

    fn message(message_type: &str) -> Message {
        Message::new(message_type, Parameters::new())
    }

    fn drain(queue: &OutboundQueue) -> Vec<String> {
        std::iter::from_fn(|| queue.pop_front())
            .map(|entry| entry.message.message_type)
            .collect()
    }

    #[test]
    fn appends_are_fifo() {
        let queue = OutboundQueue::new();
        queue.enqueue(message("a"), false);
        queue.enqueue(message("b"), false);
        queue.enqueue(message("c"), false);

        assert_eq!(drain(&queue), ["a", "b", "c"]);
    }

    #[test]
    fn prepends_are_lifo_and_precede_appends() {
        let queue = OutboundQueue::new();
        queue.enqueue(message("app"), false);
        queue.enqueue(message("first"), true);
        queue.enqueue(message("second"), true);

        assert_eq!(drain(&queue), ["second", "first", "app"]);
    }

    #[test]
    fn peek_does_not_remove() {
        let queue = OutboundQueue::new();
        assert!(queue.peek_front().is_none());

        queue.enqueue(message("a"), false);

        let peeked = queue.peek_front().map(|entry| entry.message.message_type);
        assert_eq!(peeked.as_deref(), Some("a"));
        assert_eq!(queue.len(), 1);

        assert!(queue.pop_front().is_some());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn enqueue_wakes_waiter() {
        let queue = std::sync::Arc::new(OutboundQueue::new());
        let waiter = {
            let queue = std::sync::Arc::clone(&queue);
            tokio::spawn(async move { queue.enqueued().await })
        };

        queue.enqueue(message("a"), false);

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("waiter should be woken")
            .expect("waiter task should not panic");
    }
}
