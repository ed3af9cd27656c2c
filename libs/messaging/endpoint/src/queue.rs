use crate::polling::{poll_until, Interrupt};
use crate::selector::MessageSelector;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};
use types::Message;

/// In-memory FIFO of messages with selective receive
#[derive(Debug)]
pub struct MessageQueue {
    name: String,
    messages: Mutex<VecDeque<Message>>,
    arrived: Notify,
}

impl MessageQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(VecDeque::new()),
            arrived: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&self, message: Message) {
        trace!("Queue '{}' accepted message {}", self.name, message.id());
        self.messages.lock().push_back(message);
        self.arrived.notify_waiters();
    }

    /// Remove the first message matching `selector`, without waiting
    pub fn try_receive(&self, selector: Option<&MessageSelector>) -> Option<Message> {
        let mut messages = self.messages.lock();
        let position = match selector {
            Some(selector) => messages.iter().position(|m| selector.matches(m))?,
            None => {
                if messages.is_empty() {
                    return None;
                }
                0
            }
        };
        messages.remove(position)
    }

    /// Wait up to `timeout` for a message matching `selector`
    pub async fn receive(
        &self,
        selector: Option<&MessageSelector>,
        timeout: Duration,
        polling_interval: Duration,
        interrupt: &Interrupt,
    ) -> Option<Message> {
        let description = format!("message on queue '{}'", self.name);
        poll_until(
            || self.try_receive(selector),
            || self.arrived.notified(),
            timeout,
            polling_interval,
            interrupt,
            &description,
        )
        .await
        .into_option()
    }

    /// Drop messages matching `selector` (all when `None`)
    pub fn purge(&self, selector: Option<&MessageSelector>) -> usize {
        let mut messages = self.messages.lock();
        let before = messages.len();
        match selector {
            Some(selector) => messages.retain(|m| !selector.matches(m)),
            None => messages.clear(),
        }
        let purged = before - messages.len();
        if purged > 0 {
            debug!("Purged {} messages from queue '{}'", purged, self.name);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

/// Named queues shared by endpoints built from the same settings
#[derive(Debug, Default)]
pub struct QueueRegistry {
    queues: DashMap<String, Arc<MessageQueue>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, name: &str) -> Arc<MessageQueue> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MessageQueue::new(name)))
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<MessageQueue>> {
        self.queues.get(name).map(|queue| queue.clone())
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = MessageQueue::new("orders");
        queue.send(Message::new("1"));
        queue.send(Message::new("2"));

        assert_eq!(queue.try_receive(None).unwrap().payload().as_text(), "1");
        assert_eq!(queue.try_receive(None).unwrap().payload().as_text(), "2");
        assert!(queue.try_receive(None).is_none());
    }

    #[test]
    fn test_selective_receive_skips_others() {
        let queue = MessageQueue::new("orders");
        queue.send(Message::new("a").with_header("operation", "foo"));
        queue.send(Message::new("b").with_header("operation", "bar"));

        let selector = MessageSelector::header("operation", "bar");
        assert_eq!(
            queue.try_receive(Some(&selector)).unwrap().payload().as_text(),
            "b"
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_purge_with_selector() {
        let queue = MessageQueue::new("orders");
        queue.send(Message::new("a").with_header("keep", "no"));
        queue.send(Message::new("b").with_header("keep", "yes"));

        assert_eq!(queue.purge(Some(&MessageSelector::header("keep", "no"))), 1);
        assert_eq!(queue.purge(None), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_waits_for_message() {
        let queue = Arc::new(MessageQueue::new("orders"));
        let sender = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sender.send(Message::new("late"));
        });

        let message = queue
            .receive(
                None,
                Duration::from_secs(1),
                Duration::from_millis(500),
                &Interrupt::new(),
            )
            .await;
        assert_eq!(message.unwrap().payload().as_text(), "late");
    }

    #[test]
    fn test_registry_shares_queues() {
        let registry = QueueRegistry::new();
        let first = registry.get_or_create("orders");
        let second = registry.get_or_create("orders");

        first.send(Message::new("x"));
        assert_eq!(second.len(), 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("missing").is_none());
    }
}
