//! In-memory doubles for endpoint consumers in tests

use crate::{
    Consumer, Endpoint, EndpointAdapter, EndpointConfiguration, EndpointError, Producer,
    RequestHandler, SelectiveConsumer,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use types::{Message, TestContext};

/// Replies with the request payload, optionally prefixed and delayed
#[derive(Debug, Default)]
pub struct EchoHandler {
    prefix: String,
    delay: Option<Duration>,
    fail: bool,
    handled: AtomicUsize,
}

impl EchoHandler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, request: Message) -> Result<Message, EndpointError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.handled.fetch_add(1, Ordering::Relaxed);

        if self.fail {
            return Err(EndpointError::transport("Simulated failure"));
        }

        let payload = format!("{}{}", self.prefix, request.payload().as_text());
        Ok(Message::reply_for(&request, payload))
    }
}

#[derive(Debug, Default)]
struct MockState {
    sent: Mutex<Vec<Message>>,
    inbound: Mutex<VecDeque<Message>>,
    fail_next_send: AtomicBool,
}

/// Endpoint recording sent messages and serving queued inbound ones
///
/// Receives never wait: with nothing queued they fail immediately with a
/// timeout of the requested duration.
#[derive(Debug, Clone)]
pub struct MockEndpoint {
    name: String,
    configuration: EndpointConfiguration,
    state: Arc<MockState>,
}

impl MockEndpoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            configuration: EndpointConfiguration::default(),
            state: Arc::new(MockState::default()),
        }
    }

    pub fn with_configuration(mut self, configuration: EndpointConfiguration) -> Self {
        self.configuration = configuration;
        self
    }

    /// Queue a message for the next receive
    pub fn push_inbound(&self, message: Message) {
        self.state.inbound.lock().push_back(message);
    }

    pub fn sent_messages(&self) -> Vec<Message> {
        self.state.sent.lock().clone()
    }

    pub fn fail_next_send(&self) {
        self.state.fail_next_send.store(true, Ordering::Relaxed);
    }

    fn take_inbound(
        &self,
        matches: impl Fn(&Message) -> bool,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let mut inbound = self.state.inbound.lock();
        inbound
            .iter()
            .position(|m| matches(m))
            .and_then(|position| inbound.remove(position))
            .ok_or_else(|| {
                EndpointError::timeout(&self.name, self.configuration.effective_timeout(timeout))
            })
    }
}

impl Endpoint for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration(&self) -> &EndpointConfiguration {
        &self.configuration
    }

    fn create_producer(&self) -> Arc<dyn Producer> {
        Arc::new(self.clone())
    }

    fn create_consumer(&self) -> Arc<dyn SelectiveConsumer> {
        Arc::new(self.clone())
    }

    fn purge(&self, _selector: Option<&crate::MessageSelector>) -> usize {
        let mut inbound = self.state.inbound.lock();
        let purged = inbound.len();
        inbound.clear();
        purged
    }
}

#[async_trait]
impl Producer for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message, _context: &TestContext) -> Result<(), EndpointError> {
        if self.state.fail_next_send.swap(false, Ordering::Relaxed) {
            return Err(EndpointError::send_failed(&self.name, "Simulated failure"));
        }
        self.state.sent.lock().push(message);
        Ok(())
    }
}

#[async_trait]
impl Consumer for MockEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        _context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        self.take_inbound(|_| true, timeout)
    }
}

#[async_trait]
impl SelectiveConsumer for MockEndpoint {
    async fn receive_selective(
        &self,
        selector: &str,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let resolved = context.replace_dynamic_content(selector)?;
        let selector = crate::MessageSelector::parse(&resolved)?;
        self.take_inbound(|m| selector.matches(m), timeout)
    }
}

/// Adapter recording requests and answering from a script
#[derive(Debug, Default)]
pub struct RecordingEndpointAdapter {
    requests: Mutex<Vec<Message>>,
    replies: Mutex<VecDeque<Result<Option<Message>, EndpointError>>>,
}

impl RecordingEndpointAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next `handle_message` returns `reply`; with no scripted reply it returns `None`
    pub fn reply_with(&self, reply: Result<Option<Message>, EndpointError>) {
        self.replies.lock().push_back(reply);
    }

    pub fn requests(&self) -> Vec<Message> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl EndpointAdapter for RecordingEndpointAdapter {
    async fn handle_message(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        self.requests.lock().push(request);
        self.replies.lock().pop_front().unwrap_or(Ok(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_endpoint() {
        let endpoint = MockEndpoint::new("mock");
        let context = TestContext::new();

        endpoint
            .create_producer()
            .send(Message::new("out"), &context)
            .await
            .unwrap();
        endpoint.push_inbound(Message::new("in").with_header("kind", "a"));

        assert_eq!(endpoint.sent_messages().len(), 1);
        let consumer = endpoint.create_consumer();
        assert!(consumer
            .receive_selective("kind = 'b'", &context, None)
            .await
            .unwrap_err()
            .is_timeout());
        assert_eq!(
            consumer.receive(&context, None).await.unwrap().payload().as_text(),
            "in"
        );
    }

    #[tokio::test]
    async fn test_recording_adapter() {
        let adapter = RecordingEndpointAdapter::new();
        adapter.reply_with(Ok(Some(Message::new("scripted"))));

        let first = adapter.handle_message(Message::new("a")).await.unwrap();
        let second = adapter.handle_message(Message::new("b")).await.unwrap();

        assert_eq!(first.unwrap().payload().as_text(), "scripted");
        assert!(second.is_none());
        assert_eq!(adapter.requests().len(), 2);
    }
}
