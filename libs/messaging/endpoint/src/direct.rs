//! One-way in-memory endpoint

use crate::polling::Interrupt;
use crate::{
    Consumer, Endpoint, EndpointConfiguration, EndpointError, MessageQueue, MessageSelector,
    Producer, SelectiveConsumer,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::{Message, TestContext};

#[derive(Debug)]
struct DirectInner {
    name: String,
    configuration: EndpointConfiguration,
    queue: Arc<MessageQueue>,
    interrupt: Arc<Interrupt>,
}

/// Endpoint writing to and reading from a shared [`MessageQueue`]
#[derive(Debug, Clone)]
pub struct DirectEndpoint {
    inner: Arc<DirectInner>,
}

impl DirectEndpoint {
    pub fn new(
        name: impl Into<String>,
        queue: Arc<MessageQueue>,
        configuration: EndpointConfiguration,
    ) -> Self {
        Self {
            inner: Arc::new(DirectInner {
                name: name.into(),
                configuration,
                queue,
                interrupt: Arc::new(Interrupt::new()),
            }),
        }
    }

    pub fn queue(&self) -> &Arc<MessageQueue> {
        &self.inner.queue
    }
}

impl Endpoint for DirectEndpoint {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn configuration(&self) -> &EndpointConfiguration {
        &self.inner.configuration
    }

    fn create_producer(&self) -> Arc<dyn Producer> {
        self.inner.clone()
    }

    fn create_consumer(&self) -> Arc<dyn SelectiveConsumer> {
        self.inner.clone()
    }

    fn purge(&self, selector: Option<&MessageSelector>) -> usize {
        self.inner.queue.purge(selector)
    }

    fn interrupt(&self) {
        self.inner.interrupt.interrupt();
    }
}

impl DirectInner {
    async fn receive_matching(
        &self,
        selector: Option<&MessageSelector>,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let timeout = self.configuration.effective_timeout(timeout);
        self.queue
            .receive(
                selector,
                timeout,
                self.configuration.polling_interval,
                &self.interrupt,
            )
            .await
            .ok_or_else(|| EndpointError::timeout(&self.name, timeout))
    }
}

#[async_trait]
impl Producer for DirectInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message, _context: &TestContext) -> Result<(), EndpointError> {
        debug!(
            "Sending message {} to queue '{}'",
            message.id(),
            self.queue.name()
        );
        self.queue.send(message);
        Ok(())
    }
}

#[async_trait]
impl Consumer for DirectInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        _context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        self.receive_matching(None, timeout).await
    }
}

#[async_trait]
impl SelectiveConsumer for DirectInner {
    async fn receive_selective(
        &self,
        selector: &str,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let resolved = context.replace_dynamic_content(selector)?;
        let selector = MessageSelector::parse(&resolved)?;
        self.receive_matching(Some(&selector), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;
    use tracing_test::traced_test;

    fn endpoint(timeout_ms: u64) -> DirectEndpoint {
        DirectEndpoint::new(
            "direct",
            Arc::new(MessageQueue::new("direct.queue")),
            EndpointConfiguration::default()
                .with_timeout(Duration::from_millis(timeout_ms))
                .with_polling_interval(Duration::from_millis(10)),
        )
    }

    #[tokio::test]
    async fn test_send_then_receive() {
        let endpoint = endpoint(100);
        let context = TestContext::new();

        assert_ok!(
            endpoint
                .create_producer()
                .send(Message::new("hello"), &context)
                .await
        );
        let received = endpoint
            .create_consumer()
            .receive(&context, None)
            .await
            .unwrap();

        assert_eq!(received.payload().as_text(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_timeout() {
        let endpoint = endpoint(100);
        let err = endpoint
            .create_consumer()
            .receive(&TestContext::new(), None)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("100 milliseconds"));
    }

    #[tokio::test]
    async fn test_selective_receive_resolves_variables() {
        let endpoint = endpoint(100);
        let context = TestContext::new();
        context.set_variable("op", "bar");

        let producer = endpoint.create_producer();
        producer
            .send(Message::new("a").with_header("operation", "foo"), &context)
            .await
            .unwrap();
        producer
            .send(Message::new("b").with_header("operation", "bar"), &context)
            .await
            .unwrap();

        let received = endpoint
            .create_consumer()
            .receive_selective("operation = '${op}'", &context, None)
            .await
            .unwrap();
        assert_eq!(received.payload().as_text(), "b");
        assert_eq!(endpoint.purge(None), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_interrupt_reports_timeout() {
        let endpoint = endpoint(5_000);
        let consumer = endpoint.create_consumer();
        let interrupter = endpoint.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            interrupter.interrupt();
        });

        let err = consumer.receive(&TestContext::new(), None).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(logs_contain("interrupted"));
    }
}
