//! Generic request/reply client
//!
//! Wraps a [`RequestHandler`] (an FTP session, an HTTP call, an in-process
//! stub) as an endpoint: `send` performs the request and stores the reply
//! under the request's correlation key, `receive` polls for it.

use crate::correlation::PollingCorrelationManager;
use crate::polling::Interrupt;
use crate::{
    Consumer, Endpoint, EndpointConfiguration, EndpointError, Producer, ReplyStore,
    SelectiveConsumer,
};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use types::{Message, TestContext};

/// Performs one request against the system under test
#[async_trait]
pub trait RequestHandler: Send + Sync + Debug {
    async fn handle(&self, request: Message) -> Result<Message, EndpointError>;
}

#[derive(Debug)]
struct ClientInner {
    name: String,
    configuration: EndpointConfiguration,
    handler: Arc<dyn RequestHandler>,
    // Detached failures are stored under the request key like replies
    manager: Arc<PollingCorrelationManager<Result<Message, EndpointError>>>,
    detached: bool,
}

/// Endpoint turning a [`RequestHandler`] into a producer/consumer pair
#[derive(Debug, Clone)]
pub struct ClientEndpoint {
    inner: Arc<ClientInner>,
    interrupt: Arc<Interrupt>,
}

impl ClientEndpoint {
    pub fn new(
        name: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
        configuration: EndpointConfiguration,
    ) -> Self {
        Self::build(name.into(), handler, configuration, false)
    }

    /// Client whose `send` returns before the handler has replied
    pub fn detached(
        name: impl Into<String>,
        handler: Arc<dyn RequestHandler>,
        configuration: EndpointConfiguration,
    ) -> Self {
        Self::build(name.into(), handler, configuration, true)
    }

    fn build(
        name: String,
        handler: Arc<dyn RequestHandler>,
        configuration: EndpointConfiguration,
        detached: bool,
    ) -> Self {
        let interrupt = Arc::new(Interrupt::new());
        let manager = Arc::new(PollingCorrelationManager::new(
            Arc::new(ReplyStore::new()),
            configuration.polling_interval,
            interrupt.clone(),
            format!("reply message on endpoint '{}'", name),
        ));

        Self {
            inner: Arc::new(ClientInner {
                name,
                configuration,
                handler,
                manager,
                detached,
            }),
            interrupt,
        }
    }

    /// Replies waiting to be received
    pub fn pending_replies(&self) -> usize {
        self.inner.manager.store().len()
    }
}

impl Endpoint for ClientEndpoint {
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

    /// Drops pending replies; without a selector every reply goes
    fn purge(&self, selector: Option<&crate::MessageSelector>) -> usize {
        let store = self.inner.manager.store();
        match selector {
            Some(selector) => store.remove_where(|reply| {
                reply.as_ref().map_or(false, |message| selector.matches(message))
            }),
            None => store.clear(),
        }
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

#[async_trait]
impl Producer for ClientInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message, context: &TestContext) -> Result<(), EndpointError> {
        let correlator = &self.configuration.correlator;
        let key = correlator.correlation_key(&message);
        self.manager
            .save_correlation_key(&correlator.key_name(&self.name), &key, context);

        debug!("Sending request {} on client '{}'", message.id(), self.name);

        if self.detached {
            let handler = self.handler.clone();
            let manager = self.manager.clone();
            let name = self.name.clone();
            tokio::spawn(async move {
                let outcome = handler.handle(message).await.map_err(|err| {
                    warn!("Request on client '{}' failed: {}", name, err);
                    EndpointError::send_failed(&name, err.to_string())
                });
                manager.store_value(key, outcome);
            });
            return Ok(());
        }

        let reply = self
            .handler
            .handle(message)
            .await
            .map_err(|err| EndpointError::send_failed(&self.name, err.to_string()))?;
        self.manager.store_value(key, Ok(reply));
        Ok(())
    }
}

#[async_trait]
impl Consumer for ClientInner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let key_name = self.configuration.correlator.key_name(&self.name);
        let key = self.manager.correlation_key(&key_name, context)?;
        self.receive_selective(&key, context, timeout).await
    }
}

#[async_trait]
impl SelectiveConsumer for ClientInner {
    async fn receive_selective(
        &self,
        selector: &str,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let selector = context.replace_dynamic_content(selector)?;
        let timeout = self.configuration.effective_timeout(timeout);

        self.manager
            .find_with_timeout(&selector, timeout)
            .await
            .ok_or_else(|| EndpointError::timeout(&self.name, timeout))?
    }
}
