//! Server side bridges from inbound requests to test-controlled replies

use crate::correlation::{PollingCorrelationManager, CORRELATION_KEY_HEADER};
use crate::polling::Interrupt;
use crate::{DirectChannel, EndpointConfiguration, EndpointError};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;
use types::Message;

/// Produces the reply for an inbound request; `None` means no reply
#[async_trait]
pub trait EndpointAdapter: Send + Sync + Debug {
    async fn handle_message(&self, request: Message) -> Result<Option<Message>, EndpointError>;
}

/// Answers every request with a copy of a fixed message
#[derive(Debug, Clone)]
pub struct StaticEndpointAdapter {
    reply: Message,
}

impl StaticEndpointAdapter {
    pub fn new(reply: Message) -> Self {
        Self { reply }
    }
}

#[async_trait]
impl EndpointAdapter for StaticEndpointAdapter {
    async fn handle_message(&self, _request: Message) -> Result<Option<Message>, EndpointError> {
        Ok(Some(self.reply.clone()))
    }
}

/// Accepts every request without replying
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyEndpointAdapter;

#[async_trait]
impl EndpointAdapter for EmptyEndpointAdapter {
    async fn handle_message(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        debug!("Discarding request {}", request.id());
        Ok(None)
    }
}

/// Forwards requests into a [`DirectChannel`] and waits for the test's reply
///
/// A test case on the other side receives the request through a
/// [`crate::DirectSyncEndpoint`] bound to the same channel and sends the
/// reply back through it.
#[derive(Debug)]
pub struct DirectEndpointAdapter {
    channel: Arc<DirectChannel>,
    configuration: EndpointConfiguration,
    manager: PollingCorrelationManager<Message>,
}

impl DirectEndpointAdapter {
    pub fn new(channel: Arc<DirectChannel>, configuration: EndpointConfiguration) -> Self {
        let manager = PollingCorrelationManager::new(
            channel.replies().clone(),
            configuration.polling_interval,
            Arc::new(Interrupt::new()),
            format!("reply message on channel '{}'", channel.name()),
        );
        Self {
            channel,
            configuration,
            manager,
        }
    }

    pub fn channel(&self) -> &Arc<DirectChannel> {
        &self.channel
    }
}

#[async_trait]
impl EndpointAdapter for DirectEndpointAdapter {
    async fn handle_message(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        let key = self.configuration.correlator.correlation_key(&request);
        debug!(
            "Forwarding request {} to channel '{}'",
            request.id(),
            self.channel.name()
        );
        self.channel
            .requests()
            .send(request.with_header(CORRELATION_KEY_HEADER, key.clone()));

        let timeout = self.configuration.timeout;
        self.manager
            .find_with_timeout(&key, timeout)
            .await
            .map(Some)
            .ok_or_else(|| EndpointError::timeout(self.channel.name(), timeout))
    }
}
