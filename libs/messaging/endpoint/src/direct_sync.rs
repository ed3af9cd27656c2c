//! Request/reply over an in-memory channel
//!
//! A [`DirectChannel`] pairs a request queue with a reply store. The client
//! side of a [`DirectSyncEndpoint`] enqueues requests and polls the store
//! for the reply under its saved correlation key; the server side takes
//! requests from the queue and stores replies under the requester's key.

use crate::correlation::{request_key, PollingCorrelationManager, CORRELATION_KEY_HEADER};
use crate::polling::Interrupt;
use crate::{
    Consumer, Endpoint, EndpointConfiguration, EndpointError, MessageQueue, MessageSelector,
    Producer, ReplyStore, SelectiveConsumer,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use types::{Message, TestContext};

/// Request queue and reply store shared by both sides of a sync exchange
#[derive(Debug)]
pub struct DirectChannel {
    requests: Arc<MessageQueue>,
    replies: Arc<ReplyStore<Message>>,
}

impl DirectChannel {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_queue(Arc::new(MessageQueue::new(name)))
    }

    pub fn with_queue(requests: Arc<MessageQueue>) -> Self {
        Self {
            requests,
            replies: Arc::new(ReplyStore::new()),
        }
    }

    pub fn name(&self) -> &str {
        self.requests.name()
    }

    pub fn requests(&self) -> &Arc<MessageQueue> {
        &self.requests
    }

    pub fn replies(&self) -> &Arc<ReplyStore<Message>> {
        &self.replies
    }
}

#[derive(Debug)]
enum Role {
    Client(Arc<SyncClient>),
    Server(Arc<SyncServer>),
}

/// Endpoint acting as requester or responder on a [`DirectChannel`]
///
/// The role is fixed by the first of `create_producer` (client) or
/// `create_consumer` (server); afterwards both calls return the same object.
#[derive(Debug)]
pub struct DirectSyncEndpoint {
    name: String,
    configuration: EndpointConfiguration,
    channel: Arc<DirectChannel>,
    interrupt: Arc<Interrupt>,
    role: Mutex<Option<Role>>,
}

impl DirectSyncEndpoint {
    pub fn new(
        name: impl Into<String>,
        channel: Arc<DirectChannel>,
        configuration: EndpointConfiguration,
    ) -> Self {
        Self {
            name: name.into(),
            configuration,
            channel,
            interrupt: Arc::new(Interrupt::new()),
            role: Mutex::new(None),
        }
    }

    pub fn channel(&self) -> &Arc<DirectChannel> {
        &self.channel
    }

    fn manager(&self) -> PollingCorrelationManager<Message> {
        PollingCorrelationManager::new(
            self.channel.replies.clone(),
            self.configuration.polling_interval,
            self.interrupt.clone(),
            format!("reply message on endpoint '{}'", self.name),
        )
    }

    fn client(&self) -> Arc<SyncClient> {
        Arc::new(SyncClient {
            name: self.name.clone(),
            configuration: self.configuration.clone(),
            channel: self.channel.clone(),
            manager: self.manager(),
        })
    }

    fn server(&self) -> Arc<SyncServer> {
        Arc::new(SyncServer {
            name: self.name.clone(),
            configuration: self.configuration.clone(),
            channel: self.channel.clone(),
            manager: self.manager(),
            interrupt: self.interrupt.clone(),
        })
    }
}

impl Endpoint for DirectSyncEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn configuration(&self) -> &EndpointConfiguration {
        &self.configuration
    }

    fn create_producer(&self) -> Arc<dyn Producer> {
        let mut role = self.role.lock();
        match &*role {
            Some(Role::Client(client)) => client.clone() as Arc<dyn Producer>,
            Some(Role::Server(server)) => server.clone() as Arc<dyn Producer>,
            None => {
                let client = self.client();
                *role = Some(Role::Client(client.clone()));
                client as Arc<dyn Producer>
            }
        }
    }

    fn create_consumer(&self) -> Arc<dyn SelectiveConsumer> {
        let mut role = self.role.lock();
        match &*role {
            Some(Role::Client(client)) => client.clone() as Arc<dyn SelectiveConsumer>,
            Some(Role::Server(server)) => server.clone() as Arc<dyn SelectiveConsumer>,
            None => {
                let server = self.server();
                *role = Some(Role::Server(server.clone()));
                server as Arc<dyn SelectiveConsumer>
            }
        }
    }

    /// On the client side replies live on the shared channel: a purge
    /// without a selector drops pending replies of every client on it
    fn purge(&self, selector: Option<&MessageSelector>) -> usize {
        match &*self.role.lock() {
            Some(Role::Client(_)) => match selector {
                Some(selector) => self.channel.replies.remove_where(|m| selector.matches(m)),
                None => self.channel.replies.clear(),
            },
            _ => self.channel.requests.purge(selector),
        }
    }

    fn interrupt(&self) {
        self.interrupt.interrupt();
    }
}

/// Requesting side
#[derive(Debug)]
struct SyncClient {
    name: String,
    configuration: EndpointConfiguration,
    channel: Arc<DirectChannel>,
    manager: PollingCorrelationManager<Message>,
}

#[async_trait]
impl Producer for SyncClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, message: Message, context: &TestContext) -> Result<(), EndpointError> {
        let correlator = &self.configuration.correlator;
        let key = correlator.correlation_key(&message);
        self.manager
            .save_correlation_key(&correlator.key_name(&self.name), &key, context);

        debug!(
            "Sending request {} on endpoint '{}'",
            message.id(),
            self.name
        );
        self.channel
            .requests
            .send(message.with_header(CORRELATION_KEY_HEADER, key));
        Ok(())
    }
}

#[async_trait]
impl Consumer for SyncClient {
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
impl SelectiveConsumer for SyncClient {
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
            .ok_or_else(|| EndpointError::timeout(&self.name, timeout))
    }
}

/// Responding side
#[derive(Debug)]
struct SyncServer {
    name: String,
    configuration: EndpointConfiguration,
    channel: Arc<DirectChannel>,
    manager: PollingCorrelationManager<Message>,
    interrupt: Arc<Interrupt>,
}

impl SyncServer {
    async fn receive_request(
        &self,
        selector: Option<&MessageSelector>,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let timeout = self.configuration.effective_timeout(timeout);
        let request = self
            .channel
            .requests
            .receive(
                selector,
                timeout,
                self.configuration.polling_interval,
                &self.interrupt,
            )
            .await
            .ok_or_else(|| EndpointError::timeout(&self.name, timeout))?;

        let correlator = &self.configuration.correlator;
        let key = request_key(correlator.as_ref(), &request);
        self.manager
            .save_correlation_key(&correlator.key_name(&self.name), &key, context);
        Ok(request)
    }
}

#[async_trait]
impl Producer for SyncServer {
    fn name(&self) -> &str {
        &self.name
    }

    /// Store `message` as the reply to the last received request
    async fn send(&self, message: Message, context: &TestContext) -> Result<(), EndpointError> {
        let correlator = &self.configuration.correlator;
        let key_name = correlator.key_name(&self.name);

        let key = self
            .manager
            .correlation_key(&key_name, context)
            .unwrap_or_else(|_| {
                warn!(
                    "No request received on endpoint '{}', correlating reply by its own key",
                    self.name
                );
                request_key(correlator.as_ref(), &message)
            });

        debug!("Storing reply {} on endpoint '{}'", message.id(), self.name);
        self.manager.store_value(key, message);
        Ok(())
    }
}

#[async_trait]
impl Consumer for SyncServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn receive(
        &self,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        self.receive_request(None, context, timeout).await
    }
}

#[async_trait]
impl SelectiveConsumer for SyncServer {
    async fn receive_selective(
        &self,
        selector: &str,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError> {
        let resolved = context.replace_dynamic_content(selector)?;
        let selector = MessageSelector::parse(&resolved)?;
        self.receive_request(Some(&selector), context, timeout).await
    }
}
