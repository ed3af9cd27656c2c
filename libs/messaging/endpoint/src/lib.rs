//! Endpoints for Trellis test cases
//!
//! An [`Endpoint`] is a named, configured gateway that hands out a
//! [`Producer`] and a [`SelectiveConsumer`]. Synchronous endpoints correlate
//! replies with requests through [`correlation`]; every blocking receive is a
//! deadline driven poll that reports [`EndpointError::Timeout`] when nothing
//! arrives.

pub mod adapter;
pub mod client;
pub mod configuration;
pub mod correlation;
pub mod direct;
pub mod direct_sync;
pub mod error;
pub mod polling;
pub mod queue;
pub mod registry;
pub mod selector;
pub mod test_utils;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use types::{Message, TestContext};

pub use adapter::{DirectEndpointAdapter, EmptyEndpointAdapter, EndpointAdapter, StaticEndpointAdapter};
pub use client::{ClientEndpoint, RequestHandler};
pub use configuration::EndpointConfiguration;
pub use correlation::{
    Correlator, DefaultMessageCorrelator, FnCorrelator, HeaderCorrelator,
    PollingCorrelationManager, ReplyStore,
};
pub use direct::DirectEndpoint;
pub use direct_sync::{DirectChannel, DirectSyncEndpoint};
pub use error::EndpointError;
pub use polling::Interrupt;
pub use queue::{MessageQueue, QueueRegistry};
pub use registry::{bind_endpoint, resolve_endpoint, EndpointFactory};
pub use selector::MessageSelector;

/// Named gateway to a messaging transport
pub trait Endpoint: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn configuration(&self) -> &EndpointConfiguration;

    fn create_producer(&self) -> Arc<dyn Producer>;

    fn create_consumer(&self) -> Arc<dyn SelectiveConsumer>;

    /// Drop pending inbound messages matching `selector`, returning the count
    fn purge(&self, _selector: Option<&MessageSelector>) -> usize {
        0
    }

    /// Wake pending receives, which then report a timeout
    fn interrupt(&self) {}
}

#[async_trait]
pub trait Producer: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: Message, context: &TestContext) -> Result<(), EndpointError>;
}

#[async_trait]
pub trait Consumer: Send + Sync {
    fn name(&self) -> &str;

    /// Next message; `None` uses the endpoint's configured timeout
    async fn receive(
        &self,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError>;
}

#[async_trait]
pub trait SelectiveConsumer: Consumer {
    /// Next message matching `selector`
    ///
    /// The selector syntax is transport specific: header conditions for
    /// queues, correlation keys for reply stores. `${var}` references are
    /// resolved against `context` first.
    async fn receive_selective(
        &self,
        selector: &str,
        context: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, EndpointError>;
}
