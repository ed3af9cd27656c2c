//! Named endpoint lookup and construction from settings

use crate::{
    DirectChannel, DirectEndpoint, DirectSyncEndpoint, Endpoint, EndpointConfiguration,
    EndpointError, QueueRegistry,
};
use dashmap::DashMap;
use framework_config::{EndpointKind, EndpointSettings, FrameworkSettings};
use std::sync::Arc;
use tracing::info;
use types::{ReferenceResolver, TestContext};

/// Make `endpoint` resolvable by name from every context sharing `resolver`
pub fn bind_endpoint(resolver: &ReferenceResolver, endpoint: Arc<dyn Endpoint>) {
    resolver.bind(endpoint.name().to_string(), endpoint);
}

pub fn resolve_endpoint(
    context: &TestContext,
    name: &str,
) -> Result<Arc<dyn Endpoint>, EndpointError> {
    Ok(context.resolver().resolve::<Arc<dyn Endpoint>>(name)?)
}

/// Builds endpoints from [`FrameworkSettings`]
///
/// Endpoints naming the same queue share it: direct endpoints share the
/// message queue, direct-sync endpoints share request queue and reply store.
#[derive(Debug, Default)]
pub struct EndpointFactory {
    queues: QueueRegistry,
    channels: DashMap<String, Arc<DirectChannel>>,
}

impl EndpointFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for `queue`, created on first use
    pub fn channel(&self, queue: &str) -> Arc<DirectChannel> {
        self.channels
            .entry(queue.to_string())
            .or_insert_with(|| Arc::new(DirectChannel::with_queue(self.queues.get_or_create(queue))))
            .clone()
    }

    pub fn create(
        &self,
        name: &str,
        settings: &EndpointSettings,
        framework: &FrameworkSettings,
    ) -> Result<Arc<dyn Endpoint>, EndpointError> {
        let queue = settings
            .queue
            .as_deref()
            .filter(|queue| !queue.is_empty())
            .ok_or_else(|| {
                EndpointError::configuration(format!("endpoint '{}' requires a queue name", name))
            })?;
        let configuration = EndpointConfiguration::from_settings(settings, &framework.defaults);

        let endpoint: Arc<dyn Endpoint> = match settings.kind {
            EndpointKind::Direct => Arc::new(DirectEndpoint::new(
                name,
                self.queues.get_or_create(queue),
                configuration,
            )),
            EndpointKind::DirectSync => Arc::new(DirectSyncEndpoint::new(
                name,
                self.channel(queue),
                configuration,
            )),
        };
        Ok(endpoint)
    }

    /// Build every declared endpoint and bind it into `resolver`
    pub fn bind_all(
        &self,
        framework: &FrameworkSettings,
        resolver: &ReferenceResolver,
    ) -> Result<usize, EndpointError> {
        let mut names: Vec<&String> = framework.endpoints.keys().collect();
        names.sort();

        for name in &names {
            let endpoint = self.create(name, &framework.endpoints[*name], framework)?;
            bind_endpoint(resolver, endpoint);
        }

        info!("Registered {} endpoints", names.len());
        Ok(names.len())
    }
}
