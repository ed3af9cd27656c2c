//! Leaf actions

mod basic;
mod control;
mod messaging;

pub use basic::{
    CreateVariables, CreateVariablesConfig, Echo, EchoConfig, Fail, FailConfig, Sleep, SleepConfig,
};
pub use control::{StopTimer, StopTimerConfig, WaitAsync, WaitAsyncConfig};
pub use messaging::{
    PurgeConfig, PurgeEndpoint, ReceiveConfig, ReceiveMessage, ReceiveTimeout,
    ReceiveTimeoutConfig, SendConfig, SendMessage,
};

use crate::ActionError;
use endpoint::{resolve_endpoint, Endpoint};
use std::fmt;
use std::sync::Arc;
use types::TestContext;

/// Endpoint used by an action: a reference name or an inline instance
#[derive(Clone)]
pub enum EndpointRef {
    Named(String),
    Inline(Arc<dyn Endpoint>),
}

impl EndpointRef {
    pub fn resolve(&self, context: &TestContext) -> Result<Arc<dyn Endpoint>, ActionError> {
        match self {
            EndpointRef::Named(name) => {
                let name = context.replace_dynamic_content(name)?;
                Ok(resolve_endpoint(context, &name)?)
            }
            EndpointRef::Inline(endpoint) => Ok(endpoint.clone()),
        }
    }

    /// Name used in logs and default message store keys
    pub fn label(&self) -> &str {
        match self {
            EndpointRef::Named(name) => name,
            EndpointRef::Inline(endpoint) => endpoint.name(),
        }
    }
}

impl fmt::Debug for EndpointRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointRef::Named(name) => f.debug_tuple("Named").field(name).finish(),
            EndpointRef::Inline(endpoint) => f.debug_tuple("Inline").field(&endpoint.name()).finish(),
        }
    }
}

impl From<&str> for EndpointRef {
    fn from(name: &str) -> Self {
        EndpointRef::Named(name.to_string())
    }
}

impl From<String> for EndpointRef {
    fn from(name: String) -> Self {
        EndpointRef::Named(name)
    }
}

impl From<Arc<dyn Endpoint>> for EndpointRef {
    fn from(endpoint: Arc<dyn Endpoint>) -> Self {
        EndpointRef::Inline(endpoint)
    }
}
