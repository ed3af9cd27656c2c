use std::time::Duration;
use types::ContextError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum EndpointError {
    #[error(
        "Action timeout after {millis} milliseconds. Failed to receive message on endpoint: '{endpoint}'",
        millis = timeout.as_millis()
    )]
    Timeout { endpoint: String, timeout: Duration },

    #[error("Failed to send message on endpoint '{endpoint}': {reason}")]
    SendFailed { endpoint: String, reason: String },

    #[error("Invalid message selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid endpoint configuration: {0}")]
    Configuration(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error(transparent)]
    Context(#[from] ContextError),
}

impl EndpointError {
    pub fn timeout(endpoint: impl Into<String>, timeout: Duration) -> Self {
        EndpointError::Timeout {
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn send_failed(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        EndpointError::SendFailed {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        EndpointError::Configuration(reason.into())
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        EndpointError::Transport(reason.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EndpointError::Timeout { .. })
    }
}
