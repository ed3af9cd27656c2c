use endpoint::EndpointError;
use serde::{Deserialize, Serialize};
use std::fmt;
use types::ContextError;

/// Failure category matched by `catch` and `assert-exception`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Validation,
    Protocol,
    Configuration,
    Runtime,
    Aggregate,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Validation => "validation",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mismatch found by a message validator
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Header '{0}' is missing in received message")]
    MissingHeader(String),

    #[error("Values not equal for header element '{name}', expected '{expected}' but was '{actual}'")]
    HeaderMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Text values not equal, expected '{expected}' but was '{actual}'")]
    TextMismatch { expected: String, actual: String },

    #[error("Values not equal for entry '{path}': {reason}")]
    JsonMismatch { path: String, reason: String },

    #[error("Failed to parse {side} JSON payload: {reason}")]
    InvalidJson { side: &'static str, reason: String },

    #[error("Unknown message validator '{0}'")]
    UnknownValidator(String),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActionError {
    #[error("{0}")]
    Timeout(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Invalid action configuration: {0}")]
    Configuration(String),

    #[error("{0}")]
    Runtime(String),

    #[error("Multiple actions failed: [{}]", join_errors(.0))]
    Aggregate(Vec<ActionError>),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Context(#[from] ContextError),
}

fn join_errors(errors: &[ActionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ValidationError> for ActionError {
    fn from(err: ValidationError) -> Self {
        ActionError::Validation(err.to_string())
    }
}

impl ActionError {
    pub fn validation(reason: impl Into<String>) -> Self {
        ActionError::Validation(reason.into())
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        ActionError::Configuration(reason.into())
    }

    pub fn runtime(reason: impl Into<String>) -> Self {
        ActionError::Runtime(reason.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Timeout(_) => ErrorKind::Timeout,
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::Protocol(_) => ErrorKind::Protocol,
            ActionError::Configuration(_) => ErrorKind::Configuration,
            ActionError::Runtime(_) | ActionError::Context(_) => ErrorKind::Runtime,
            ActionError::Aggregate(_) => ErrorKind::Aggregate,
            ActionError::Endpoint(err) => match err {
                EndpointError::Timeout { .. } => ErrorKind::Timeout,
                EndpointError::Configuration(_) | EndpointError::InvalidSelector { .. } => {
                    ErrorKind::Configuration
                }
                _ => ErrorKind::Runtime,
            },
        }
    }

    /// Collapse concurrent failures: one is reported as-is, several aggregate
    pub fn from_failures(mut failures: Vec<ActionError>) -> Option<ActionError> {
        match failures.len() {
            0 => None,
            1 => failures.pop(),
            _ => Some(ActionError::Aggregate(failures)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_endpoint_timeout_kind() {
        let err: ActionError = EndpointError::timeout("orders", Duration::from_millis(100)).into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.to_string().contains("100 milliseconds"));
    }

    #[test]
    fn test_from_failures() {
        assert!(ActionError::from_failures(vec![]).is_none());

        let single = ActionError::from_failures(vec![ActionError::runtime("A")]).unwrap();
        assert_eq!(single.kind(), ErrorKind::Runtime);
        assert_eq!(single.to_string(), "A");

        let aggregate = ActionError::from_failures(vec![
            ActionError::runtime("A"),
            ActionError::validation("B"),
        ])
        .unwrap();
        assert_eq!(aggregate.kind(), ErrorKind::Aggregate);
        assert_eq!(
            aggregate.to_string(),
            "Multiple actions failed: [A; Validation failed: B]"
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: ActionError = ValidationError::MissingHeader("operation".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
