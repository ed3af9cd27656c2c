//! Error types for test context lookups

use thiserror::Error;

/// Errors raised while resolving variables, references or stored messages
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    /// Variable is not bound in the test context
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// No object of the requested type is bound under this name
    #[error("Unable to resolve reference '{name}' of type {type_name}")]
    UnresolvedReference {
        name: String,
        type_name: &'static str,
    },

    /// Message store has no entry for this name
    #[error("Unknown message '{0}' in message store")]
    UnknownMessage(String),
}
