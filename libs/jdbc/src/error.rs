use endpoint::EndpointError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum JdbcServerError {
    #[error("Maximum number of connections ({0}) reached")]
    MaxConnections(usize),

    /// Failure reported by the delegate handler
    #[error("{0}")]
    Operation(String),

    #[error("Invalid auto-handle query pattern: {0}")]
    InvalidPattern(String),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

impl JdbcServerError {
    pub fn operation(message: impl Into<String>) -> Self {
        JdbcServerError::Operation(message.into())
    }
}
