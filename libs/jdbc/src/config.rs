use framework_config::{defaults, JdbcSettings};

/// Behaviour of a [`crate::JdbcEndpointAdapterController`]
///
/// The `auto_*` flags answer the matching protocol steps locally instead of
/// asking the delegate handler.
#[derive(Debug, Clone, PartialEq)]
pub struct JdbcEndpointConfiguration {
    pub database_name: String,
    pub max_connections: usize,
    pub auto_connect: bool,
    pub auto_create_statement: bool,
    pub auto_transaction_handling: bool,
    /// Regular expressions matched against the whole query, ignoring case
    pub auto_handle_queries: Vec<String>,
}

impl Default for JdbcEndpointConfiguration {
    fn default() -> Self {
        Self {
            database_name: "testdb".to_string(),
            max_connections: defaults::jdbc::MAX_CONNECTIONS,
            auto_connect: true,
            auto_create_statement: true,
            auto_transaction_handling: true,
            auto_handle_queries: defaults::jdbc::AUTO_HANDLE_QUERIES
                .iter()
                .map(|q| q.to_string())
                .collect(),
        }
    }
}

impl JdbcEndpointConfiguration {
    pub fn new(database_name: impl Into<String>) -> Self {
        Self {
            database_name: database_name.into(),
            ..Self::default()
        }
    }

    /// Apply framework settings, including the auto-handle query override
    pub fn with_settings(mut self, settings: &JdbcSettings) -> Self {
        if let Some(max_connections) = settings.max_connections {
            self.max_connections = max_connections;
        }
        self.auto_handle_queries = settings.auto_handle_queries(&self.auto_handle_queries);
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_auto_connect(mut self, auto_connect: bool) -> Self {
        self.auto_connect = auto_connect;
        self
    }

    pub fn with_auto_create_statement(mut self, auto_create_statement: bool) -> Self {
        self.auto_create_statement = auto_create_statement;
        self
    }

    pub fn with_auto_transaction_handling(mut self, auto_transaction_handling: bool) -> Self {
        self.auto_transaction_handling = auto_transaction_handling;
        self
    }

    pub fn with_auto_handle_queries<I, S>(mut self, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.auto_handle_queries = queries.into_iter().map(Into::into).collect();
        self
    }

    /// Delegate every protocol step to the handler
    pub fn manual(self) -> Self {
        self.with_auto_connect(false)
            .with_auto_create_statement(false)
            .with_auto_transaction_handling(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_override() {
        let settings = JdbcSettings {
            auto_handle_query: Some("SELECT 2; VALUES 1 ;".to_string()),
            max_connections: Some(3),
        };
        let configuration = JdbcEndpointConfiguration::new("orders").with_settings(&settings);

        assert_eq!(configuration.max_connections, 3);
        assert_eq!(configuration.auto_handle_queries, vec!["SELECT 2", "VALUES 1"]);
    }

    #[test]
    fn test_manual() {
        let configuration = JdbcEndpointConfiguration::default().manual();
        assert!(!configuration.auto_connect);
        assert!(!configuration.auto_create_statement);
        assert!(!configuration.auto_transaction_handling);
        assert_eq!(configuration.max_connections, defaults::jdbc::MAX_CONNECTIONS);
    }
}
