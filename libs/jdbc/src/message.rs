//! Database operations exchanged with the delegate handler

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use types::{Message, MessageType};

/// Reserved JDBC headers
pub mod headers {
    /// Name of the operation carried by a request
    pub const OPERATION: &str = "trellis_jdbc_operation";

    /// Row count reported by an update or statement reply
    pub const ROWS_UPDATED: &str = "trellis_jdbc_rows_updated";

    /// Explicit success flag of a reply, overriding the payload
    pub const SERVER_SUCCESS: &str = "trellis_jdbc_server_success";

    /// Error message of a failed reply
    pub const SERVER_EXCEPTION: &str = "trellis_jdbc_server_exception";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    OpenConnection { properties: Vec<Property> },
    CloseConnection,
    CreateStatement,
    CreatePreparedStatement { sql: String },
    CreateCallableStatement { sql: String },
    CloseStatement,
    Execute { sql: String },
    StartTransaction,
    CommitTransaction,
    RollbackTransaction,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::OpenConnection { .. } => "open_connection",
            Operation::CloseConnection => "close_connection",
            Operation::CreateStatement => "create_statement",
            Operation::CreatePreparedStatement { .. } => "create_prepared_statement",
            Operation::CreateCallableStatement { .. } => "create_callable_statement",
            Operation::CloseStatement => "close_statement",
            Operation::Execute { .. } => "execute",
            Operation::StartTransaction => "start_transaction",
            Operation::CommitTransaction => "commit_transaction",
            Operation::RollbackTransaction => "rollback_transaction",
        }
    }

    /// SQL of an `execute` operation
    pub fn sql(&self) -> Option<&str> {
        match self {
            Operation::Execute { sql } => Some(sql),
            _ => None,
        }
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        message
            .payload()
            .to_json()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    fn to_json(&self) -> Value {
        match self {
            Operation::OpenConnection { properties } => {
                json!({ "open_connection": { "properties": properties_json(properties) } })
            }
            Operation::CreatePreparedStatement { sql }
            | Operation::CreateCallableStatement { sql }
            | Operation::Execute { sql } => json!({ self.name(): { "sql": sql } }),
            _ => Value::String(self.name().to_string()),
        }
    }
}

fn properties_json(properties: &[Property]) -> Value {
    properties
        .iter()
        .map(|p| json!({ "name": p.name, "value": p.value }))
        .collect()
}

/// Structured reply of the delegate handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set: Option<Value>,
}

impl OperationResult {
    /// Result carried by a JSON payload, if the payload is one
    pub fn from_message(message: &Message) -> Option<Self> {
        message
            .payload()
            .to_json()
            .filter(Value::is_object)
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

/// Constructors for JDBC request and reply messages
pub struct JdbcMessage;

impl JdbcMessage {
    pub fn request(operation: Operation) -> Message {
        Message::new(operation.to_json()).with_header(headers::OPERATION, operation.name())
    }

    /// Open request; properties are sorted by name
    pub fn open_connection(properties: &BTreeMap<String, String>) -> Message {
        let properties = properties
            .iter()
            .map(|(name, value)| Property {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        Self::request(Operation::OpenConnection { properties })
    }

    pub fn close_connection() -> Message {
        Self::request(Operation::CloseConnection)
    }

    pub fn create_statement() -> Message {
        Self::request(Operation::CreateStatement)
    }

    pub fn create_prepared_statement(sql: impl Into<String>) -> Message {
        Self::request(Operation::CreatePreparedStatement { sql: sql.into() })
    }

    pub fn create_callable_statement(sql: impl Into<String>) -> Message {
        Self::request(Operation::CreateCallableStatement { sql: sql.into() })
    }

    pub fn close_statement() -> Message {
        Self::request(Operation::CloseStatement)
    }

    pub fn execute(sql: impl Into<String>) -> Message {
        Self::request(Operation::Execute { sql: sql.into() })
    }

    pub fn start_transaction() -> Message {
        Self::request(Operation::StartTransaction)
    }

    pub fn commit_transaction() -> Message {
        Self::request(Operation::CommitTransaction)
    }

    pub fn rollback_transaction() -> Message {
        Self::request(Operation::RollbackTransaction)
    }

    pub fn success() -> Message {
        Message::new(json!({ "success": true })).with_header(headers::SERVER_SUCCESS, true)
    }

    pub fn success_with_rows(rows_updated: i64) -> Message {
        Self::success()
            .with_header(headers::ROWS_UPDATED, rows_updated)
            .with_message_type(MessageType::Json)
    }

    /// Successful reply carrying `rows` as data set
    pub fn result_set(rows: Value) -> Message {
        Message::new(json!({ "success": true, "data_set": rows }))
            .with_header(headers::SERVER_SUCCESS, true)
    }

    pub fn failure(exception: impl Into<String>) -> Message {
        let exception = exception.into();
        Message::new(json!({ "success": false, "exception": exception }))
            .with_header(headers::SERVER_SUCCESS, false)
            .with_header(headers::SERVER_EXCEPTION, exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_payload_parses_back() {
        let request = JdbcMessage::execute("SELECT * FROM users");
        assert_eq!(request.header_str(headers::OPERATION).as_deref(), Some("execute"));
        assert_eq!(
            Operation::from_message(&request),
            Some(Operation::Execute {
                sql: "SELECT * FROM users".to_string()
            })
        );

        let close = JdbcMessage::close_connection();
        assert_eq!(close.payload().to_json(), Some(json!("close_connection")));
        assert_eq!(Operation::from_message(&close), Some(Operation::CloseConnection));
    }

    #[test]
    fn test_open_connection_properties_sorted() {
        let mut properties = BTreeMap::new();
        properties.insert("user".to_string(), "sa".to_string());
        properties.insert("database".to_string(), "testdb".to_string());

        let request = JdbcMessage::open_connection(&properties);
        let Some(Operation::OpenConnection { properties }) = Operation::from_message(&request)
        else {
            panic!("expected open connection operation");
        };
        let names: Vec<&str> = properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["database", "user"]);
    }

    #[test]
    fn test_operation_result_requires_success_flag() {
        let failure = JdbcMessage::failure("locked");
        let result = OperationResult::from_message(&failure).unwrap();
        assert!(!result.success);
        assert_eq!(result.exception.as_deref(), Some("locked"));

        assert!(OperationResult::from_message(&Message::new(json!({ "rows": 1 }))).is_none());
        assert!(OperationResult::from_message(&Message::new("plain text")).is_none());
    }
}
