use crate::data_set::{DataSet, DataSetCreator, DatabaseResult};
use crate::message::{headers, JdbcMessage, Operation, OperationResult};
use crate::{JdbcEndpointConfiguration, JdbcServerError};
use async_trait::async_trait;
use endpoint::{EndpointAdapter, EndpointError};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use types::message::value_to_string;
use types::{Message, MessageType};

/// Operations a database client performs against the server
#[async_trait]
pub trait JdbcController: Send + Sync {
    async fn open_connection(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), JdbcServerError>;

    async fn close_connection(&self) -> Result<(), JdbcServerError>;

    async fn create_statement(&self) -> Result<(), JdbcServerError>;

    async fn create_prepared_statement(&self, sql: &str) -> Result<(), JdbcServerError>;

    async fn create_callable_statement(&self, sql: &str) -> Result<(), JdbcServerError>;

    async fn close_statement(&self) -> Result<(), JdbcServerError>;

    async fn execute_query(&self, sql: &str) -> Result<DataSet, JdbcServerError>;

    async fn execute_statement(&self, sql: &str) -> Result<DatabaseResult, JdbcServerError>;

    async fn execute_update(&self, sql: &str) -> Result<i64, JdbcServerError>;

    async fn set_transaction_state(&self, transaction_state: bool) -> Result<(), JdbcServerError>;

    fn transaction_state(&self) -> bool;

    async fn commit_statements(&self) -> Result<(), JdbcServerError>;

    async fn rollback_statements(&self) -> Result<(), JdbcServerError>;
}

/// Protocol front of a database server endpoint
///
/// Tracks open connections and transaction state, answers configured
/// validation queries itself and hands every other request to the delegate
/// adapter, usually a test acting as the database.
#[derive(Debug)]
pub struct JdbcEndpointAdapterController {
    configuration: JdbcEndpointConfiguration,
    delegate: Arc<dyn EndpointAdapter>,
    data_set_creator: DataSetCreator,
    auto_handle_query: Option<Regex>,
    connections: AtomicUsize,
    transaction_state: AtomicBool,
}

impl JdbcEndpointAdapterController {
    pub fn new(
        configuration: JdbcEndpointConfiguration,
        delegate: Arc<dyn EndpointAdapter>,
    ) -> Result<Self, JdbcServerError> {
        let auto_handle_query = auto_handle_pattern(&configuration.auto_handle_queries)?;
        Ok(Self {
            configuration,
            delegate,
            data_set_creator: DataSetCreator,
            auto_handle_query,
            connections: AtomicUsize::new(0),
            transaction_state: AtomicBool::new(false),
        })
    }

    pub fn configuration(&self) -> &JdbcEndpointConfiguration {
        &self.configuration
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    fn is_auto_handled(&self, query: &str) -> bool {
        self.auto_handle_query
            .as_ref()
            .map_or(false, |pattern| pattern.is_match(query))
    }

    async fn process(&self, request: Message) -> Result<Message, JdbcServerError> {
        debug!(
            "Received request on server '{}': {}",
            self.configuration.database_name,
            request.payload().as_text()
        );

        let query = match Operation::from_message(&request) {
            Some(operation) => operation.sql().map(str::to_string),
            None => match request.message_type() {
                MessageType::Plaintext => Some(request.payload().as_text().into_owned()),
                _ => None,
            },
        };
        if let Some(query) = query.filter(|q| self.is_auto_handled(q)) {
            debug!("Auto handle query '{}' with positive response", query);
            return Ok(JdbcMessage::success_with_rows(0));
        }

        Ok(self
            .delegate
            .handle_message(request)
            .await?
            .unwrap_or_else(JdbcMessage::success))
    }

    async fn handle_and_check(&self, request: Message) -> Result<Message, JdbcServerError> {
        let response = self.process(request).await?;
        check_success(&response)?;
        Ok(response)
    }
}

fn auto_handle_pattern(queries: &[String]) -> Result<Option<Regex>, JdbcServerError> {
    let patterns: Vec<String> = queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .map(|q| format!("(?i)\\A(?:{})\\z", q))
        .collect();
    if patterns.is_empty() {
        return Ok(None);
    }
    Regex::new(&patterns.join("|"))
        .map(Some)
        .map_err(|err| JdbcServerError::InvalidPattern(err.to_string()))
}

/// Header flag first, then the payload's operation result, else success
fn check_success(response: &Message) -> Result<(), JdbcServerError> {
    let result = OperationResult::from_message(response);
    let success = match response.header(headers::SERVER_SUCCESS) {
        Some(Value::Bool(flag)) => *flag,
        Some(other) => value_to_string(other).eq_ignore_ascii_case("true"),
        None => result.as_ref().map_or(true, |r| r.success),
    };
    if success {
        return Ok(());
    }

    let message = response
        .header_str(headers::SERVER_EXCEPTION)
        .or_else(|| result.and_then(|r| r.exception))
        .unwrap_or_default();
    Err(JdbcServerError::Operation(message))
}

fn rows_updated(response: &Message) -> Result<Option<i64>, JdbcServerError> {
    response
        .header(headers::ROWS_UPDATED)
        .map(|value| {
            let text = value_to_string(value);
            text.trim().parse::<i64>().map_err(|_| {
                JdbcServerError::operation(format!("Invalid rows updated value '{}'", text))
            })
        })
        .transpose()
}

#[async_trait]
impl JdbcController for JdbcEndpointAdapterController {
    async fn open_connection(
        &self,
        properties: &BTreeMap<String, String>,
    ) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_connect {
            self.handle_and_check(JdbcMessage::open_connection(properties))
                .await?;
        }

        let max_connections = self.configuration.max_connections;
        self.connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (open < max_connections).then_some(open + 1)
            })
            .map_err(|_| JdbcServerError::MaxConnections(max_connections))?;
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_connect {
            self.handle_and_check(JdbcMessage::close_connection()).await?;
        }

        // Never below zero
        self.connections
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| open.checked_sub(1))
            .ok();
        Ok(())
    }

    async fn create_statement(&self) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_create_statement {
            self.handle_and_check(JdbcMessage::create_statement()).await?;
        }
        Ok(())
    }

    async fn create_prepared_statement(&self, sql: &str) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_create_statement {
            self.handle_and_check(JdbcMessage::create_prepared_statement(sql))
                .await?;
        }
        Ok(())
    }

    async fn create_callable_statement(&self, sql: &str) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_create_statement {
            self.handle_and_check(JdbcMessage::create_callable_statement(sql))
                .await?;
        }
        Ok(())
    }

    async fn close_statement(&self) -> Result<(), JdbcServerError> {
        if !self.configuration.auto_create_statement {
            self.handle_and_check(JdbcMessage::close_statement()).await?;
        }
        Ok(())
    }

    async fn execute_query(&self, sql: &str) -> Result<DataSet, JdbcServerError> {
        info!("Received execute query request: {}", sql);
        let response = self.handle_and_check(JdbcMessage::execute(sql)).await?;
        self.data_set_creator.create_data_set(&response)
    }

    async fn execute_statement(&self, sql: &str) -> Result<DatabaseResult, JdbcServerError> {
        info!("Received execute statement request: {}", sql);
        let response = self.handle_and_check(JdbcMessage::execute(sql)).await?;
        match rows_updated(&response)? {
            Some(rows) => Ok(DatabaseResult::RowsUpdated(rows)),
            None => Ok(DatabaseResult::DataSet(
                self.data_set_creator.create_data_set(&response)?,
            )),
        }
    }

    async fn execute_update(&self, sql: &str) -> Result<i64, JdbcServerError> {
        info!("Received execute update request: {}", sql);
        let response = self.handle_and_check(JdbcMessage::execute(sql)).await?;
        Ok(rows_updated(&response)?.unwrap_or(0))
    }

    async fn set_transaction_state(&self, transaction_state: bool) -> Result<(), JdbcServerError> {
        debug!(
            "Received transaction state change on '{}': {}",
            self.configuration.database_name, transaction_state
        );

        self.transaction_state
            .store(transaction_state, Ordering::SeqCst);
        if transaction_state && !self.configuration.auto_transaction_handling {
            self.handle_and_check(JdbcMessage::start_transaction())
                .await?;
        }
        Ok(())
    }

    fn transaction_state(&self) -> bool {
        self.transaction_state.load(Ordering::SeqCst)
    }

    async fn commit_statements(&self) -> Result<(), JdbcServerError> {
        debug!("Received transaction commit on '{}'", self.configuration.database_name);
        if !self.configuration.auto_transaction_handling {
            self.handle_and_check(JdbcMessage::commit_transaction())
                .await?;
        }
        Ok(())
    }

    async fn rollback_statements(&self) -> Result<(), JdbcServerError> {
        debug!("Received transaction rollback on '{}'", self.configuration.database_name);
        if !self.configuration.auto_transaction_handling {
            self.handle_and_check(JdbcMessage::rollback_transaction())
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EndpointAdapter for JdbcEndpointAdapterController {
    async fn handle_message(&self, request: Message) -> Result<Option<Message>, EndpointError> {
        match self.process(request).await {
            Ok(response) => Ok(Some(response)),
            Err(JdbcServerError::Endpoint(err)) => Err(err),
            Err(err) => Err(EndpointError::transport(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use endpoint::test_utils::RecordingEndpointAdapter;
    use serde_json::json;
    use tokio_test::assert_ok;
    use tracing_test::traced_test;

    fn controller(
        configuration: JdbcEndpointConfiguration,
    ) -> (JdbcEndpointAdapterController, Arc<RecordingEndpointAdapter>) {
        let delegate = Arc::new(RecordingEndpointAdapter::new());
        let controller = JdbcEndpointAdapterController::new(configuration, delegate.clone()).unwrap();
        (controller, delegate)
    }

    #[tokio::test]
    async fn test_connection_bound() {
        let (controller, delegate) =
            controller(JdbcEndpointConfiguration::default().with_max_connections(2));
        let properties = BTreeMap::new();

        controller.open_connection(&properties).await.unwrap();
        controller.open_connection(&properties).await.unwrap();
        let err = controller.open_connection(&properties).await.unwrap_err();
        assert!(matches!(err, JdbcServerError::MaxConnections(2)));
        assert_eq!(controller.connections(), 2);

        for _ in 0..4 {
            controller.close_connection().await.unwrap();
        }
        assert_eq!(controller.connections(), 0);
        assert!(delegate.requests().is_empty());
    }

    #[tokio::test]
    async fn test_manual_connect_delegates_and_checks() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default().manual());
        delegate.reply_with(Ok(Some(JdbcMessage::failure("access denied"))));

        let mut properties = BTreeMap::new();
        properties.insert("user".to_string(), "sa".to_string());
        let err = controller.open_connection(&properties).await.unwrap_err();
        assert_eq!(err.to_string(), "access denied");
        assert_eq!(controller.connections(), 0);

        controller.open_connection(&properties).await.unwrap();
        assert_eq!(controller.connections(), 1);
        let requests = delegate.requests();
        assert_eq!(
            requests[1].header_str(headers::OPERATION).as_deref(),
            Some("open_connection")
        );
    }

    #[tokio::test]
    #[traced_test]
    async fn test_auto_handled_query_bypasses_delegate() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default());

        let response = controller
            .handle_message(JdbcMessage::execute("select 1 from dual"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.header(headers::ROWS_UPDATED), Some(&json!(0)));
        assert_eq!(response.message_type(), MessageType::Json);

        let plain = assert_ok!(controller.handle_message(Message::new("SELECT 1")).await);
        assert!(plain.is_some());
        assert!(delegate.requests().is_empty());
        assert!(logs_contain("Auto handle query 'SELECT 1' with positive response"));

        controller
            .handle_message(JdbcMessage::execute("SELECT 1 FROM users"))
            .await
            .unwrap();
        assert_eq!(delegate.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_pattern_list_matches_nothing() {
        let (controller, delegate) = controller(
            JdbcEndpointConfiguration::default().with_auto_handle_queries(Vec::<String>::new()),
        );
        controller
            .handle_message(JdbcMessage::execute(""))
            .await
            .unwrap();
        assert_eq!(delegate.requests().len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = JdbcEndpointAdapterController::new(
            JdbcEndpointConfiguration::default().with_auto_handle_queries(["SELECT ("]),
            Arc::new(RecordingEndpointAdapter::new()),
        )
        .unwrap_err();
        assert!(matches!(err, JdbcServerError::InvalidPattern(_)));
    }

    #[tokio::test]
    async fn test_execute_results() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default());

        delegate.reply_with(Ok(Some(JdbcMessage::result_set(json!([{ "id": 7 }])))));
        let data_set = controller.execute_query("SELECT id FROM t").await.unwrap();
        assert_eq!(data_set.value(0, "id"), Some(&json!(7)));

        delegate.reply_with(Ok(Some(JdbcMessage::success_with_rows(3))));
        assert_eq!(
            controller.execute_statement("DELETE FROM t").await.unwrap(),
            DatabaseResult::RowsUpdated(3)
        );

        delegate.reply_with(Ok(Some(
            Message::new("").with_header(headers::ROWS_UPDATED, "5"),
        )));
        assert_eq!(controller.execute_update("UPDATE t SET a = 1").await.unwrap(), 5);

        // No reply means default success without rows
        assert_eq!(controller.execute_update("UPDATE t SET a = 2").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_message_precedence() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default());

        delegate.reply_with(Ok(Some(
            Message::new(json!({ "success": false, "exception": "from payload" }))
                .with_header(headers::SERVER_EXCEPTION, "from header"),
        )));
        let err = controller.execute_query("SELECT x").await.unwrap_err();
        assert_eq!(err.to_string(), "from header");

        delegate.reply_with(Ok(Some(Message::new(
            json!({ "success": false, "exception": "from payload" }),
        ))));
        let err = controller.execute_query("SELECT x").await.unwrap_err();
        assert_eq!(err.to_string(), "from payload");

        delegate.reply_with(Ok(Some(
            Message::new(json!({ "success": true })).with_header(headers::SERVER_SUCCESS, "false"),
        )));
        let err = controller.execute_query("SELECT x").await.unwrap_err();
        assert_eq!(err.to_string(), "");
    }

    #[tokio::test]
    async fn test_transaction_state() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default().manual());

        controller.set_transaction_state(true).await.unwrap();
        assert!(controller.transaction_state());
        controller.commit_statements().await.unwrap();
        controller.set_transaction_state(false).await.unwrap();
        controller.rollback_statements().await.unwrap();
        assert!(!controller.transaction_state());

        let operations: Vec<String> = delegate
            .requests()
            .iter()
            .filter_map(|r| r.header_str(headers::OPERATION))
            .collect();
        assert_eq!(
            operations,
            vec!["start_transaction", "commit_transaction", "rollback_transaction"]
        );
    }

    #[tokio::test]
    async fn test_failed_start_keeps_new_state() {
        let (controller, delegate) = controller(JdbcEndpointConfiguration::default().manual());
        delegate.reply_with(Ok(Some(JdbcMessage::failure("no transactions"))));

        assert!(controller.set_transaction_state(true).await.is_err());
        assert!(controller.transaction_state());
    }
}
