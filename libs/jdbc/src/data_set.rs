//! Query results handed back to the database client

use crate::message::OperationResult;
use crate::JdbcServerError;
use serde::Serialize;
use serde_json::{Map, Value};
use types::Message;

/// Rows of a query result; columns follow the key order of the first row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DataSet {
    columns: Vec<String>,
    rows: Vec<Map<String, Value>>,
}

impl DataSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }
}

/// Outcome of `execute_statement`
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseResult {
    DataSet(DataSet),
    RowsUpdated(i64),
}

/// Maps a handler reply onto a [`DataSet`]
///
/// Accepted payloads: a JSON array of row objects, or an operation result
/// whose `data_set` holds such an array. Anything else is an empty data set.
#[derive(Debug, Default, Clone, Copy)]
pub struct DataSetCreator;

impl DataSetCreator {
    pub fn create_data_set(&self, response: &Message) -> Result<DataSet, JdbcServerError> {
        let rows = match response.payload().to_json() {
            Some(Value::Array(rows)) => rows,
            Some(Value::Object(_)) => match OperationResult::from_message(response)
                .and_then(|result| result.data_set)
            {
                Some(Value::Array(rows)) => rows,
                Some(other) => {
                    return Err(JdbcServerError::operation(format!(
                        "Data set must be an array of rows but was: {}",
                        other
                    )))
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        rows.into_iter()
            .map(|row| match row {
                Value::Object(columns) => Ok(columns),
                other => Err(JdbcServerError::operation(format!(
                    "Data set row must be an object but was: {}",
                    other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(DataSet::from_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JdbcMessage;
    use serde_json::json;

    #[test]
    fn test_data_set_from_array_payload() {
        let response = Message::new(json!([
            { "id": 1, "name": "alice" },
            { "id": 2, "name": "bob" }
        ]));
        let data_set = DataSetCreator.create_data_set(&response).unwrap();

        assert_eq!(data_set.len(), 2);
        assert_eq!(data_set.columns(), &["id".to_string(), "name".to_string()]);
        assert_eq!(data_set.value(1, "name"), Some(&json!("bob")));
    }

    #[test]
    fn test_data_set_from_operation_result() {
        let response = JdbcMessage::result_set(json!([{ "count": 3 }]));
        let data_set = DataSetCreator.create_data_set(&response).unwrap();
        assert_eq!(data_set.value(0, "count"), Some(&json!(3)));
    }

    #[test]
    fn test_empty_data_set() {
        for response in [JdbcMessage::success(), Message::new("not json"), Message::default()] {
            assert!(DataSetCreator.create_data_set(&response).unwrap().is_empty());
        }
    }

    #[test]
    fn test_invalid_rows_rejected() {
        let response = Message::new(json!([1, 2]));
        let err = DataSetCreator.create_data_set(&response).unwrap_err();
        assert_eq!(err.to_string(), "Data set row must be an object but was: 1");
    }
}
