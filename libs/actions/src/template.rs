use crate::ActionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use types::{Message, MessageType, Payload, TestContext};

/// Message blueprint resolved against the test context at execution time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplate {
    /// String payloads are sent as text, anything else as JSON
    pub payload: Option<Value>,
    pub headers: BTreeMap<String, Value>,
    pub message_type: Option<String>,
    /// Name under which the message is kept in the message store
    pub name: Option<String>,
}

impl MessageTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            payload: Some(Value::String(payload.into())),
            ..Self::default()
        }
    }

    pub fn json(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = Some(message_type.as_str().to_string());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the message, replacing `${var}` references
    pub fn build(&self, context: &TestContext) -> Result<Message, ActionError> {
        let payload = match &self.payload {
            None => Payload::Empty,
            Some(Value::String(text)) => Payload::Text(text.clone()),
            Some(value) => Payload::Json(value.clone()),
        };

        let mut message = Message::new(payload).with_headers(self.headers.clone());
        if let Some(message_type) = &self.message_type {
            let parsed = MessageType::parse(message_type).ok_or_else(|| {
                ActionError::configuration(format!("Unknown message type '{}'", message_type))
            })?;
            message = message.with_message_type(parsed);
        }
        if let Some(name) = &self.name {
            message = message.with_name(name.clone());
        }

        Ok(context.replace_message_content(&message)?)
    }
}
