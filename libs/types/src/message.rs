use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Reserved header names
pub mod headers {
    /// Common prefix of every framework header
    pub const PREFIX: &str = "trellis_";

    /// Message id, always equal to [`super::Message::id`]
    pub const ID: &str = "trellis_message_id";

    /// Creation timestamp (RFC 3339)
    pub const TIMESTAMP: &str = "trellis_message_timestamp";

    /// Message type tag
    pub const MESSAGE_TYPE: &str = "trellis_message_type";

    /// Name of the endpoint a reply should be sent to
    pub const REPLY_TO: &str = "trellis_reply_to";
}

/// Content type tag driving validator selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[default]
    Plaintext,
    Json,
    Xml,
    Binary,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Plaintext => "PLAINTEXT",
            MessageType::Json => "JSON",
            MessageType::Xml => "XML",
            MessageType::Binary => "BINARY",
        }
    }

    /// Parse a type name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "PLAINTEXT" => Some(MessageType::Plaintext),
            "JSON" => Some(MessageType::Json),
            "XML" => Some(MessageType::Xml),
            "BINARY" => Some(MessageType::Binary),
            _ => None,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Json(Value),
    Bytes(Vec<u8>),
}

impl Payload {
    /// Text view of the payload; JSON is rendered compactly, bytes lossily
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Payload::Empty => Cow::Borrowed(""),
            Payload::Text(text) => Cow::Borrowed(text.as_str()),
            Payload::Json(value) => Cow::Owned(value.to_string()),
            Payload::Bytes(bytes) => String::from_utf8_lossy(bytes),
        }
    }

    /// JSON view of the payload, parsing text when possible
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value.clone()),
            Payload::Text(text) => serde_json::from_str(text).ok(),
            Payload::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
            Payload::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Payload::Empty => true,
            Payload::Text(text) => text.is_empty(),
            Payload::Json(value) => value.is_null(),
            Payload::Bytes(bytes) => bytes.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Payload::Bytes(bytes) => bytes.len(),
            other => other.as_text().len(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

/// Protocol-agnostic message envelope
///
/// Identity is by [`Message::id`]. Headers carry protocol metadata (operation
/// names, status codes, row counts) and may be changed until the message is
/// dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: Uuid,
    timestamp: DateTime<Utc>,
    payload: Payload,
    headers: BTreeMap<String, Value>,
    message_type: MessageType,
    name: Option<String>,
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Payload::Empty)
    }
}

impl Message {
    /// Create a message with a fresh id
    pub fn new(payload: impl Into<Payload>) -> Self {
        let payload = payload.into();
        let message_type = match payload {
            Payload::Json(_) => MessageType::Json,
            Payload::Bytes(_) => MessageType::Binary,
            _ => MessageType::Plaintext,
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
            headers: BTreeMap::new(),
            message_type,
            name: None,
        }
    }

    /// Create a reply that shares the id of `request`, so id based
    /// correlation matches the two.
    pub fn reply_for(request: &Message, payload: impl Into<Payload>) -> Self {
        Self::new(payload).with_id(request.id)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// User headers (reserved id/timestamp/type are exposed through [`Message::header_str`])
    pub fn headers(&self) -> &BTreeMap<String, Value> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Header value rendered as string, including the reserved headers
    pub fn header_str(&self, name: &str) -> Option<String> {
        match name {
            headers::ID => Some(self.id.to_string()),
            headers::TIMESTAMP => Some(self.timestamp.to_rfc3339()),
            headers::MESSAGE_TYPE => Some(self.message_type.as_str().to_string()),
            _ => self.headers.get(name).map(value_to_string),
        }
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();

        if name == headers::MESSAGE_TYPE {
            if let Some(message_type) = value.as_str().and_then(MessageType::parse) {
                self.message_type = message_type;
            }
            return;
        }

        self.headers.insert(name, value);
    }

    pub fn remove_header(&mut self, name: &str) -> Option<Value> {
        self.headers.remove(name)
    }

    pub fn set_payload(&mut self, payload: impl Into<Payload>) {
        self.payload = payload.into();
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        for (name, value) in headers {
            self.set_header(name, value);
        }
        self
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message[id: {}, type: {}, headers: {:?}, payload: {}]",
            self.id,
            self.message_type,
            self.headers,
            self.payload.as_text()
        )
    }
}

/// Render a header value without JSON quoting for strings
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
