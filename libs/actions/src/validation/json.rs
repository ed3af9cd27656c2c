use super::{MessageValidator, ValidationContext, IGNORE_PLACEHOLDER};
use crate::ValidationError;
use serde_json::Value;
use tracing::debug;
use types::{Message, MessageType, TestContext};

/// Structural JSON comparison; `@ignore@` matches any value
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonTextValidator;

impl MessageValidator for JsonTextValidator {
    fn name(&self) -> &str {
        "json"
    }

    fn supports(&self, message_type: MessageType) -> bool {
        message_type == MessageType::Json
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        _context: &TestContext,
        validation: &ValidationContext,
    ) -> Result<(), ValidationError> {
        if control.payload().is_empty() {
            debug!("Skip JSON payload validation as no control payload was defined");
            return Ok(());
        }

        let expected = parse(control, "control")?;
        let actual = parse(received, "received")?;
        compare("$", &expected, &actual, validation.strict)?;

        debug!("JSON validation successful: all values OK");
        Ok(())
    }
}

fn parse(message: &Message, side: &'static str) -> Result<Value, ValidationError> {
    match message.payload() {
        types::Payload::Json(value) => Ok(value.clone()),
        other => serde_json::from_str(&other.as_text()).map_err(|err| {
            ValidationError::InvalidJson {
                side,
                reason: err.to_string(),
            }
        }),
    }
}

fn mismatch(path: &str, reason: String) -> ValidationError {
    ValidationError::JsonMismatch {
        path: path.to_string(),
        reason,
    }
}

fn compare(path: &str, expected: &Value, actual: &Value, strict: bool) -> Result<(), ValidationError> {
    if expected.as_str() == Some(IGNORE_PLACEHOLDER) {
        return Ok(());
    }

    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => {
            for (key, value) in expected {
                let child = format!("{}.{}", path, key);
                let found = actual
                    .get(key)
                    .ok_or_else(|| mismatch(&child, "missing in received message".to_string()))?;
                compare(&child, value, found, strict)?;
            }
            if strict {
                if let Some(extra) = actual.keys().find(|key| !expected.contains_key(*key)) {
                    return Err(mismatch(
                        &format!("{}.{}", path, extra),
                        "not expected in strict mode".to_string(),
                    ));
                }
            }
            Ok(())
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return Err(mismatch(
                    path,
                    format!(
                        "expected {} elements but was {}",
                        expected.len(),
                        actual.len()
                    ),
                ));
            }
            for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
                compare(&format!("{}[{}]", path, i), e, a, strict)?;
            }
            Ok(())
        }
        (expected, actual) if expected == actual => Ok(()),
        (expected, actual) => Err(mismatch(
            path,
            format!("expected '{}' but was '{}'", expected, actual),
        )),
    }
}
