use super::{MessageValidator, ValidationContext, IGNORE_PLACEHOLDER};
use crate::ValidationError;
use tracing::debug;
use types::{Message, MessageType, TestContext};

/// Compares payloads as text
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextValidator;

fn normalize(text: &str, ignore_whitespace: bool) -> String {
    if ignore_whitespace {
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        text.trim().to_string()
    }
}

impl MessageValidator for PlainTextValidator {
    fn name(&self) -> &str {
        "plaintext"
    }

    fn supports(&self, message_type: MessageType) -> bool {
        message_type == MessageType::Plaintext
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        _context: &TestContext,
        validation: &ValidationContext,
    ) -> Result<(), ValidationError> {
        if control.payload().is_empty() {
            debug!("Skip text payload validation as no control payload was defined");
            return Ok(());
        }

        let expected = normalize(&control.payload().as_text(), validation.ignore_whitespace);
        if expected == IGNORE_PLACEHOLDER {
            return Ok(());
        }
        let actual = normalize(&received.payload().as_text(), validation.ignore_whitespace);

        if expected != actual {
            return Err(ValidationError::TextMismatch { expected, actual });
        }
        debug!("Text validation successful: all values OK");
        Ok(())
    }
}
