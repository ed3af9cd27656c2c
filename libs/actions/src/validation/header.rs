use super::{MessageValidator, ValidationContext, IGNORE_PLACEHOLDER};
use crate::ValidationError;
use tracing::debug;
use types::message::value_to_string;
use types::{Message, MessageType, TestContext};

/// Every control header must be present with an equal value
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderValidator;

impl MessageValidator for HeaderValidator {
    fn name(&self) -> &str {
        "header"
    }

    fn supports(&self, _message_type: MessageType) -> bool {
        true
    }

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        _context: &TestContext,
        _validation: &ValidationContext,
    ) -> Result<(), ValidationError> {
        for (name, expected) in control.headers() {
            let expected = value_to_string(expected);
            if expected == IGNORE_PLACEHOLDER {
                debug!("Ignoring header '{}'", name);
                continue;
            }

            let actual = received
                .header_str(name)
                .ok_or_else(|| ValidationError::MissingHeader(name.clone()))?;
            if actual != expected {
                return Err(ValidationError::HeaderMismatch {
                    name: name.clone(),
                    expected,
                    actual,
                });
            }
        }

        debug!("Header validation successful: all values OK");
        Ok(())
    }
}
