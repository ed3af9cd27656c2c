//! Received message validation
//!
//! A receive action compares the received message against a control
//! message. Validators are picked explicitly by name or looked up by the
//! received message type; the header validator applies to every type.

mod header;
mod json;
mod text;

pub use header::HeaderValidator;
pub use json::JsonTextValidator;
pub use text::PlainTextValidator;

use crate::ValidationError;
use parking_lot::RwLock;
use std::fmt::Debug;
use std::sync::Arc;
use types::{Message, MessageType, TestContext};

/// Placeholder accepting any value
pub const IGNORE_PLACEHOLDER: &str = "@ignore@";

/// Reference name of a suite-wide [`ValidatorRegistry`]
pub const VALIDATOR_REGISTRY: &str = "trellis_validator_registry";

/// Validation options of one receive action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationContext {
    /// Received JSON objects may not carry fields absent from the control
    pub strict: bool,
    /// Collapse whitespace before comparing plain text
    pub ignore_whitespace: bool,
}

pub trait MessageValidator: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn supports(&self, message_type: MessageType) -> bool;

    fn validate(
        &self,
        received: &Message,
        control: &Message,
        context: &TestContext,
        validation: &ValidationContext,
    ) -> Result<(), ValidationError>;
}

/// Ordered set of validators shared by the test cases of a suite
#[derive(Debug, Clone)]
pub struct ValidatorRegistry {
    validators: Arc<RwLock<Vec<Arc<dyn MessageValidator>>>>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        let validators: Vec<Arc<dyn MessageValidator>> = vec![
            Arc::new(HeaderValidator),
            Arc::new(PlainTextValidator),
            Arc::new(JsonTextValidator),
        ];
        Self {
            validators: Arc::new(RwLock::new(validators)),
        }
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry bound in the context's resolver, or the default set
    pub fn lookup(context: &TestContext) -> Self {
        context
            .resolver()
            .resolve::<ValidatorRegistry>(VALIDATOR_REGISTRY)
            .unwrap_or_default()
    }

    /// Add a validator; one with the same name is replaced
    pub fn register(&self, validator: Arc<dyn MessageValidator>) {
        let mut validators = self.validators.write();
        validators.retain(|existing| existing.name() != validator.name());
        validators.push(validator);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn MessageValidator>, ValidationError> {
        self.validators
            .read()
            .iter()
            .find(|validator| validator.name() == name)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownValidator(name.to_string()))
    }

    /// Validators supporting `message_type`, in registration order
    pub fn for_type(&self, message_type: MessageType) -> Vec<Arc<dyn MessageValidator>> {
        self.validators
            .read()
            .iter()
            .filter(|validator| validator.supports(message_type))
            .cloned()
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.validators
            .read()
            .iter()
            .map(|validator| validator.name().to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_type() {
        let registry = ValidatorRegistry::new();
        let names = |t| {
            registry
                .for_type(t)
                .iter()
                .map(|v| v.name().to_string())
                .collect::<Vec<_>>()
        };

        assert_eq!(names(MessageType::Json), vec!["header", "json"]);
        assert_eq!(names(MessageType::Plaintext), vec!["header", "plaintext"]);
        assert_eq!(names(MessageType::Binary), vec!["header"]);
    }

    #[test]
    fn test_registry_from_context() {
        let context = TestContext::new();
        assert_eq!(ValidatorRegistry::lookup(&context).names().len(), 3);

        let custom = ValidatorRegistry::new();
        custom.register(Arc::new(HeaderValidator));
        context.resolver().bind(VALIDATOR_REGISTRY, custom);
        assert_eq!(ValidatorRegistry::lookup(&context).names().len(), 3);
        assert!(ValidatorRegistry::lookup(&context).get("xml").is_err());
    }
}
