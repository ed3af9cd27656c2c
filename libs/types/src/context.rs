//! Per-test-case state
//!
//! A [`TestContext`] is created when a test case starts and dropped when it
//! ends. Clones are handles to the same state, which is how `parallel` and
//! `async` branches of one test case share variables. Variable writes go
//! through a single lock so concurrent branches never lose updates.

use crate::message::value_to_string;
use crate::{ContextError, Message, Payload, ReferenceResolver};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use regex::{Captures, Regex};
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

static VARIABLE_EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}\s]+)\}").expect("variable expression pattern is valid")
});

/// Named messages sent and received during a test case
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Mutex<HashMap<String, Message>>,
}

impl MessageStore {
    pub fn store(&self, name: impl Into<String>, message: Message) {
        self.messages.lock().insert(name.into(), message);
    }

    pub fn get(&self, name: &str) -> Result<Message, ContextError> {
        self.messages
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownMessage(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.messages.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Default store name for a message exchanged over `endpoint`
    pub fn default_name(direction: &str, endpoint: &str) -> String {
        format!("{}({})", direction, endpoint)
    }
}

#[derive(Default)]
struct ContextInner {
    variables: RwLock<HashMap<String, Value>>,
    messages: MessageStore,
    resolver: ReferenceResolver,
    extensions: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

/// Per-test-case variables, message store and reference resolver
#[derive(Clone, Default)]
pub struct TestContext {
    inner: Arc<ContextInner>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh context whose references are resolved through `resolver`
    pub fn with_resolver(resolver: ReferenceResolver) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                resolver,
                ..ContextInner::default()
            }),
        }
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.inner.resolver
    }

    pub fn message_store(&self) -> &MessageStore {
        &self.inner.messages
    }

    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        tracing::trace!("Setting variable: {} = {}", name, value);
        self.inner.variables.write().insert(name, value);
    }

    pub fn variable(&self, name: &str) -> Result<Value, ContextError> {
        self.inner
            .variables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ContextError::UnknownVariable(name.to_string()))
    }

    /// Variable rendered as string
    pub fn variable_str(&self, name: &str) -> Result<String, ContextError> {
        self.variable(name).map(|value| value_to_string(&value))
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.inner.variables.read().contains_key(name)
    }

    pub fn remove_variable(&self, name: &str) -> Option<Value> {
        self.inner.variables.write().remove(name)
    }

    /// Atomically read-modify-write a variable
    pub fn update_variable<F>(&self, name: &str, update: F) -> Value
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut variables = self.inner.variables.write();
        let value = update(variables.get(name));
        variables.insert(name.to_string(), value.clone());
        value
    }

    pub fn variables(&self) -> HashMap<String, Value> {
        self.inner.variables.read().clone()
    }

    /// Replace every `${name}` in `text` with the bound variable value
    pub fn replace_dynamic_content(&self, text: &str) -> Result<String, ContextError> {
        if !text.contains("${") {
            return Ok(text.to_string());
        }

        let variables = self.inner.variables.read();
        let mut missing = None;

        let replaced = VARIABLE_EXPRESSION.replace_all(text, |caps: &Captures<'_>| {
            match variables.get(&caps[1]) {
                Some(value) => value_to_string(value),
                None => {
                    missing.get_or_insert_with(|| caps[1].to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(name) => Err(ContextError::UnknownVariable(name)),
            None => Ok(replaced.into_owned()),
        }
    }

    /// Replace variables in a JSON document, recursing into strings
    pub fn replace_in_value(&self, value: &Value) -> Result<Value, ContextError> {
        Ok(match value {
            Value::String(text) => Value::String(self.replace_dynamic_content(text)?),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.replace_in_value(item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), self.replace_in_value(item)?)))
                    .collect::<Result<_, ContextError>>()?,
            ),
            other => other.clone(),
        })
    }

    /// Copy of `message` with variables replaced in payload and headers
    pub fn replace_message_content(&self, message: &Message) -> Result<Message, ContextError> {
        let payload = match message.payload() {
            Payload::Text(text) => Payload::Text(self.replace_dynamic_content(text)?),
            Payload::Json(value) => Payload::Json(self.replace_in_value(value)?),
            other => other.clone(),
        };

        let mut resolved = message.clone().with_payload(payload);
        for (name, value) in message.headers() {
            let name_resolved = self.replace_dynamic_content(name)?;
            let value_resolved = self.replace_in_value(value)?;
            if name_resolved != *name {
                resolved.remove_header(name);
            }
            resolved.set_header(name_resolved, value_resolved);
        }
        Ok(resolved)
    }

    /// Shared extension slot of type `T`, created on first access
    pub fn extension<T>(&self) -> Arc<T>
    where
        T: Default + Send + Sync + 'static,
    {
        if let Some(existing) = self.inner.extensions.read().get(&TypeId::of::<T>()) {
            if let Ok(typed) = existing.clone().downcast::<T>() {
                return typed;
            }
        }

        let mut extensions = self.inner.extensions.write();
        let slot = extensions
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(T::default()) as Arc<dyn Any + Send + Sync>)
            .clone();
        match slot.downcast::<T>() {
            Ok(typed) => typed,
            // Entry is keyed by TypeId so the downcast always matches
            Err(_) => Arc::new(T::default()),
        }
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("variables", &*self.inner.variables.read())
            .field("messages", &self.inner.messages.len())
            .field("resolver", &self.inner.resolver)
            .finish()
    }
}
