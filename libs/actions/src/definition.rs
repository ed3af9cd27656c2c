//! Declarative test definitions
//!
//! Suites are written in TOML. Every action is a table with an `action`
//! name, its own properties and optional nested `actions`:
//!
//! ```toml
//! name = "greeting"
//!
//! [[tests]]
//! name = "hello"
//! variables = { operation = "greeting" }
//!
//! [[tests.actions]]
//! action = "send"
//! endpoint = "hello.client"
//! payload = "Hello"
//! headers = { operation = "${operation}" }
//!
//! [[tests.actions]]
//! action = "receive"
//! endpoint = "hello.client"
//! control = { payload = "Hello back" }
//! ```

use crate::ActionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// One action and its nested children
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ActionDefinition {
    pub action: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDefinition>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl ActionDefinition {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Self::default()
        }
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: ActionDefinition) -> Self {
        self.actions.push(child);
        self
    }

    /// Deserialize the properties into the action's config struct
    ///
    /// Keys listed in `nested` hold child action lists and are left out.
    pub fn config<T>(&self, nested: &[&str]) -> Result<T, ActionError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let properties: Map<String, Value> = self
            .properties
            .iter()
            .filter(|(key, _)| !nested.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        serde_json::from_value(Value::Object(properties)).map_err(|err| {
            ActionError::configuration(format!(
                "Invalid properties for action '{}': {}",
                self.action, err
            ))
        })
    }

    /// Child actions stored under a property, e.g. `success` of `async`
    pub fn nested(&self, key: &str) -> Result<Vec<ActionDefinition>, ActionError> {
        match self.properties.get(key) {
            None => Ok(Vec::new()),
            Some(value) => serde_json::from_value(value.clone()).map_err(|err| {
                ActionError::configuration(format!(
                    "Invalid '{}' actions of '{}': {}",
                    key, self.action, err
                ))
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TestCaseDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
    #[serde(default)]
    pub finally: Vec<ActionDefinition>,
    #[serde(default)]
    pub async_completion_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TestSuiteDefinition {
    pub name: String,
    #[serde(default)]
    pub tests: Vec<TestCaseDefinition>,
}

impl TestSuiteDefinition {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse test suite definition")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read test suite {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid test suite {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    const SUITE: &str = r#"
name = "greeting"

[[tests]]
name = "hello"
variables = { operation = "greeting" }

[[tests.actions]]
action = "send"
endpoint = "hello.client"
payload = "Hello"
headers = { operation = "${operation}" }

[[tests.actions]]
action = "iterate"
condition = "i lt 3"

[[tests.actions.actions]]
action = "echo"
message = "run ${i}"

[[tests.finally]]
action = "purge-endpoint"
endpoints = ["hello.client"]
"#;

    #[test]
    fn test_parse_suite() {
        let suite = TestSuiteDefinition::from_toml_str(SUITE).unwrap();
        assert_eq!(suite.name, "greeting");
        assert_eq!(suite.tests.len(), 1);

        let test = &suite.tests[0];
        assert_eq!(test.variables["operation"], json!("greeting"));
        assert_eq!(test.actions.len(), 2);
        assert_eq!(test.actions[0].action, "send");
        assert_eq!(test.actions[0].properties["payload"], json!("Hello"));
        assert_eq!(test.actions[1].actions[0].action, "echo");
        assert_eq!(test.finally[0].action, "purge-endpoint");
    }

    #[test]
    fn test_unknown_test_key_is_rejected() {
        let err = TestSuiteDefinition::from_toml_str(
            "name = \"s\"\n[[tests]]\nname = \"t\"\nretries = 3\n",
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("retries"));
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ExceptionConfig {
        exception: String,
    }

    #[test]
    fn test_config_skips_nested_keys() {
        let definition = ActionDefinition::new("async")
            .property("exception", "timeout")
            .property("success", json!([{ "action": "echo", "message": "ok" }]));

        let parsed: ExceptionConfig = definition.config(&["success"]).unwrap();
        assert_eq!(parsed.exception, "timeout");

        let nested = definition.nested("success").unwrap();
        assert_eq!(nested[0].action, "echo");

        let err = definition.config::<ExceptionConfig>(&[]).unwrap_err();
        assert!(err.to_string().contains("Invalid properties for action 'async'"));
    }
}
