use crate::{ActionError, TestAction};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;
use types::TestContext;

#[derive(Debug, Clone)]
pub struct Sleep {
    duration: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SleepConfig {
    pub milliseconds: u64,
}

impl Sleep {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn from_config(config: SleepConfig) -> Self {
        Self::new(Duration::from_millis(config.milliseconds))
    }
}

#[async_trait]
impl TestAction for Sleep {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, _context: &TestContext) -> Result<(), ActionError> {
        info!("Sleeping {} ms", self.duration.as_millis());
        tokio::time::sleep(self.duration).await;
        info!("Returning after {} ms", self.duration.as_millis());
        Ok(())
    }
}

/// Log a message with variables replaced
#[derive(Debug, Clone)]
pub struct Echo {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EchoConfig {
    pub message: String,
}

impl Echo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_config(config: EchoConfig) -> Self {
        Self::new(config.message)
    }
}

#[async_trait]
impl TestAction for Echo {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let text = context.replace_dynamic_content(&self.message)?;
        info!("{}", text);
        Ok(())
    }
}

/// Bind variables, resolving `${var}` references in their values
#[derive(Debug, Clone, Default)]
pub struct CreateVariables {
    variables: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateVariablesConfig {
    pub variables: BTreeMap<String, Value>,
}

impl CreateVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: CreateVariablesConfig) -> Self {
        Self {
            variables: config.variables,
        }
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl TestAction for CreateVariables {
    fn name(&self) -> &str {
        "create-variables"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        for (name, value) in &self.variables {
            let value = context.replace_in_value(value)?;
            info!("Setting variable: {} to value: {}", name, value);
            context.set_variable(name.clone(), value);
        }
        Ok(())
    }
}

/// Fail the test with a message
#[derive(Debug, Clone)]
pub struct Fail {
    message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FailConfig {
    #[serde(default = "default_fail_message")]
    pub message: String,
}

fn default_fail_message() -> String {
    "Generated error to interrupt test execution".to_string()
}

impl Fail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_config(config: FailConfig) -> Self {
        Self::new(config.message)
    }
}

#[async_trait]
impl TestAction for Fail {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        Err(ActionError::runtime(
            context.replace_dynamic_content(&self.message)?,
        ))
    }
}
