use crate::{ActionError, ErrorKind, TestAction};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use types::TestContext;

/// Run each child, swallowing failures of the configured kind
#[derive(Debug, Clone)]
pub struct Catch {
    kind: Option<ErrorKind>,
    actions: Vec<Arc<dyn TestAction>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatchConfig {
    /// Kind to catch; any kind when absent
    pub exception: Option<ErrorKind>,
}

impl Catch {
    pub fn new(actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            kind: None,
            actions,
        }
    }

    pub fn from_config(config: CatchConfig, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self::new(actions).kind_filter(config.exception)
    }

    pub fn kind(self, kind: ErrorKind) -> Self {
        self.kind_filter(Some(kind))
    }

    fn kind_filter(mut self, kind: Option<ErrorKind>) -> Self {
        self.kind = kind;
        self
    }

    fn catches(&self, err: &ActionError) -> bool {
        self.kind.map_or(true, |kind| kind == err.kind())
    }
}

#[async_trait]
impl TestAction for Catch {
    fn name(&self) -> &str {
        "catch"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        for action in &self.actions {
            match action.execute(context).await {
                Ok(()) => {}
                Err(err) if self.catches(&err) => {
                    warn!(
                        "Caught {} error in '{}': {}, continuing",
                        err.kind(),
                        action.name(),
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

/// Succeed only if the wrapped action fails as expected
#[derive(Debug, Clone)]
pub struct AssertException {
    kind: Option<ErrorKind>,
    message: Option<String>,
    action: Arc<dyn TestAction>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssertExceptionConfig {
    pub exception: Option<ErrorKind>,
    pub message: Option<String>,
}

impl AssertException {
    pub fn new(action: Arc<dyn TestAction>) -> Self {
        Self {
            kind: None,
            message: None,
            action,
        }
    }

    pub fn from_config(config: AssertExceptionConfig, action: Arc<dyn TestAction>) -> Self {
        Self {
            kind: config.exception,
            message: config.message,
            action,
        }
    }

    pub fn kind(mut self, kind: ErrorKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[async_trait]
impl TestAction for AssertException {
    fn name(&self) -> &str {
        "assert-exception"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let err = match self.action.execute(context).await {
            Ok(()) => {
                return Err(ActionError::validation(format!(
                    "Missing asserted {} error in action '{}'",
                    self.kind.map_or("any".to_string(), |k| k.to_string()),
                    self.action.name()
                )))
            }
            Err(err) => err,
        };

        if let Some(kind) = self.kind {
            if kind != err.kind() {
                return Err(ActionError::validation(format!(
                    "Error kind not equal, expected '{}' but was '{}': {}",
                    kind,
                    err.kind(),
                    err
                )));
            }
        }

        if let Some(expected) = &self.message {
            let expected = context.replace_dynamic_content(expected)?;
            let actual = err.to_string();
            if expected != actual {
                return Err(ActionError::validation(format!(
                    "Error message not equal, expected '{}' but was '{}'",
                    expected, actual
                )));
            }
        }

        info!("Asserted {} error as expected: {}", err.kind(), err);
        Ok(())
    }
}
