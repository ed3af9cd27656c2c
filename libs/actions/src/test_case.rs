//! Test case execution
//!
//! A test case runs in three phases:
//!
//! 1. **start**: build every action, bind the initial variables
//! 2. **run**: execute the actions in order; before each one, failures
//!    recorded by `async` work surface and stop the test
//! 3. **finish**: on success join outstanding async work, stop all timers,
//!    then run the `finally` actions whatever the outcome
//!
//! The outcome is a [`TestResult`]; a failing test case never panics.

use crate::container::{AsyncTracker, TimerRegistry};
use crate::definition::TestCaseDefinition;
use crate::registry::ActionRegistry;
use crate::{ActionBuilder, ActionError, ErrorKind, TestAction};
use framework_config::defaults;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use types::TestContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Success,
    Failure,
}

/// Outcome of one executed action
#[derive(Debug, Clone, Serialize)]
pub struct ActionTrace {
    pub action: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionTrace {
    fn new(action: &str, elapsed: Duration, result: &Result<(), ActionError>) -> Self {
        Self {
            action: action.to_string(),
            status: if result.is_ok() {
                TestStatus::Success
            } else {
                TestStatus::Failure
            },
            duration_ms: elapsed.as_millis() as u64,
            error: result.as_ref().err().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    pub trace: Vec<ActionTrace>,
    #[serde(skip)]
    error: Option<ActionError>,
}

impl TestResult {
    fn new(
        name: &str,
        error: Option<ActionError>,
        elapsed: Duration,
        trace: Vec<ActionTrace>,
    ) -> Self {
        Self {
            name: name.to_string(),
            status: if error.is_none() {
                TestStatus::Success
            } else {
                TestStatus::Failure
            },
            cause: error.as_ref().map(ToString::to_string),
            error_kind: error.as_ref().map(ActionError::kind),
            duration_ms: elapsed.as_millis() as u64,
            trace,
            error,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TestStatus::Success
    }

    pub fn error(&self) -> Option<&ActionError> {
        self.error.as_ref()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }
}

#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    description: Option<String>,
    variables: BTreeMap<String, Value>,
    actions: Vec<ActionBuilder>,
    finally: Vec<ActionBuilder>,
    async_completion_timeout: Duration,
}

impl TestCase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            variables: BTreeMap::new(),
            actions: Vec::new(),
            finally: Vec::new(),
            async_completion_timeout: Duration::from_millis(
                defaults::actions::ASYNC_COMPLETION_TIMEOUT_MS,
            ),
        }
    }

    /// Test case whose actions are built through `registry`
    ///
    /// Unknown action names fail here, before anything runs.
    pub fn from_definition(
        definition: &TestCaseDefinition,
        registry: &ActionRegistry,
    ) -> Result<Self, ActionError> {
        let mut test = Self::new(definition.name.clone());
        test.description = definition.description.clone();
        test.variables = definition.variables.clone();
        test.actions = definition
            .actions
            .iter()
            .map(|action| registry.builder(action))
            .collect::<Result<_, _>>()?;
        test.finally = definition
            .finally
            .iter()
            .map(|action| registry.builder(action))
            .collect::<Result<_, _>>()?;
        if let Some(timeout_ms) = definition.async_completion_timeout_ms {
            test.async_completion_timeout = Duration::from_millis(timeout_ms);
        }
        Ok(test)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn action(mut self, builder: ActionBuilder) -> Self {
        self.actions.push(builder);
        self
    }

    /// Append an already constructed action
    pub fn step<A: TestAction + 'static>(self, action: A) -> Self {
        self.action(ActionBuilder::from_action(action))
    }

    pub fn finally(mut self, builder: ActionBuilder) -> Self {
        self.finally.push(builder);
        self
    }

    pub fn finally_step<A: TestAction + 'static>(self, action: A) -> Self {
        self.finally(ActionBuilder::from_action(action))
    }

    pub fn async_completion_timeout(mut self, timeout: Duration) -> Self {
        self.async_completion_timeout = timeout;
        self
    }

    pub async fn run(&self, context: &TestContext) -> TestResult {
        let started = Instant::now();
        info!("Starting test case '{}'", self.name);
        if let Some(description) = &self.description {
            debug!("{}", description);
        }

        let mut trace = Vec::new();
        let mut failure = self.start(context).err();

        if failure.is_none() {
            failure = self.run_actions(context, &mut trace).await.err();
        }
        failure = self.finish(context, failure, &mut trace).await;

        match &failure {
            None => info!("Test case '{}' finished successfully", self.name),
            Some(err) => error!("Test case '{}' failed: {}", self.name, err),
        }
        TestResult::new(&self.name, failure, started.elapsed(), trace)
    }

    fn start(&self, context: &TestContext) -> Result<(), ActionError> {
        for (name, value) in &self.variables {
            context.set_variable(name.clone(), context.replace_in_value(value)?);
        }
        Ok(())
    }

    async fn run_actions(
        &self,
        context: &TestContext,
        trace: &mut Vec<ActionTrace>,
    ) -> Result<(), ActionError> {
        let actions = build_all(&self.actions)?;
        let tracker = context.extension::<AsyncTracker>();

        for action in actions {
            if let Some(err) = ActionError::from_failures(tracker.take_failures()) {
                return Err(err);
            }
            execute_traced(action.as_ref(), context, trace).await?;
        }
        Ok(())
    }

    async fn finish(
        &self,
        context: &TestContext,
        mut failure: Option<ActionError>,
        trace: &mut Vec<ActionTrace>,
    ) -> Option<ActionError> {
        let tracker = context.extension::<AsyncTracker>();
        if failure.is_none() {
            failure = match tracker.wait(self.async_completion_timeout).await {
                Ok(()) => ActionError::from_failures(tracker.take_failures()),
                Err(err) => Some(err),
            };
        }
        context.extension::<TimerRegistry>().stop_all().await;

        let finally = match build_all(&self.finally) {
            Ok(actions) => actions,
            Err(err) => return failure.or(Some(err)),
        };
        for action in finally {
            if let Err(err) = execute_traced(action.as_ref(), context, trace).await {
                warn!("Finally action '{}' failed: {}", action.name(), err);
                failure.get_or_insert(err);
            }
        }
        failure
    }
}

fn build_all(builders: &[ActionBuilder]) -> Result<Vec<Arc<dyn TestAction>>, ActionError> {
    builders.iter().map(ActionBuilder::build).collect()
}

async fn execute_traced(
    action: &dyn TestAction,
    context: &TestContext,
    trace: &mut Vec<ActionTrace>,
) -> Result<(), ActionError> {
    debug!("Executing action '{}'", action.name());
    let started = Instant::now();
    let result = action.execute(context).await;
    trace.push(ActionTrace::new(action.name(), started.elapsed(), &result));
    result
}
