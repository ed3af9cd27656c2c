//! # Trellis Actions
//!
//! Test actions, the containers that compose them and the test case and
//! suite runners that execute them.
//!
//! Every action implements [`TestAction`]. Leaf actions talk to endpoints
//! or manipulate the [`types::TestContext`]; containers own child actions and
//! decide how they run (in order, concurrently, repeatedly, in the
//! background). Test cases are assembled in code or from TOML definitions
//! through the [`ActionRegistry`].

pub mod container;
pub mod definition;
pub mod error;
pub mod expression;
pub mod leaf;
pub mod registry;
pub mod runner;
pub mod template;
pub mod test_case;
pub mod validation;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use types::TestContext;

pub use container::{
    AssertException, AsyncAction, AsyncTracker, Catch, Conditional, Iterate, Parallel,
    RepeatUntilTrue, Sequence, Timer, TimerRegistry,
};
pub use definition::{ActionDefinition, TestCaseDefinition, TestSuiteDefinition};
pub use error::{ActionError, ErrorKind, ValidationError};
pub use leaf::{
    CreateVariables, Echo, EndpointRef, Fail, PurgeEndpoint, ReceiveMessage, ReceiveTimeout,
    SendMessage, Sleep, StopTimer, WaitAsync,
};
pub use registry::ActionRegistry;
pub use runner::{LoggingTestListener, SuiteReport, TestListener, TestSuite};
pub use template::MessageTemplate;
pub use test_case::{ActionTrace, TestCase, TestResult, TestStatus};
pub use validation::{MessageValidator, ValidationContext, ValidatorRegistry};

/// One executable step of a test case
#[async_trait]
pub trait TestAction: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError>;
}

type BuildFn = dyn Fn() -> Result<Arc<dyn TestAction>, ActionError> + Send + Sync;

/// Deferred construction of an action
///
/// Test cases build all of their actions before the first one runs, so a
/// misconfigured action fails the test case without executing anything.
#[derive(Clone)]
pub struct ActionBuilder {
    build: Arc<BuildFn>,
}

impl ActionBuilder {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn TestAction>, ActionError> + Send + Sync + 'static,
    {
        Self {
            build: Arc::new(build),
        }
    }

    /// Builder handing out an already constructed action
    pub fn from_action<A>(action: A) -> Self
    where
        A: TestAction + 'static,
    {
        let action: Arc<dyn TestAction> = Arc::new(action);
        Self::new(move || Ok(action.clone()))
    }

    pub fn build(&self) -> Result<Arc<dyn TestAction>, ActionError> {
        (self.build)()
    }
}

impl From<Arc<dyn TestAction>> for ActionBuilder {
    fn from(action: Arc<dyn TestAction>) -> Self {
        Self::new(move || Ok(action.clone()))
    }
}

impl fmt::Debug for ActionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionBuilder").finish_non_exhaustive()
    }
}

/// Run `actions` in order, stopping at the first failure
pub(crate) async fn run_all(
    actions: &[Arc<dyn TestAction>],
    context: &TestContext,
) -> Result<(), ActionError> {
    for action in actions {
        action.execute(context).await?;
    }
    Ok(())
}
