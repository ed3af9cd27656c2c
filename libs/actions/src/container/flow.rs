use crate::{run_all, ActionError, TestAction};
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};
use types::TestContext;

/// Children in strict order; the first failure stops the sequence
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    actions: Vec<Arc<dyn TestAction>>,
}

impl Sequence {
    pub fn new(actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self { actions }
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }
}

#[async_trait]
impl TestAction for Sequence {
    fn name(&self) -> &str {
        "sequential"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        run_all(&self.actions, context).await
    }
}

/// Children concurrently, one task each, joined before returning
///
/// Every child runs to completion even when a sibling fails. A single
/// failure is reported as-is; several are reported together.
#[derive(Debug, Clone, Default)]
pub struct Parallel {
    actions: Vec<Arc<dyn TestAction>>,
}

impl Parallel {
    pub fn new(actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self { actions }
    }

    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }
}

#[async_trait]
impl TestAction for Parallel {
    fn name(&self) -> &str {
        "parallel"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let handles: Vec<_> = self
            .actions
            .iter()
            .map(|action| {
                let action = action.clone();
                let context = context.clone();
                tokio::spawn(async move { action.execute(&context).await })
            })
            .collect();

        debug!("Started {} parallel branches", handles.len());

        let mut failures = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!("Parallel branch failed: {}", err);
                    failures.push(err);
                }
                Err(err) => failures.push(ActionError::runtime(format!(
                    "Parallel branch panicked: {}",
                    err
                ))),
            }
        }

        match ActionError::from_failures(failures) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
