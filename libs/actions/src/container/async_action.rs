use crate::{run_all, ActionError, TestAction};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use types::TestContext;

/// Background work of one test case and the failures it produced
///
/// Lives as a [`TestContext`] extension so every branch of a test case
/// shares it.
#[derive(Debug, Default)]
pub struct AsyncTracker {
    tasks: Mutex<Vec<JoinHandle<()>>>,
    failures: Mutex<Vec<ActionError>>,
}

impl AsyncTracker {
    /// Run `task` in the background, recording its failure
    pub fn spawn<F>(self: &Arc<Self>, description: impl Into<String>, task: F)
    where
        F: Future<Output = Result<(), ActionError>> + Send + 'static,
    {
        let description = description.into();
        let tracker = self.clone();
        debug!("Starting {}", description);

        let handle = tokio::spawn(async move {
            if let Err(err) = task.await {
                error!("{} failed: {}", description, err);
                tracker.record_failure(err);
            }
        });
        self.tasks.lock().push(handle);
    }

    pub fn record_failure(&self, err: ActionError) {
        self.failures.lock().push(err);
    }

    /// Failures recorded since the last call
    pub fn take_failures(&self) -> Vec<ActionError> {
        std::mem::take(&mut *self.failures.lock())
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.lock().is_empty()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().iter().filter(|t| !t.is_finished()).count()
    }

    /// Join all background work, including work started while waiting
    pub async fn wait(&self, timeout: Duration) -> Result<(), ActionError> {
        let join = async {
            loop {
                let tasks = std::mem::take(&mut *self.tasks.lock());
                if tasks.is_empty() {
                    break;
                }
                for task in tasks {
                    if let Err(err) = task.await {
                        self.record_failure(ActionError::runtime(format!(
                            "Async task panicked: {}",
                            err
                        )));
                    }
                }
            }
        };

        tokio::time::timeout(timeout, join).await.map_err(|_| {
            warn!("Async work still running after {} ms", timeout.as_millis());
            ActionError::Timeout(format!(
                "Failed to wait for nested test actions to finish properly within {} ms",
                timeout.as_millis()
            ))
        })
    }
}

/// Run the body in the background without blocking the test case
#[derive(Debug, Clone, Default)]
pub struct AsyncAction {
    actions: Vec<Arc<dyn TestAction>>,
    success: Vec<Arc<dyn TestAction>>,
    error: Vec<Arc<dyn TestAction>>,
}

impl AsyncAction {
    pub fn new(actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            actions,
            ..Self::default()
        }
    }

    /// Actions run after the body succeeded
    pub fn on_success(mut self, actions: Vec<Arc<dyn TestAction>>) -> Self {
        self.success = actions;
        self
    }

    /// Actions run after the body failed
    pub fn on_error(mut self, actions: Vec<Arc<dyn TestAction>>) -> Self {
        self.error = actions;
        self
    }
}

#[async_trait]
impl TestAction for AsyncAction {
    fn name(&self) -> &str {
        "async"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let action = self.clone();
        let task_context = context.clone();

        context
            .extension::<AsyncTracker>()
            .spawn("async container", async move {
                match run_all(&action.actions, &task_context).await {
                    Ok(()) => run_all(&action.success, &task_context).await,
                    Err(err) => {
                        if let Err(handler_err) = run_all(&action.error, &task_context).await {
                            warn!("Async error actions failed: {}", handler_err);
                        }
                        Err(err)
                    }
                }
            });
        Ok(())
    }
}
