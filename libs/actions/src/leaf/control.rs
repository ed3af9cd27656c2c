use crate::container::{AsyncTracker, TimerRegistry};
use crate::{ActionError, TestAction};
use async_trait::async_trait;
use framework_config::defaults;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};
use types::TestContext;

/// Stop a running `timer` by id
#[derive(Debug, Clone)]
pub struct StopTimer {
    timer_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StopTimerConfig {
    pub timer_id: String,
}

impl StopTimer {
    pub fn new(timer_id: impl Into<String>) -> Self {
        Self {
            timer_id: timer_id.into(),
        }
    }

    pub fn from_config(config: StopTimerConfig) -> Self {
        Self::new(config.timer_id)
    }
}

#[async_trait]
impl TestAction for StopTimer {
    fn name(&self) -> &str {
        "stop-timer"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let timer_id = context.replace_dynamic_content(&self.timer_id)?;
        if context.extension::<TimerRegistry>().stop(&timer_id) {
            info!("Stopped timer '{}'", timer_id);
        } else {
            warn!("No running timer with id '{}'", timer_id);
        }
        Ok(())
    }
}

/// Join all `async` and forked work started so far
#[derive(Debug, Clone)]
pub struct WaitAsync {
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WaitAsyncConfig {
    pub timeout_ms: Option<u64>,
}

impl Default for WaitAsync {
    fn default() -> Self {
        Self::new(Duration::from_millis(
            defaults::actions::ASYNC_COMPLETION_TIMEOUT_MS,
        ))
    }
}

impl WaitAsync {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_config(config: WaitAsyncConfig) -> Self {
        config
            .timeout_ms
            .map(|ms| Self::new(Duration::from_millis(ms)))
            .unwrap_or_default()
    }
}

#[async_trait]
impl TestAction for WaitAsync {
    fn name(&self) -> &str {
        "wait-async"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let tracker = context.extension::<AsyncTracker>();
        tracker.wait(self.timeout).await?;
        match ActionError::from_failures(tracker.take_failures()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
