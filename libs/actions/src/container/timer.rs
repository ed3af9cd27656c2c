use super::AsyncTracker;
use crate::{run_all, ActionError, TestAction};
use async_trait::async_trait;
use dashmap::DashMap;
use endpoint::Interrupt;
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::TestContext;

/// Stop signals and background tasks of the timers of one test case
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: DashMap<String, Arc<Interrupt>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    sequence: AtomicU64,
}

impl TimerRegistry {
    fn next_id(&self) -> String {
        format!("timer-{}", self.sequence.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn start(&self, id: &str) -> Arc<Interrupt> {
        let stop = Arc::new(Interrupt::new());
        self.timers.insert(id.to_string(), stop.clone());
        stop
    }

    fn finished(&self, id: &str) {
        self.timers.remove(id);
    }

    /// Signal the timer to stop after its current iteration
    pub fn stop(&self, id: &str) -> bool {
        match self.timers.get(id) {
            Some(stop) => {
                stop.interrupt();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.timers.contains_key(id)
    }

    /// Stop every timer and join the forked ones
    pub async fn stop_all(&self) {
        for timer in self.timers.iter() {
            debug!("Stopping timer '{}'", timer.key());
            timer.value().interrupt();
        }

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!("Timer task panicked: {}", err);
            }
        }
    }
}

/// Run the body every `interval` after an initial `delay`
///
/// Stops after `repeat_count` runs, on `stop-timer`, on a failing run, or
/// when the test case ends. The run counter is exposed as `<id>-index`.
#[derive(Debug, Clone)]
pub struct Timer {
    id: Option<String>,
    interval: Duration,
    delay: Duration,
    repeat_count: Option<u64>,
    fork: bool,
    actions: Vec<Arc<dyn TestAction>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerConfig {
    pub id: Option<String>,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default)]
    pub delay_ms: u64,
    pub repeat_count: Option<u64>,
    #[serde(default)]
    pub fork: bool,
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Timer {
    pub fn new(interval: Duration, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            id: None,
            interval,
            delay: Duration::ZERO,
            repeat_count: None,
            fork: false,
            actions,
        }
    }

    pub fn from_config(config: TimerConfig, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            id: config.id,
            interval: Duration::from_millis(config.interval_ms),
            delay: Duration::from_millis(config.delay_ms),
            repeat_count: config.repeat_count,
            fork: config.fork,
            actions,
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn repeat_count(mut self, repeat_count: u64) -> Self {
        self.repeat_count = Some(repeat_count);
        self
    }

    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    async fn run(
        &self,
        id: &str,
        stop: &Interrupt,
        context: &TestContext,
    ) -> Result<(), ActionError> {
        let index_variable = format!("{}-index", id);

        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = stop.interrupted() => return Ok(()),
            }
        }

        let mut index = 0u64;
        loop {
            if stop.is_interrupted() {
                break;
            }
            index += 1;
            context.set_variable(index_variable.clone(), index);
            debug!("Timer '{}' run {}", id, index);
            run_all(&self.actions, context).await?;

            if self.repeat_count.map_or(false, |count| index >= count) {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = stop.interrupted() => break,
            }
        }

        info!("Timer '{}' finished after {} runs", id, index);
        Ok(())
    }
}

#[async_trait]
impl TestAction for Timer {
    fn name(&self) -> &str {
        "timer"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let registry = context.extension::<TimerRegistry>();
        let id = match &self.id {
            Some(id) => context.replace_dynamic_content(id)?,
            None => registry.next_id(),
        };
        let stop = registry.start(&id);

        if !self.fork {
            let result = self.run(&id, &stop, context).await;
            registry.finished(&id);
            return result;
        }

        let timer = self.clone();
        let task_context = context.clone();
        let task_registry = registry.clone();
        let handle = tokio::spawn(async move {
            let result = timer.run(&id, &stop, &task_context).await;
            task_registry.finished(&id);
            if let Err(err) = result {
                warn!("Timer '{}' failed: {}", id, err);
                task_context
                    .extension::<AsyncTracker>()
                    .record_failure(err);
            }
        });
        registry.tasks.lock().push(handle);
        Ok(())
    }
}
