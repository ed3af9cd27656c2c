use super::ReplyStore;
use crate::polling::{poll_until, Interrupt, PollOutcome};
use crate::EndpointError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use types::TestContext;

/// Correlation key bookkeeping plus a polling lookup over a [`ReplyStore`]
#[derive(Debug)]
pub struct PollingCorrelationManager<T> {
    store: Arc<ReplyStore<T>>,
    polling_interval: Duration,
    interrupt: Arc<Interrupt>,
    description: String,
}

impl<T> PollingCorrelationManager<T> {
    pub fn new(
        store: Arc<ReplyStore<T>>,
        polling_interval: Duration,
        interrupt: Arc<Interrupt>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            store,
            polling_interval,
            interrupt,
            description: description.into(),
        }
    }

    pub fn store(&self) -> &Arc<ReplyStore<T>> {
        &self.store
    }

    /// Remember the pending key for the current test case
    pub fn save_correlation_key(&self, key_name: &str, key: &str, context: &TestContext) {
        debug!("Saving correlation key for '{}'", key_name);
        context.set_variable(key_name, key);
    }

    /// Pending key saved by [`Self::save_correlation_key`]
    pub fn correlation_key(
        &self,
        key_name: &str,
        context: &TestContext,
    ) -> Result<String, EndpointError> {
        context.variable_str(key_name).map_err(|_| {
            EndpointError::configuration(format!(
                "Failed to get correlation key for '{}'",
                key_name
            ))
        })
    }

    pub fn store_value(&self, key: impl Into<String>, value: T) {
        self.store.store(key, value);
    }

    /// Single non-blocking lookup
    pub fn find(&self, selector: &str) -> Option<T> {
        self.store.find_and_remove(selector)
    }

    /// Poll for a value under `selector` until `timeout` elapses.
    ///
    /// Returns `None` on timeout and on interruption.
    pub async fn find_with_timeout(&self, selector: &str, timeout: Duration) -> Option<T> {
        let outcome = poll_until(
            || self.store.find_and_remove(selector),
            || self.store.notified(),
            timeout,
            self.polling_interval,
            &self.interrupt,
            &self.description,
        )
        .await;

        if matches!(outcome, PollOutcome::Interrupted) {
            debug!(
                "Stopped waiting for {} with key '{}'",
                self.description, selector
            );
        }
        outcome.into_option()
    }
}
