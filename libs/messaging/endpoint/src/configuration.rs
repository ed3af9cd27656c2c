use crate::correlation::{Correlator, DefaultMessageCorrelator, HeaderCorrelator};
use framework_config::{DefaultSettings, EndpointSettings};
use std::sync::Arc;
use std::time::Duration;

/// Timeout, polling and correlation settings of one endpoint
#[derive(Debug, Clone)]
pub struct EndpointConfiguration {
    /// Default receive timeout
    pub timeout: Duration,
    /// Sleep between reply lookups
    pub polling_interval: Duration,
    pub correlator: Arc<dyn Correlator>,
}

impl Default for EndpointConfiguration {
    fn default() -> Self {
        let defaults = DefaultSettings::default();
        Self {
            timeout: defaults.receive_timeout(),
            polling_interval: defaults.polling_interval(),
            correlator: Arc::new(DefaultMessageCorrelator),
        }
    }
}

impl EndpointConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration of a declared endpoint, falling back to framework defaults
    pub fn from_settings(settings: &EndpointSettings, defaults: &DefaultSettings) -> Self {
        let correlator: Arc<dyn Correlator> = match &settings.correlator {
            Some(correlator) => Arc::new(HeaderCorrelator::new(correlator.headers.clone())),
            None => Arc::new(DefaultMessageCorrelator),
        };

        Self {
            timeout: settings.timeout(defaults),
            polling_interval: settings.polling_interval(defaults),
            correlator,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_polling_interval(mut self, polling_interval: Duration) -> Self {
        self.polling_interval = polling_interval;
        self
    }

    pub fn with_correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// Effective timeout of a receive call
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        requested.unwrap_or(self.timeout)
    }
}
