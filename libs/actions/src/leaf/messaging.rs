use super::EndpointRef;
use crate::container::AsyncTracker;
use crate::validation::{ValidationContext, ValidatorRegistry};
use crate::{ActionError, MessageTemplate, TestAction};
use async_trait::async_trait;
use endpoint::MessageSelector;
use framework_config::defaults;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};
use types::{Message, MessageStore, TestContext};

/// Send a message built from a template
#[derive(Debug, Clone)]
pub struct SendMessage {
    endpoint: EndpointRef,
    template: MessageTemplate,
    fork: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendConfig {
    pub endpoint: String,
    #[serde(flatten)]
    pub message: MessageTemplate,
    #[serde(default)]
    pub fork: bool,
}

impl SendMessage {
    pub fn new(endpoint: impl Into<EndpointRef>, template: MessageTemplate) -> Self {
        Self {
            endpoint: endpoint.into(),
            template,
            fork: false,
        }
    }

    pub fn from_config(config: SendConfig) -> Self {
        Self::new(config.endpoint, config.message).fork(config.fork)
    }

    /// Send in the background; the test case joins it like `async` work
    pub fn fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }
}

#[async_trait]
impl TestAction for SendMessage {
    fn name(&self) -> &str {
        "send"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let message = self.template.build(context)?;
        let endpoint = self.endpoint.resolve(context)?;
        let producer = endpoint.create_producer();

        let store_name = message
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| MessageStore::default_name("send", endpoint.name()));
        context.message_store().store(store_name, message.clone());

        info!("Sending message to endpoint '{}'", endpoint.name());
        debug!("Message to send: {}", message);

        if self.fork {
            let task_context = context.clone();
            context.extension::<AsyncTracker>().spawn(
                format!("forked send to '{}'", endpoint.name()),
                async move {
                    producer.send(message, &task_context).await?;
                    Ok(())
                },
            );
            return Ok(());
        }

        producer.send(message, context).await?;
        Ok(())
    }
}

/// Receive a message, validate it and extract header values into variables
#[derive(Debug, Clone)]
pub struct ReceiveMessage {
    endpoint: EndpointRef,
    selector: Option<String>,
    timeout: Option<Duration>,
    control: Option<MessageTemplate>,
    validators: Vec<String>,
    validation: ValidationContext,
    extract: BTreeMap<String, String>,
    message_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveConfig {
    pub endpoint: String,
    pub selector: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Expected message
    pub control: Option<MessageTemplate>,
    #[serde(default)]
    pub validators: Vec<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub ignore_whitespace: bool,
    /// Header name to variable name
    #[serde(default)]
    pub extract: BTreeMap<String, String>,
    pub message_name: Option<String>,
}

impl ReceiveMessage {
    pub fn new(endpoint: impl Into<EndpointRef>) -> Self {
        Self {
            endpoint: endpoint.into(),
            selector: None,
            timeout: None,
            control: None,
            validators: Vec::new(),
            validation: ValidationContext::default(),
            extract: BTreeMap::new(),
            message_name: None,
        }
    }

    pub fn from_config(config: ReceiveConfig) -> Self {
        let mut action = Self::new(config.endpoint);
        action.selector = config.selector;
        action.timeout = config.timeout_ms.map(Duration::from_millis);
        action.control = config.control;
        action.validators = config.validators;
        action.validation = ValidationContext {
            strict: config.strict,
            ignore_whitespace: config.ignore_whitespace,
        };
        action.extract = config.extract;
        action.message_name = config.message_name;
        action
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn control(mut self, control: MessageTemplate) -> Self {
        self.control = Some(control);
        self
    }

    pub fn validator(mut self, name: impl Into<String>) -> Self {
        self.validators.push(name.into());
        self
    }

    pub fn validation(mut self, validation: ValidationContext) -> Self {
        self.validation = validation;
        self
    }

    /// Store the value of `header` in `variable`
    pub fn extract(mut self, header: impl Into<String>, variable: impl Into<String>) -> Self {
        self.extract.insert(header.into(), variable.into());
        self
    }

    pub fn message_name(mut self, name: impl Into<String>) -> Self {
        self.message_name = Some(name.into());
        self
    }

    fn validate(&self, received: &Message, context: &TestContext) -> Result<(), ActionError> {
        let Some(control) = &self.control else {
            debug!("No control message defined, skipping validation");
            return Ok(());
        };
        let control = control.build(context)?;

        let registry = ValidatorRegistry::lookup(context);
        let validators = if self.validators.is_empty() {
            registry.for_type(received.message_type())
        } else {
            self.validators
                .iter()
                .map(|name| registry.get(name))
                .collect::<Result<Vec<_>, _>>()?
        };

        for validator in validators {
            debug!("Validating message with '{}' validator", validator.name());
            validator.validate(received, &control, context, &self.validation)?;
        }
        info!("Message validation successful: all values OK");
        Ok(())
    }
}

#[async_trait]
impl TestAction for ReceiveMessage {
    fn name(&self) -> &str {
        "receive"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let endpoint = self.endpoint.resolve(context)?;
        let consumer = endpoint.create_consumer();

        let received = match &self.selector {
            // Consumers resolve variables in the selector themselves
            Some(selector) => {
                consumer
                    .receive_selective(selector, context, self.timeout)
                    .await?
            }
            None => consumer.receive(context, self.timeout).await?,
        };
        debug!("Received message: {}", received);

        let store_name = self
            .message_name
            .clone()
            .unwrap_or_else(|| MessageStore::default_name("receive", endpoint.name()));
        context.message_store().store(store_name, received.clone());

        self.validate(&received, context)?;

        for (header, variable) in &self.extract {
            let value = received.header_str(header).ok_or_else(|| {
                ActionError::validation(format!(
                    "Failed to extract header '{}' from received message",
                    header
                ))
            })?;
            context.set_variable(variable.clone(), value);
        }
        Ok(())
    }
}

/// Expect that no message arrives within the timeout
#[derive(Debug, Clone)]
pub struct ReceiveTimeout {
    endpoint: EndpointRef,
    selector: Option<String>,
    timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReceiveTimeoutConfig {
    pub endpoint: String,
    pub selector: Option<String>,
    pub timeout_ms: Option<u64>,
}

impl ReceiveTimeout {
    pub fn new(endpoint: impl Into<EndpointRef>) -> Self {
        Self {
            endpoint: endpoint.into(),
            selector: None,
            timeout: Duration::from_millis(defaults::actions::RECEIVE_TIMEOUT_EXPECTATION_MS),
        }
    }

    pub fn from_config(config: ReceiveTimeoutConfig) -> Self {
        let mut action = Self::new(config.endpoint);
        action.selector = config.selector;
        if let Some(timeout_ms) = config.timeout_ms {
            action.timeout = Duration::from_millis(timeout_ms);
        }
        action
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl TestAction for ReceiveTimeout {
    fn name(&self) -> &str {
        "receive-timeout"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let endpoint = self.endpoint.resolve(context)?;
        let consumer = endpoint.create_consumer();

        let result = match &self.selector {
            Some(selector) => {
                consumer
                    .receive_selective(selector, context, Some(self.timeout))
                    .await
            }
            None => consumer.receive(context, Some(self.timeout)).await,
        };

        match result {
            Ok(message) => {
                debug!("Received unexpected message: {}", message);
                Err(ActionError::validation(format!(
                    "Message timeout validation failed! Received message while waiting for timeout on endpoint '{}'",
                    endpoint.name()
                )))
            }
            Err(err) if err.is_timeout() => {
                info!(
                    "No message received on endpoint '{}' within {} ms, as expected",
                    endpoint.name(),
                    self.timeout.as_millis()
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Drop pending messages of one or more endpoints
#[derive(Debug, Clone)]
pub struct PurgeEndpoint {
    endpoints: Vec<EndpointRef>,
    selector: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PurgeConfig {
    pub endpoints: Vec<String>,
    pub selector: Option<String>,
}

impl PurgeEndpoint {
    pub fn new<I, E>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EndpointRef>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            selector: None,
        }
    }

    pub fn from_config(config: PurgeConfig) -> Self {
        let mut action = Self::new(config.endpoints);
        action.selector = config.selector;
        action
    }

    pub fn selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }
}

#[async_trait]
impl TestAction for PurgeEndpoint {
    fn name(&self) -> &str {
        "purge-endpoint"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let selector = match &self.selector {
            Some(selector) => Some(MessageSelector::parse(
                &context.replace_dynamic_content(selector)?,
            )?),
            None => None,
        };

        for reference in &self.endpoints {
            let endpoint = reference.resolve(context)?;
            let purged = endpoint.purge(selector.as_ref());
            info!("Purged {} messages from endpoint '{}'", purged, endpoint.name());
        }
        Ok(())
    }
}
