//! Action factories keyed by definition name

use crate::container::{
    AssertException, AssertExceptionConfig, AsyncAction, Catch, CatchConfig, Conditional,
    ConditionalConfig, Iterate, LoopConfig, Parallel, RepeatUntilTrue, Sequence, Timer,
    TimerConfig,
};
use crate::definition::ActionDefinition;
use crate::leaf::{
    CreateVariables, CreateVariablesConfig, Echo, EchoConfig, Fail, FailConfig, PurgeConfig,
    PurgeEndpoint, ReceiveConfig, ReceiveMessage, ReceiveTimeout, ReceiveTimeoutConfig,
    SendConfig, SendMessage, Sleep, SleepConfig, StopTimer, StopTimerConfig, WaitAsync,
    WaitAsyncConfig,
};
use crate::{ActionBuilder, ActionError, TestAction};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Creates an action from its definition; containers build their children
/// through the registry they receive
pub type ActionFactory =
    dyn Fn(&ActionDefinition, &ActionRegistry) -> Result<Arc<dyn TestAction>, ActionError>
        + Send
        + Sync;

/// Keys of `async` holding child action lists next to `actions`
const ASYNC_NESTED: &[&str] = &["success", "error"];

#[derive(Clone)]
pub struct ActionRegistry {
    factories: Arc<DashMap<String, Arc<ActionFactory>>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.names())
            .finish()
    }
}

impl ActionRegistry {
    /// Registry knowing every built-in action
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register_builtins();
        registry
    }

    pub fn empty() -> Self {
        Self {
            factories: Arc::new(DashMap::new()),
        }
    }

    /// Register or replace the factory for `name`
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&ActionDefinition, &ActionRegistry) -> Result<Arc<dyn TestAction>, ActionError>
            + Send
            + Sync
            + 'static,
    {
        let name = name.into();
        debug!("Registering action '{}'", name);
        self.factories.insert(name, Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn create(&self, definition: &ActionDefinition) -> Result<Arc<dyn TestAction>, ActionError> {
        let factory = self
            .factories
            .get(&definition.action)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown_action(&definition.action))?;
        factory(definition, self)
    }

    pub fn create_all(
        &self,
        definitions: &[ActionDefinition],
    ) -> Result<Vec<Arc<dyn TestAction>>, ActionError> {
        definitions.iter().map(|d| self.create(d)).collect()
    }

    /// Builder for a definition whose action names were checked up front
    pub fn builder(&self, definition: &ActionDefinition) -> Result<ActionBuilder, ActionError> {
        self.check_names(definition)?;
        let registry = self.clone();
        let definition = definition.clone();
        Ok(ActionBuilder::new(move || registry.create(&definition)))
    }

    fn check_names(&self, definition: &ActionDefinition) -> Result<(), ActionError> {
        if !self.contains(&definition.action) {
            return Err(unknown_action(&definition.action));
        }
        for child in &definition.actions {
            self.check_names(child)?;
        }
        for key in ASYNC_NESTED {
            if let Ok(nested) = definition.nested(key) {
                for child in &nested {
                    self.check_names(child)?;
                }
            }
        }
        Ok(())
    }

    fn register_builtins(&self) {
        self.register("send", |d, _| {
            Ok(Arc::new(SendMessage::from_config(d.config::<SendConfig>(&[])?)))
        });
        self.register("receive", |d, _| {
            Ok(Arc::new(ReceiveMessage::from_config(
                d.config::<ReceiveConfig>(&[])?,
            )))
        });
        self.register("receive-timeout", |d, _| {
            Ok(Arc::new(ReceiveTimeout::from_config(
                d.config::<ReceiveTimeoutConfig>(&[])?,
            )))
        });
        self.register("purge-endpoint", |d, _| {
            Ok(Arc::new(PurgeEndpoint::from_config(
                d.config::<PurgeConfig>(&[])?,
            )))
        });
        self.register("sleep", |d, _| {
            Ok(Arc::new(Sleep::from_config(d.config::<SleepConfig>(&[])?)))
        });
        self.register("echo", |d, _| {
            Ok(Arc::new(Echo::from_config(d.config::<EchoConfig>(&[])?)))
        });
        self.register("create-variables", |d, _| {
            Ok(Arc::new(CreateVariables::from_config(
                d.config::<CreateVariablesConfig>(&[])?,
            )))
        });
        self.register("fail", |d, _| {
            Ok(Arc::new(Fail::from_config(d.config::<FailConfig>(&[])?)))
        });
        self.register("stop-timer", |d, _| {
            Ok(Arc::new(StopTimer::from_config(
                d.config::<StopTimerConfig>(&[])?,
            )))
        });
        self.register("wait-async", |d, _| {
            Ok(Arc::new(WaitAsync::from_config(
                d.config::<WaitAsyncConfig>(&[])?,
            )))
        });

        let sequential = |d: &ActionDefinition,
                          r: &ActionRegistry|
         -> Result<Arc<dyn TestAction>, ActionError> {
            no_properties(d)?;
            Ok(Arc::new(Sequence::new(r.create_all(&d.actions)?)))
        };
        self.register("sequential", sequential);
        self.register("sequence", sequential);
        self.register("parallel", |d, r| {
            no_properties(d)?;
            Ok(Arc::new(Parallel::new(r.create_all(&d.actions)?)))
        });
        self.register("iterate", |d, r| {
            Ok(Arc::new(Iterate::from_config(
                d.config::<LoopConfig>(&[])?,
                r.create_all(&d.actions)?,
            )))
        });
        self.register("repeat-until-true", |d, r| {
            Ok(Arc::new(RepeatUntilTrue::from_config(
                d.config::<LoopConfig>(&[])?,
                r.create_all(&d.actions)?,
            )))
        });
        self.register("conditional", |d, r| {
            Ok(Arc::new(Conditional::from_config(
                d.config::<ConditionalConfig>(&[])?,
                r.create_all(&d.actions)?,
            )))
        });
        self.register("catch", |d, r| {
            Ok(Arc::new(Catch::from_config(
                d.config::<CatchConfig>(&[])?,
                r.create_all(&d.actions)?,
            )))
        });
        self.register("assert-exception", |d, r| {
            let config = d.config::<AssertExceptionConfig>(&[])?;
            let mut actions = r.create_all(&d.actions)?;
            let action = match actions.len() {
                0 => {
                    return Err(ActionError::configuration(
                        "Action 'assert-exception' needs a nested action",
                    ))
                }
                1 => actions.remove(0),
                _ => Arc::new(Sequence::new(actions)) as Arc<dyn TestAction>,
            };
            Ok(Arc::new(AssertException::from_config(config, action)))
        });
        self.register("async", |d, r| {
            no_properties_except(d, ASYNC_NESTED)?;
            let success = r.create_all(&d.nested("success")?)?;
            let error = r.create_all(&d.nested("error")?)?;
            Ok(Arc::new(
                AsyncAction::new(r.create_all(&d.actions)?)
                    .on_success(success)
                    .on_error(error),
            ))
        });
        self.register("timer", |d, r| {
            Ok(Arc::new(Timer::from_config(
                d.config::<TimerConfig>(&[])?,
                r.create_all(&d.actions)?,
            )))
        });
    }
}

fn unknown_action(name: &str) -> ActionError {
    ActionError::configuration(format!("Unknown test action '{}'", name))
}

fn no_properties(definition: &ActionDefinition) -> Result<(), ActionError> {
    no_properties_except(definition, &[])
}

fn no_properties_except(definition: &ActionDefinition, allowed: &[&str]) -> Result<(), ActionError> {
    match definition
        .properties
        .keys()
        .find(|key| !allowed.contains(&key.as_str()))
    {
        Some(key) => Err(ActionError::configuration(format!(
            "Unknown property '{}' for action '{}'",
            key, definition.action
        ))),
        None => Ok(()),
    }
}
