use crate::expression::evaluate_condition;
use crate::{run_all, ActionError, TestAction};
use async_trait::async_trait;
use framework_config::defaults;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use types::TestContext;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoopConfig {
    pub condition: String,
    #[serde(default = "default_index_name")]
    pub index_name: String,
    #[serde(default = "default_one")]
    pub start: i64,
    #[serde(default = "default_one")]
    pub step: i64,
}

fn default_index_name() -> String {
    defaults::actions::INDEX_NAME.to_string()
}

fn default_one() -> i64 {
    1
}

#[derive(Debug, Clone)]
struct LoopSpec {
    condition: String,
    index_name: String,
    start: i64,
    step: i64,
    actions: Vec<Arc<dyn TestAction>>,
}

impl LoopSpec {
    fn new(condition: String, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            condition,
            index_name: default_index_name(),
            start: 1,
            step: 1,
            actions,
        }
    }

    fn from_config(config: LoopConfig, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            condition: config.condition,
            index_name: config.index_name,
            start: config.start,
            step: config.step,
            actions,
        }
    }

    fn check(&self, context: &TestContext, index: i64) -> Result<bool, ActionError> {
        evaluate_condition(&self.condition, context, Some((&self.index_name, index)))
    }

    fn advance(&self, index: i64) -> Result<i64, ActionError> {
        index.checked_add(self.step).ok_or_else(|| {
            ActionError::runtime(format!(
                "Loop index '{}' overflows after {}",
                self.index_name, index
            ))
        })
    }

    async fn run_iteration(&self, context: &TestContext, index: i64) -> Result<(), ActionError> {
        debug!("Iteration {} = {}", self.index_name, index);
        context.set_variable(self.index_name.clone(), index);
        run_all(&self.actions, context).await
    }
}

macro_rules! loop_builders {
    ($container:ident) => {
        impl $container {
            pub fn new(condition: impl Into<String>, actions: Vec<Arc<dyn TestAction>>) -> Self {
                Self {
                    spec: LoopSpec::new(condition.into(), actions),
                }
            }

            pub fn from_config(config: LoopConfig, actions: Vec<Arc<dyn TestAction>>) -> Self {
                Self {
                    spec: LoopSpec::from_config(config, actions),
                }
            }

            pub fn index_name(mut self, index_name: impl Into<String>) -> Self {
                self.spec.index_name = index_name.into();
                self
            }

            pub fn start(mut self, start: i64) -> Self {
                self.spec.start = start;
                self
            }

            pub fn step(mut self, step: i64) -> Self {
                self.spec.step = step;
                self
            }
        }
    };
}

/// `while condition(index)`: run the body, then advance the index
#[derive(Debug, Clone)]
pub struct Iterate {
    spec: LoopSpec,
}

loop_builders!(Iterate);

#[async_trait]
impl TestAction for Iterate {
    fn name(&self) -> &str {
        "iterate"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let mut index = self.spec.start;
        while self.spec.check(context, index)? {
            self.spec.run_iteration(context, index).await?;
            index = self.spec.advance(index)?;
        }
        info!("Iterate condition false at {} = {}", self.spec.index_name, index);
        Ok(())
    }
}

/// Run the body, advance the index, stop once the condition holds
#[derive(Debug, Clone)]
pub struct RepeatUntilTrue {
    spec: LoopSpec,
}

loop_builders!(RepeatUntilTrue);

#[async_trait]
impl TestAction for RepeatUntilTrue {
    fn name(&self) -> &str {
        "repeat-until-true"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        let mut index = self.spec.start;
        loop {
            self.spec.run_iteration(context, index).await?;
            index = self.spec.advance(index)?;
            if self.spec.check(context, index)? {
                break;
            }
        }
        Ok(())
    }
}

/// Run the body only when the condition evaluates to true
#[derive(Debug, Clone)]
pub struct Conditional {
    condition: String,
    actions: Vec<Arc<dyn TestAction>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionalConfig {
    pub condition: String,
}

impl Conditional {
    pub fn new(condition: impl Into<String>, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self {
            condition: condition.into(),
            actions,
        }
    }

    pub fn from_config(config: ConditionalConfig, actions: Vec<Arc<dyn TestAction>>) -> Self {
        Self::new(config.condition, actions)
    }
}

#[async_trait]
impl TestAction for Conditional {
    fn name(&self) -> &str {
        "conditional"
    }

    async fn execute(&self, context: &TestContext) -> Result<(), ActionError> {
        if evaluate_condition(&self.condition, context, None)? {
            debug!("Condition [ {} ] evaluates to true, executing nested actions", self.condition);
            run_all(&self.actions, context).await
        } else {
            debug!("Condition [ {} ] evaluates to false, skipping nested actions", self.condition);
            Ok(())
        }
    }
}
