//! Containers composing child actions

mod async_action;
mod catch;
mod flow;
mod loops;
mod timer;

pub use async_action::{AsyncAction, AsyncTracker};
pub use catch::{AssertException, AssertExceptionConfig, Catch, CatchConfig};
pub use flow::{Parallel, Sequence};
pub use loops::{Conditional, ConditionalConfig, Iterate, LoopConfig, RepeatUntilTrue};
pub use timer::{Timer, TimerConfig, TimerRegistry};
