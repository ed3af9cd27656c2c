//! Deadline driven polling shared by every receiving endpoint

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Cooperative interruption of pending receives
///
/// Interrupting wakes every poller currently waiting; their receive reports
/// a timeout. The flag stays set until [`Interrupt::reset`].
#[derive(Debug, Default)]
pub struct Interrupt {
    interrupted: AtomicBool,
    notify: Notify,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn reset(&self) {
        self.interrupted.store(false, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    /// Resolves once [`Interrupt::interrupt`] has been called
    pub async fn interrupted(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_interrupted() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of a polling loop
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T> {
    Ready(T),
    TimedOut,
    Interrupted,
}

impl<T> PollOutcome<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            PollOutcome::Ready(value) => Some(value),
            PollOutcome::TimedOut | PollOutcome::Interrupted => None,
        }
    }
}

/// Try `attempt` until it yields a value or `timeout` elapses.
///
/// Between attempts the loop sleeps for the polling interval, clamped to the
/// time left, or until `wake` resolves. `wake` is created before each attempt
/// so a value stored in between is never missed. A zero timeout makes exactly
/// one attempt.
pub async fn poll_until<T, A, W, F>(
    mut attempt: A,
    mut wake: W,
    timeout: Duration,
    polling_interval: Duration,
    interrupt: &Interrupt,
    description: &str,
) -> PollOutcome<T>
where
    A: FnMut() -> Option<T>,
    W: FnMut() -> F,
    F: Future<Output = ()>,
{
    let deadline = Instant::now() + timeout;

    loop {
        let woken = wake();
        tokio::pin!(woken);

        if let Some(value) = attempt() {
            return PollOutcome::Ready(value);
        }

        if interrupt.is_interrupted() {
            debug!("Polling for {} interrupted", description);
            return PollOutcome::Interrupted;
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return PollOutcome::TimedOut;
        }

        let tick = polling_interval.min(remaining);
        trace!(
            "{} not available yet, retrying in {} ms",
            description,
            tick.as_millis()
        );

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = &mut woken => {}
            _ = interrupt.interrupted() => {
                debug!("Polling for {} interrupted", description);
                return PollOutcome::Interrupted;
            }
        }
    }
}
