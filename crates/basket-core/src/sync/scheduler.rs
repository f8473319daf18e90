//! Cancellable one-shot timer for the next sync cycle.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

const LONGEST_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Holds at most one pending deadline.
///
/// Arming replaces any earlier deadline, so two cycles can never be queued
/// by the timer at once.
#[derive(Debug, Default)]
pub struct Scheduler {
    deadline: Option<Instant>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self { deadline: None }
    }

    /// Fire after `after`. A delay past what the clock can represent is capped.
    pub fn arm(&mut self, after: Duration) {
        let now = Instant::now();
        let deadline = now
            .checked_add(after)
            .or_else(|| now.checked_add(LONGEST_DELAY))
            .unwrap_or(now);
        self.deadline = Some(deadline);
    }

    /// Drop the pending deadline. Returns whether one was armed.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub const fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve when the deadline passes, disarming the timer.
    ///
    /// Never resolves while disarmed. Dropping the future keeps the deadline.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
