//! Cancellable deadline for the active command.
//!
//! Commands ask for a timer through their effects; the driver keeps a single
//! [`CommandTimer`] and races it against inbound lines.

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

/// Calculate the duration from now until a deadline, if the deadline is in the future.
#[inline]
fn duration_until(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if deadline > now {
        Some(deadline - now)
    } else {
        None
    }
}

/// A single-shot timer that can be re-armed or cancelled.
#[derive(Debug, Default)]
pub struct CommandTimer {
    deadline: Option<Instant>,
}

impl CommandTimer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer.
    pub fn arm(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    /// Disarm without firing.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the timer fires.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| duration_until(d).unwrap_or_default())
    }

    /// Resolve when the deadline passes, disarming the timer. Pending forever
    /// while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the timer armed.
    pub async fn expired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
