//! The command abstraction shared by every session operation.
//!
//! A command never touches I/O. The driver feeds it events and it answers by
//! recording lines to send and timer requests in an [`Effects`] buffer, which
//! the driver flushes after every event.

use std::time::Duration;

use crate::error::EngineError;
use crate::session::Session;
use crate::xboard::XBoardCommand;

/// Timer request from a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEffect {
    Arm(Duration),
    Cancel,
}

/// Side effects requested while handling one event.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    sent: Vec<XBoardCommand>,
    timer: Option<TimerEffect>,
}

impl Effects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&mut self, command: XBoardCommand) {
        self.sent.push(command);
    }

    pub fn arm_timer(&mut self, after: Duration) {
        self.timer = Some(TimerEffect::Arm(after));
    }

    pub fn cancel_timer(&mut self) {
        self.timer = Some(TimerEffect::Cancel);
    }

    /// Lines queued so far, oldest first.
    #[must_use]
    pub fn sent(&self) -> &[XBoardCommand] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<XBoardCommand> {
        std::mem::take(&mut self.sent)
    }

    pub fn take_timer(&mut self) -> Option<TimerEffect> {
        self.timer.take()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty() && self.timer.is_none()
    }
}

/// Single-assignment result slot.
#[derive(Debug)]
pub enum Completion<T> {
    Pending,
    Resolved(Result<T, EngineError>),
    /// The caller stopped waiting before a result was set
    Cancelled,
    /// The result has been handed to the caller
    Delivered,
}

impl<T> Default for Completion<T> {
    fn default() -> Self {
        Completion::Pending
    }
}

impl<T> Completion<T> {
    /// Set the value if nothing has been set yet. Returns whether it was set.
    pub fn set_result(&mut self, value: T) -> bool {
        self.resolve(Ok(value))
    }

    /// Set an error if nothing has been set yet. Returns whether it was set.
    pub fn set_error(&mut self, err: EngineError) -> bool {
        self.resolve(Err(err))
    }

    fn resolve(&mut self, outcome: Result<T, EngineError>) -> bool {
        if self.is_pending() {
            *self = Completion::Resolved(outcome);
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Completion::Pending)
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Completion::Cancelled)
    }

    /// Give up on the result. Returns whether the slot was still pending.
    pub fn cancel(&mut self) -> bool {
        if self.is_pending() {
            *self = Completion::Cancelled;
            true
        } else {
            false
        }
    }

    /// Hand the outcome to the caller, once.
    pub fn take(&mut self) -> Option<Result<T, EngineError>> {
        match std::mem::replace(self, Completion::Delivered) {
            Completion::Resolved(outcome) => Some(outcome),
            Completion::Cancelled => {
                *self = Completion::Cancelled;
                Some(Err(EngineError::Cancelled))
            }
            other => {
                *self = other;
                None
            }
        }
    }
}

/// A session operation driven by events.
///
/// Exactly one command is active per session. After [`start`](Command::start)
/// the driver delivers lines, timeouts, cancellation and termination until the
/// command reports [`is_finished`](Command::is_finished). The completion may
/// resolve earlier than that, e.g. a play command keeps listening while the
/// engine ponders.
pub trait Command {
    type Output;

    fn start(&mut self, session: &mut Session, fx: &mut Effects);

    fn line_received(&mut self, session: &mut Session, line: &str, fx: &mut Effects);

    fn timeout(&mut self, _session: &mut Session, _fx: &mut Effects) {}

    /// The caller gave up, or the next command needs the engine. Must be
    /// idempotent.
    fn cancel(&mut self, _session: &mut Session, _fx: &mut Effects) {
        self.finish();
    }

    /// The engine closed its output.
    fn engine_terminated(&mut self, _session: &mut Session, _fx: &mut Effects) {
        self.completion().set_error(EngineError::Terminated);
        self.finish();
    }

    fn completion(&mut self) -> &mut Completion<Self::Output>;

    fn finish(&mut self);

    fn is_finished(&self) -> bool;
}
