//! Search limits and their translation into `XBoard` time controls.
//!
//! A [`Limit`] is dialect-neutral. [`time_control_commands`] turns it into the
//! `level`/`sd`/`st`/`time`/`otim` lines sent before `go`, from the point of
//! view of the side to move.

use std::time::Duration;

use shakmaty::Color;

use crate::error::EngineError;
use crate::xboard::XBoardCommand;

/// Limits for a single search.
///
/// Every field is optional; fields that are `None` are not sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Limit {
    /// Fixed time per move
    pub time: Option<Duration>,
    /// Maximum search depth
    pub depth: Option<u32>,
    /// Node budget (cannot be combined with any time limit)
    pub nodes: Option<u64>,
    /// Search for a mate in N. Not expressible in this dialect and ignored.
    pub mate: Option<u32>,
    pub white_clock: Option<Duration>,
    pub black_clock: Option<Duration>,
    pub white_inc: Option<Duration>,
    pub black_inc: Option<Duration>,
    /// Moves until the next time control
    pub remaining_moves: Option<u32>,
}

impl Limit {
    /// Fixed time per move.
    #[must_use]
    pub fn move_time(time: Duration) -> Self {
        Limit {
            time: Some(time),
            ..Limit::default()
        }
    }

    /// Fixed depth.
    #[must_use]
    pub fn depth(depth: u32) -> Self {
        Limit {
            depth: Some(depth),
            ..Limit::default()
        }
    }

    /// Both clocks with equal increments.
    #[must_use]
    pub fn clocks(white: Duration, black: Duration, inc: Duration) -> Self {
        Limit {
            white_clock: Some(white),
            black_clock: Some(black),
            white_inc: Some(inc),
            black_inc: Some(inc),
            ..Limit::default()
        }
    }

    fn clock(&self, side: Color) -> Option<Duration> {
        match side {
            Color::White => self.white_clock,
            Color::Black => self.black_clock,
        }
    }

    fn increment(&self, side: Color) -> Option<Duration> {
        match side {
            Color::White => self.white_inc,
            Color::Black => self.black_inc,
        }
    }

    /// Reject combinations the dialect cannot express.
    pub fn validate(&self, turn: Color) -> Result<(), EngineError> {
        if self.nodes.is_some()
            && (self.time.is_some()
                || self.white_clock.is_some()
                || self.black_clock.is_some()
                || self.increment(turn).is_some())
        {
            return Err(EngineError::Config(
                "xboard does not support mixing node limits with time limits".to_string(),
            ));
        }
        Ok(())
    }
}

/// Time control lines for a search by `turn`.
///
/// Validates first, so an error means nothing should be sent.
pub fn time_control_commands(limit: &Limit, turn: Color) -> Result<Vec<XBoardCommand>, EngineError> {
    limit.validate(turn)?;

    let mut commands = Vec::new();
    let increment = limit.increment(turn).unwrap_or_default();
    let remaining = limit.remaining_moves.unwrap_or(0);

    if remaining > 0 || !increment.is_zero() {
        let base = limit.clock(turn).unwrap_or_default();
        commands.push(XBoardCommand::Level {
            moves_per_session: remaining,
            base_seconds: base.as_secs(),
            increment,
        });
    }

    if let Some(depth) = limit.depth {
        commands.push(XBoardCommand::Sd(depth));
    }
    if let Some(time) = limit.time {
        commands.push(XBoardCommand::St(time));
    }

    // "time" is always the engine's own clock
    if let Some(own) = limit.clock(turn) {
        commands.push(XBoardCommand::Time(centiseconds(own)));
    }
    if let Some(other) = limit.clock(!turn) {
        commands.push(XBoardCommand::OTime(centiseconds(other)));
    }

    Ok(commands)
}

fn centiseconds(d: Duration) -> u64 {
    u64::try_from(d.as_millis() / 10).unwrap_or(u64::MAX)
}
