//! Searching for a move.
//!
//! The command resyncs the engine, sends the time control and `go`, and
//! waits for `move`. The move is only final once the engine has answered a
//! `ping` sent after it, so a trailing `offer draw`, `resign` or result line
//! is not missed. With pondering enabled the command stays open after
//! resolving, until the next command cancels it.

use log::warn;
use shakmaty::Move;

use crate::board::GameBoard;
use crate::engine::options::ConfigMapping;
use crate::engine::time::{time_control_commands, Limit};
use crate::error::EngineError;
use crate::session::{Command, Completion, Effects, GameId, Session};
use crate::xboard::{
    classify_play_line, parse_thinking, Info, InfoFlags, PlayLine, PongTokens, XBoardCommand,
};

/// Outcome of a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayResult {
    /// The engine's move. `None` if it resigned or claimed a result instead.
    pub mv: Option<Move>,
    /// Expected reply, from a `Hint:` line
    pub ponder: Option<Move>,
    pub draw_offered: bool,
    pub resigned: bool,
    /// Last thinking output, if requested
    pub info: Option<Info>,
}

/// Per-call play settings.
#[derive(Debug, Clone, Default)]
pub struct PlayOptions {
    /// Game identity; a change starts a new game
    pub game: Option<GameId>,
    pub info: InfoFlags,
    /// Let the engine think on the opponent's time
    pub ponder: bool,
    /// Restrict the search to these moves. Only supported in analysis mode,
    /// so any value is rejected.
    pub root_moves: Option<Vec<Move>>,
    pub options: ConfigMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayState {
    Idle,
    Searching,
    /// Move received, waiting for the ping echo
    Confirming,
    /// Resolved, engine thinking on our time
    Pondering,
    /// Cancelled, waiting for the settle ping echo
    Settling,
    Finished,
}

#[derive(Debug)]
pub struct PlayCommand {
    board: GameBoard,
    limit: Limit,
    options: PlayOptions,
    state: PlayState,
    result: PlayResult,
    completion: Completion<PlayResult>,
    pongs: PongTokens,
    ping_base: u32,
    stopped: bool,
}

impl PlayCommand {
    #[must_use]
    pub fn new(board: GameBoard, limit: Limit, options: PlayOptions) -> Self {
        Self::with_ping_token(board, limit, options, u32::from(rand::random::<u16>()))
    }

    /// Like [`new`](Self::new) with a fixed ping token; `ping N` confirms the
    /// move and `ping N+1` settles a cancelled search.
    #[must_use]
    pub fn with_ping_token(board: GameBoard, limit: Limit, options: PlayOptions, token: u32) -> Self {
        PlayCommand {
            board,
            limit,
            options,
            state: PlayState::Idle,
            result: PlayResult::default(),
            completion: Completion::Pending,
            pongs: PongTokens::default(),
            ping_base: token,
            stopped: false,
        }
    }

    /// Whether the command resolved but keeps the engine pondering.
    #[must_use]
    pub fn is_pondering(&self) -> bool {
        self.state == PlayState::Pondering
    }

    fn begin(&mut self, session: &mut Session, fx: &mut Effects) -> Result<(), EngineError> {
        if self.options.root_moves.is_some() {
            return Err(EngineError::Config(
                "play with root_moves, but xboard supports 'include' only in analysis mode"
                    .to_string(),
            ));
        }
        let turn = self.board.turn();
        let time_control = time_control_commands(&self.limit, turn)?;

        session.resync(&self.board, self.options.game, &self.options.options, fx)?;

        for command in time_control {
            fx.send(command);
        }
        fx.send(if self.options.info.is_empty() {
            XBoardCommand::NoPost
        } else {
            XBoardCommand::Post
        });
        fx.send(if self.options.ponder {
            XBoardCommand::Hard
        } else {
            XBoardCommand::Easy
        });
        fx.send(XBoardCommand::Go);
        Ok(())
    }

    fn fail(&mut self, err: EngineError) {
        self.completion.set_error(err);
        self.state = PlayState::Finished;
    }

    fn resolve(&mut self) {
        self.completion.set_result(std::mem::take(&mut self.result));
    }

    fn ping_after_move(&mut self, fx: &mut Effects) {
        if self.pongs.after_move.is_some() {
            return;
        }
        self.pongs.after_move = Some(format!("pong {}", self.ping_base));
        fx.send(XBoardCommand::Ping(self.ping_base));
        if self.state == PlayState::Searching {
            self.state = PlayState::Confirming;
        }
    }

    fn on_move(&mut self, session: &mut Session, arg: &str, fx: &mut Effects) {
        if self.completion.is_pending() && self.result.mv.is_none() {
            match session.board_mut().push_xboard(arg) {
                Ok(mv) => {
                    self.result.mv = Some(mv);
                    self.ping_after_move(fx);
                }
                Err(err) => {
                    session.invalidate_board();
                    self.fail(err.into());
                }
            }
        } else if let Err(err) = session.board_mut().push_xboard(arg) {
            warn!("{session}: exception playing unexpected move: {err}");
        }
    }

    fn on_hint(&mut self, session: &Session, arg: &str) {
        if self.completion.is_pending() && self.result.mv.is_some() && self.result.ponder.is_none() {
            match session.board().parse_xboard(arg) {
                Ok(mv) => self.result.ponder = Some(mv),
                Err(err) => warn!("{session}: exception parsing hint: {err}"),
            }
        } else {
            warn!("{session}: unexpected hint: {arg}");
        }
    }
}

impl Command for PlayCommand {
    type Output = PlayResult;

    fn start(&mut self, session: &mut Session, fx: &mut Effects) {
        match self.begin(session, fx) {
            Ok(()) => self.state = PlayState::Searching,
            Err(err) => self.fail(err),
        }
    }

    fn line_received(&mut self, session: &mut Session, line: &str, fx: &mut Effects) {
        match classify_play_line(line, &self.pongs) {
            PlayLine::Move(arg) => self.on_move(session, &arg, fx),
            PlayLine::Hint(arg) => self.on_hint(session, &arg),
            PlayLine::PongAfterMove => {
                self.resolve();
                // while settling only the settle pong ends the command
                if self.state == PlayState::Confirming {
                    if self.options.ponder {
                        self.state = PlayState::Pondering;
                    } else {
                        fx.cancel_timer();
                        self.state = PlayState::Finished;
                    }
                }
            }
            PlayLine::PongAfterPonder => {
                self.resolve();
                fx.cancel_timer();
                self.state = PlayState::Finished;
            }
            PlayLine::OfferDraw => {
                if self.completion.is_pending() {
                    self.result.draw_offered = true;
                }
                self.ping_after_move(fx);
            }
            PlayLine::Resign => {
                if self.completion.is_pending() {
                    self.result.resigned = true;
                }
                self.ping_after_move(fx);
            }
            PlayLine::Result(_) => self.ping_after_move(fx),
            PlayLine::Comment => {}
            PlayLine::Error(line) => {
                // board state might no longer be in sync
                session.invalidate_board();
                fx.cancel_timer();
                self.fail(EngineError::Protocol(line));
            }
            PlayLine::Thinking(line) => {
                if self.completion.is_pending() {
                    self.result.info = Some(parse_thinking(&line, session.board(), self.options.info));
                }
            }
            PlayLine::Unexpected(line) => warn!("{session}: Unexpected engine output: {line}"),
        }
    }

    fn timeout(&mut self, session: &mut Session, _fx: &mut Effects) {
        if self.state == PlayState::Settling {
            warn!("{session}: engine did not settle after cancellation, forcing a new game");
            session.invalidate_board();
            self.state = PlayState::Finished;
        }
    }

    fn cancel(&mut self, session: &mut Session, fx: &mut Effects) {
        if self.stopped || self.state == PlayState::Finished {
            return;
        }
        self.stopped = true;

        let mut settle = false;
        if self.completion.is_cancelled() {
            // after `move` the engine is idle and may reject `?`
            if self.state == PlayState::Searching {
                fx.send(XBoardCommand::MoveNow);
            }
            settle = true;
        }
        if self.options.ponder {
            fx.send(XBoardCommand::Easy);
            settle = true;
        }

        if settle {
            let token = self.ping_base.wrapping_add(1);
            self.pongs.after_ponder = Some(format!("pong {token}"));
            fx.send(XBoardCommand::Ping(token));
            fx.arm_timer(session.config().settle_timeout);
            self.state = PlayState::Settling;
        } else {
            self.state = PlayState::Finished;
        }
    }

    fn engine_terminated(&mut self, _session: &mut Session, _fx: &mut Effects) {
        // allow terminating the engine while pondering
        self.completion.set_error(EngineError::Terminated);
        self.state = PlayState::Finished;
    }

    fn completion(&mut self) -> &mut Completion<PlayResult> {
        &mut self.completion
    }

    fn finish(&mut self) {
        self.state = PlayState::Finished;
    }

    fn is_finished(&self) -> bool {
        self.state == PlayState::Finished
    }
}
