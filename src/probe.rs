//! Dialect probing.
//!
//! An unknown engine is sent the UCI and CECP handshakes back to back. The
//! first conclusive reply decides: `uciok` means UCI, `feature done` means
//! CECP. Silence until the probe timeout means the dialect is unknown.

use std::time::Duration;

use log::{info, warn};

use crate::channel::{EngineCommand, LineChannel, ProcessChannel};
use crate::engine::{CecpEngine, Dialect, SessionConfig};
use crate::error::EngineError;
use crate::session::{Command, Completion, Effects, Session};
use crate::xboard::XBoardCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProbeState {
    Idle,
    Waiting,
    Finished,
}

/// Races the handshakes of both dialects.
#[derive(Debug)]
pub struct ProbeCommand {
    timeout: Duration,
    state: ProbeState,
    completion: Completion<Dialect>,
}

impl ProbeCommand {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        ProbeCommand {
            timeout,
            state: ProbeState::Idle,
            completion: Completion::Pending,
        }
    }

    fn decide(&mut self, dialect: Dialect) {
        self.completion.set_result(dialect);
        self.state = ProbeState::Finished;
    }
}

impl Command for ProbeCommand {
    type Output = Dialect;

    fn start(&mut self, _session: &mut Session, fx: &mut Effects) {
        fx.send(XBoardCommand::Uci);
        fx.send(XBoardCommand::XBoard);
        fx.send(XBoardCommand::Protover(2));
        fx.arm_timer(self.timeout);
        self.state = ProbeState::Waiting;
    }

    fn line_received(&mut self, _session: &mut Session, line: &str, fx: &mut Effects) {
        if !self.completion.is_pending() {
            return;
        }
        if let Some(dialect) = Dialect::detect(line) {
            fx.cancel_timer();
            self.decide(dialect);
        }
    }

    fn timeout(&mut self, _session: &mut Session, _fx: &mut Effects) {
        info!("Timeout during probing");
        self.decide(Dialect::Unknown);
    }

    fn engine_terminated(&mut self, _session: &mut Session, fx: &mut Effects) {
        if self.completion.is_pending() {
            warn!("Engine terminated during probing");
        }
        fx.cancel_timer();
        self.decide(Dialect::Unknown);
    }

    fn completion(&mut self) -> &mut Completion<Dialect> {
        &mut self.completion
    }

    fn finish(&mut self) {
        self.state = ProbeState::Finished;
    }

    fn is_finished(&self) -> bool {
        self.state == ProbeState::Finished
    }
}

/// Probe the engine behind `channel`, then ask it to quit.
pub async fn probe_channel<C: LineChannel>(channel: C, config: SessionConfig) -> Result<Dialect, EngineError> {
    let mut engine = CecpEngine::new(channel, config);
    let dialect = engine.run(&mut ProbeCommand::new(config.probe_timeout), std::future::pending()).await;
    if let Err(err) = engine.quit().await {
        warn!("Failed to quit probed engine: {err}");
    }
    dialect
}

/// Spawn the engine described by `command` and classify its dialect.
pub async fn probe(command: &EngineCommand, config: SessionConfig) -> Result<Dialect, EngineError> {
    let channel = ProcessChannel::spawn(command)?;
    let dialect = probe_channel(channel, config).await?;
    info!("{command}: speaks {dialect}");
    Ok(dialect)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> (ProbeCommand, Session, Effects) {
        let mut cmd = ProbeCommand::new(Duration::from_secs(2));
        let mut session = Session::default();
        let mut fx = Effects::new();
        cmd.start(&mut session, &mut fx);
        (cmd, session, fx)
    }

    fn outcome(cmd: &mut ProbeCommand) -> Dialect {
        cmd.completion().take().unwrap().unwrap()
    }

    #[test]
    fn sends_both_handshakes() {
        let (_, _, mut fx) = started();
        assert_eq!(
            fx.take_sent(),
            [XBoardCommand::Uci, XBoardCommand::XBoard, XBoardCommand::Protover(2)]
        );
    }

    #[test]
    fn uciok_first_is_uci() {
        let (mut cmd, mut session, mut fx) = started();
        cmd.line_received(&mut session, "id name Stockfish", &mut fx);
        cmd.line_received(&mut session, "uciok", &mut fx);
        cmd.line_received(&mut session, "feature done=1", &mut fx);
        assert!(cmd.is_finished());
        assert_eq!(outcome(&mut cmd), Dialect::Uci);
    }

    #[test]
    fn feature_done_first_is_cecp() {
        let (mut cmd, mut session, mut fx) = started();
        cmd.line_received(&mut session, "Error (unknown command): uci", &mut fx);
        cmd.line_received(&mut session, "feature ping=1 setboard=1", &mut fx);
        cmd.line_received(&mut session, "feature done=1", &mut fx);
        cmd.line_received(&mut session, "uciok", &mut fx);
        assert_eq!(outcome(&mut cmd), Dialect::Cecp);
    }

    #[test]
    fn timeout_is_unknown_and_sticks() {
        let (mut cmd, mut session, mut fx) = started();
        cmd.timeout(&mut session, &mut fx);
        cmd.line_received(&mut session, "uciok", &mut fx);
        assert_eq!(outcome(&mut cmd), Dialect::Unknown);
    }

    #[test]
    fn termination_is_unknown() {
        let (mut cmd, mut session, mut fx) = started();
        cmd.engine_terminated(&mut session, &mut fx);
        assert_eq!(outcome(&mut cmd), Dialect::Unknown);
    }
}
