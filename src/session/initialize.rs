//! The `xboard` handshake.

use log::{debug, error};

use crate::error::EngineError;
use crate::session::{Command, Completion, Effects, Session};
use crate::xboard::{feature_args, is_error_line, XBoardCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Idle,
    AwaitingName,
    Handshake,
    Finished,
}

/// Announces the dialect and collects the engine's name.
///
/// Version 1 engines do not say when they are done, so the handshake always
/// runs until the init timeout and then completes successfully.
#[derive(Debug)]
pub struct InitializeCommand {
    state: InitState,
    completion: Completion<()>,
}

impl InitializeCommand {
    #[must_use]
    pub fn new() -> Self {
        InitializeCommand {
            state: InitState::Idle,
            completion: Completion::Pending,
        }
    }

    fn fail(&mut self, err: EngineError, fx: &mut Effects) {
        fx.cancel_timer();
        self.completion.set_error(err);
        self.state = InitState::Finished;
    }
}

impl Default for InitializeCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl Command for InitializeCommand {
    type Output = ();

    fn start(&mut self, session: &mut Session, fx: &mut Effects) {
        if session.is_initialized() {
            self.completion.set_error(EngineError::AlreadyInitialized);
            self.state = InitState::Finished;
            return;
        }
        fx.send(XBoardCommand::XBoard);
        fx.arm_timer(session.config().init_timeout);
        self.state = InitState::AwaitingName;
    }

    fn line_received(&mut self, session: &mut Session, line: &str, fx: &mut Effects) {
        if self.state == InitState::AwaitingName && !line.is_empty() {
            session.set_name(line);
            self.state = InitState::Handshake;
        } else if line.starts_with('#') {
            // comment
        } else if let Some(args) = feature_args(line) {
            session.hooks().on_feature(args);
        } else if is_error_line(line) {
            self.fail(EngineError::Protocol(line.to_string()), fx);
        } else if !line.is_empty() {
            debug!("{session}: ignoring handshake line: {line}");
        }
    }

    fn timeout(&mut self, session: &mut Session, _fx: &mut Effects) {
        error!("{session}: Timeout during initialization");
        session.mark_initialized();
        self.completion.set_result(());
        self.state = InitState::Finished;
    }

    fn completion(&mut self) -> &mut Completion<()> {
        &mut self.completion
    }

    fn finish(&mut self) {
        self.state = InitState::Finished;
    }

    fn is_finished(&self) -> bool {
        self.state == InitState::Finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(session: &mut Session) -> (InitializeCommand, Effects) {
        let mut cmd = InitializeCommand::new();
        let mut fx = Effects::new();
        cmd.start(session, &mut fx);
        (cmd, fx)
    }

    #[test]
    fn sends_xboard_and_arms_timer() {
        let mut session = Session::default();
        let (_, mut fx) = started(&mut session);
        assert_eq!(fx.take_sent(), [XBoardCommand::XBoard]);
        assert!(fx.take_timer().is_some());
    }

    #[test]
    fn first_line_is_name_and_timeout_completes() {
        let mut session = Session::default();
        let (mut cmd, mut fx) = started(&mut session);
        cmd.line_received(&mut session, "", &mut fx);
        cmd.line_received(&mut session, "Crafty v25", &mut fx);
        cmd.line_received(&mut session, "feature done=1", &mut fx);
        cmd.line_received(&mut session, "# loading book", &mut fx);
        assert!(!cmd.is_finished());

        cmd.timeout(&mut session, &mut fx);
        assert!(cmd.is_finished());
        assert!(session.is_initialized());
        assert_eq!(session.name(), Some("Crafty v25"));
        assert!(cmd.completion().take().unwrap().is_ok());
    }

    #[test]
    fn error_line_fails_handshake() {
        let mut session = Session::default();
        let (mut cmd, mut fx) = started(&mut session);
        cmd.line_received(&mut session, "MyEngine", &mut fx);
        cmd.line_received(&mut session, "Error (unknown command): xboard", &mut fx);
        assert!(cmd.is_finished());
        assert!(!session.is_initialized());
        assert!(matches!(
            cmd.completion().take(),
            Some(Err(EngineError::Protocol(_)))
        ));
    }

    #[test]
    fn second_initialize_is_rejected() {
        let mut session = Session::default();
        session.mark_initialized();
        let (mut cmd, fx) = started(&mut session);
        assert!(fx.is_empty());
        assert!(matches!(
            cmd.completion().take(),
            Some(Err(EngineError::AlreadyInitialized))
        ));
    }
}
