//! Engine controller: owns one channel and one session and pumps events.
//!
//! Every public operation runs one [`Command`] to resolution. The controller
//! waits on the next inbound line, the command timer and (for
//! [`play_until`](CecpEngine::play_until)) the caller's stop future, hands the
//! event to the command and flushes the lines and timer requests it produced.
//! A play command left open by pondering or cancellation is drained by the
//! next operation before that operation starts.

use std::future::{pending, Future};
use std::io;
use std::pin::{pin, Pin};
use std::sync::Arc;

use log::{debug, warn};

use crate::board::GameBoard;
use crate::channel::{Direction, EngineCommand, LineChannel, ProcessChannel, ProcessExit, Transcript};
use crate::engine::options::ConfigMapping;
use crate::engine::protocol::SessionConfig;
use crate::engine::time::Limit;
use crate::error::EngineError;
use crate::session::{
    Command, ConfigureCommand, Effects, InitializeCommand, PlayCommand, PlayOptions, PlayResult,
    Session, TimerEffect,
};
use crate::timer::CommandTimer;
use crate::xboard::XBoardCommand;

/// What woke the controller up
enum Event {
    Received(io::Result<Option<String>>),
    Timeout,
    Stop,
}

/// Driver for one CECP engine.
pub struct CecpEngine<C: LineChannel> {
    channel: C,
    session: Session,
    timer: CommandTimer,
    /// Play command still listening after it resolved
    lingering: Option<PlayCommand>,
    transcript: Arc<Transcript>,
    /// End of stream seen
    closed: bool,
}

impl<C: LineChannel> CecpEngine<C> {
    #[must_use]
    pub fn new(channel: C, config: SessionConfig) -> Self {
        Self::with_session(channel, Session::new(config))
    }

    #[must_use]
    pub fn with_session(channel: C, session: Session) -> Self {
        CecpEngine {
            channel,
            session,
            timer: CommandTimer::new(),
            lingering: None,
            transcript: Arc::new(Transcript::default()),
            closed: false,
        }
    }

    /// Name the engine announced during initialization.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.session.name()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Recent wire traffic, shared with the caller.
    #[must_use]
    pub fn transcript(&self) -> Arc<Transcript> {
        Arc::clone(&self.transcript)
    }

    /// Whether a resolved play command is still waiting on the engine.
    #[must_use]
    pub fn has_lingering_command(&self) -> bool {
        self.lingering.is_some()
    }

    pub async fn initialize(&mut self) -> Result<(), EngineError> {
        self.run(&mut InitializeCommand::new(), pending()).await
    }

    pub async fn configure(&mut self, options: ConfigMapping) -> Result<(), EngineError> {
        self.run(&mut ConfigureCommand::new(options), pending()).await
    }

    /// Search `board` and return the engine's move.
    pub async fn play(
        &mut self,
        board: &GameBoard,
        limit: Limit,
        options: PlayOptions,
    ) -> Result<PlayResult, EngineError> {
        self.play_until(board, limit, options, pending()).await
    }

    /// Like [`play`](Self::play), giving up with [`EngineError::Cancelled`]
    /// once `stop` resolves. The engine is told to move now and the search is
    /// settled before the next operation.
    pub async fn play_until<F>(
        &mut self,
        board: &GameBoard,
        limit: Limit,
        options: PlayOptions,
        stop: F,
    ) -> Result<PlayResult, EngineError>
    where
        F: Future<Output = ()>,
    {
        let mut cmd = PlayCommand::new(board.clone(), limit, options);
        let outcome = self.run(&mut cmd, stop).await;
        if !cmd.is_finished() {
            self.lingering = Some(cmd);
        }
        outcome
    }

    /// Settle any open search, send `quit` and wait for the process to exit.
    pub async fn quit(&mut self) -> Result<ProcessExit, EngineError> {
        self.settle_lingering().await;
        self.timer.cancel();
        self.send(&XBoardCommand::Quit).await;
        let grace = self.session.config().quit_grace;
        Ok(self.channel.wait_exit(grace).await?)
    }

    /// Kill the engine without the `quit` handshake.
    pub async fn terminate(&mut self) -> Result<(), EngineError> {
        self.lingering = None;
        Ok(self.channel.terminate().await?)
    }

    /// Run `cmd` until its completion resolves.
    pub(crate) async fn run<Cmd, F>(&mut self, cmd: &mut Cmd, stop: F) -> Result<Cmd::Output, EngineError>
    where
        Cmd: Command,
        F: Future<Output = ()>,
    {
        self.settle_lingering().await;
        self.timer.cancel();

        let mut stop = pin!(stop);
        let mut stopped = false;
        let mut fx = Effects::new();
        cmd.start(&mut self.session, &mut fx);
        self.flush(&mut fx).await;

        loop {
            if let Some(outcome) = cmd.completion().take() {
                return outcome;
            }
            if cmd.is_finished() {
                // finished without ever resolving
                return Err(EngineError::Cancelled);
            }

            match self.next_event(stop.as_mut(), stopped).await {
                Event::Stop => {
                    stopped = true;
                    cmd.completion().cancel();
                    cmd.cancel(&mut self.session, &mut fx);
                }
                event => self.dispatch(cmd, event, &mut fx),
            }
            self.flush(&mut fx).await;
        }
    }

    async fn settle_lingering(&mut self) {
        let Some(mut cmd) = self.lingering.take() else {
            return;
        };
        let mut fx = Effects::new();
        cmd.cancel(&mut self.session, &mut fx);
        self.flush(&mut fx).await;

        let mut never = pin!(pending::<()>());
        while !cmd.is_finished() {
            let event = self.next_event(never.as_mut(), true).await;
            self.dispatch(&mut cmd, event, &mut fx);
            self.flush(&mut fx).await;
        }
        debug!("{}: previous search settled", self.session);
    }

    async fn next_event<F>(&mut self, stop: Pin<&mut F>, stopped: bool) -> Event
    where
        F: Future<Output = ()>,
    {
        if self.closed {
            return Event::Received(Ok(None));
        }
        tokio::select! {
            biased;
            received = self.channel.recv_line() => Event::Received(received),
            () = self.timer.expired() => Event::Timeout,
            () = stop, if !stopped => Event::Stop,
        }
    }

    fn dispatch<Cmd: Command>(&mut self, cmd: &mut Cmd, event: Event, fx: &mut Effects) {
        match event {
            Event::Received(Ok(Some(line))) => {
                debug!("{}: << {}", self.session, line);
                self.transcript.record(Direction::Received, &line);
                cmd.line_received(&mut self.session, &line, fx);
            }
            Event::Received(result) => {
                if let Err(err) = result {
                    warn!("{}: failed to read from engine: {}", self.session, err);
                }
                if !self.closed {
                    debug!("{}: engine closed its output", self.session);
                    self.closed = true;
                }
                cmd.engine_terminated(&mut self.session, fx);
            }
            Event::Timeout => cmd.timeout(&mut self.session, fx),
            // the settle loop never arms a stop future
            Event::Stop => {}
        }
    }

    async fn flush(&mut self, fx: &mut Effects) {
        for command in fx.take_sent() {
            self.send(&command).await;
        }
        match fx.take_timer() {
            Some(TimerEffect::Arm(after)) => self.timer.arm(after),
            Some(TimerEffect::Cancel) => self.timer.cancel(),
            None => {}
        }
    }

    async fn send(&mut self, command: &XBoardCommand) {
        let line = command.to_string();
        debug!("{}: >> {}", self.session, line);
        self.transcript.record(Direction::Sent, &line);
        if let Err(err) = self.channel.send_line(&line).await {
            warn!("{}: failed to send {:?}: {}", self.session, line, err);
        }
    }
}

impl CecpEngine<ProcessChannel> {
    /// Spawn an engine process and run the handshake.
    pub async fn spawn(command: &EngineCommand, config: SessionConfig) -> Result<Self, EngineError> {
        let channel = ProcessChannel::spawn(command)?;
        let mut engine = CecpEngine::new(channel, config);
        if let Err(err) = engine.initialize().await {
            if let Err(kill_err) = engine.terminate().await {
                warn!("{command}: failed to kill engine after failed handshake: {kill_err}");
            }
            return Err(err);
        }
        Ok(engine)
    }
}

/// Spawn and initialize a CECP engine.
pub async fn popen_cecp(
    command: &EngineCommand,
    config: SessionConfig,
) -> Result<CecpEngine<ProcessChannel>, EngineError> {
    CecpEngine::spawn(command, config).await
}
