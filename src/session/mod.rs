//! Engine session state and the commands that operate on it.
//!
//! A [`Session`] is this side's model of one engine process: its name, the
//! options applied so far, and the board the engine is believed to hold. It is
//! only ever mutated by the single active [`Command`].
//!
//! # Resynchronization
//!
//! Before each search the engine's board is brought in line with the caller's
//! board using as little traffic as possible: a fresh `new` when the game,
//! root or options demand it, otherwise `remove`/`undo` back to the common
//! prefix and replay the rest.

mod command;
mod configure;
mod initialize;
mod play;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use shakmaty::Move;

use crate::board::GameBoard;
use crate::engine::options::{is_set, reject_managed, ConfigMapping};
use crate::engine::{ExtensionHooks, NoExtensions, SessionConfig};
use crate::error::EngineError;
use crate::xboard::XBoardCommand;

pub use command::{Command, Completion, Effects, TimerEffect};
pub use configure::ConfigureCommand;
pub use initialize::InitializeCommand;
pub use play::{PlayCommand, PlayOptions, PlayResult};

#[cfg(test)]
mod tests;

/// Identity of a game, compared for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameId(u64);

impl GameId {
    /// A game id distinct from every other id created by this process.
    #[must_use]
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        GameId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by all commands on one engine.
pub struct Session {
    name: Option<String>,
    applied_config: ConfigMapping,
    target_config: ConfigMapping,
    board: GameBoard,
    game: Option<GameId>,
    first_game: bool,
    initialized: bool,
    hooks: Box<dyn ExtensionHooks>,
    config: SessionConfig,
}

impl Session {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self::with_hooks(config, Box::new(NoExtensions))
    }

    #[must_use]
    pub fn with_hooks(config: SessionConfig, hooks: Box<dyn ExtensionHooks>) -> Self {
        Session {
            name: None,
            applied_config: ConfigMapping::new(),
            target_config: ConfigMapping::new(),
            board: GameBoard::new(),
            game: None,
            first_game: true,
            initialized: false,
            hooks,
            config,
        }
    }

    /// Display name announced by the engine, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the next resync will start a new game regardless of the board.
    #[must_use]
    pub fn is_first_game(&self) -> bool {
        self.first_game
    }

    /// The board the engine is believed to hold.
    #[must_use]
    pub fn board(&self) -> &GameBoard {
        &self.board
    }

    #[must_use]
    pub fn applied_config(&self) -> &ConfigMapping {
        &self.applied_config
    }

    /// Options re-applied before every game.
    #[must_use]
    pub fn target_config(&self) -> &ConfigMapping {
        &self.target_config
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The mirror can no longer be trusted; the next resync sends `new`.
    pub fn invalidate_board(&mut self) {
        self.first_game = true;
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn board_mut(&mut self) -> &mut GameBoard {
        &mut self.board
    }

    pub(crate) fn hooks(&mut self) -> &mut dyn ExtensionHooks {
        self.hooks.as_mut()
    }

    /// Validate and apply `options` on top of the persisted target options.
    ///
    /// Nothing is applied if any name is managed by the session.
    pub fn apply_options(&mut self, options: &ConfigMapping) -> Result<(), EngineError> {
        reject_managed(options.keys().chain(self.target_config.keys()))?;

        let mut merged = self.target_config.clone();
        merged.extend(options.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (name, value) in merged {
            self.hooks.set_option(&name, value.as_ref());
            self.applied_config.insert(name, value);
        }
        Ok(())
    }

    /// Apply `options` and remember the ones with values for later games.
    pub fn configure(&mut self, options: &ConfigMapping) -> Result<(), EngineError> {
        self.apply_options(options)?;
        self.target_config.extend(
            options
                .iter()
                .filter(|(_, value)| value.is_some())
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        Ok(())
    }

    /// Bring the engine's board in line with `target`, recording the lines
    /// to send in `fx`. Afterwards the mirror equals `target`.
    pub fn resync(
        &mut self,
        target: &GameBoard,
        game: Option<GameId>,
        options: &ConfigMapping,
        fx: &mut Effects,
    ) -> Result<(), EngineError> {
        self.apply_options(options)?;

        let new_game = is_new_game(
            self.first_game,
            self.game != game,
            options.contains_key("random") || options.contains_key("computer"),
            !target.same_root(&self.board),
        );
        self.game = game;
        self.first_game = false;

        let common = if new_game {
            self.board = target.root();
            fx.send(XBoardCommand::New);
            if is_set(&self.applied_config, "random") {
                fx.send(XBoardCommand::Random);
            }
            if is_set(&self.applied_config, "computer") {
                fx.send(XBoardCommand::Computer);
            }
            0
        } else {
            common_prefix_len(self.board.move_stack(), target.move_stack())
        };
        fx.send(XBoardCommand::Force);

        while self.board.ply() > common + 1 {
            fx.send(XBoardCommand::Remove);
            self.board.pop();
            self.board.pop();
        }
        while self.board.ply() > common {
            fx.send(XBoardCommand::Undo);
            self.board.pop();
        }

        for mv in &target.move_stack()[common..] {
            fx.send(XBoardCommand::Move(self.board.to_xboard(mv)));
            self.board.push(mv.clone())?;
        }

        debug!(
            "{self}: resynced to {} ({} plies, new game: {new_game})",
            self.board.fen(),
            self.board.ply()
        );
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("<engine>"))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.name)
            .field("board", &self.board)
            .field("first_game", &self.first_game)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

/// Whether resync must start a new game.
#[must_use]
pub fn is_new_game(first_game: bool, game_changed: bool, new_options: bool, root_changed: bool) -> bool {
    first_game || game_changed || new_options || root_changed
}

/// Length of the longest shared prefix of two move stacks.
#[must_use]
pub fn common_prefix_len(a: &[Move], b: &[Move]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
