//! Error types for engine sessions and move notation.

use std::io;

use thiserror::Error;

/// Error resolving an engine command.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine printed a line matching the error pattern, or a move on the
    /// primary path could not be parsed.
    #[error("engine protocol error: {0}")]
    Protocol(String),
    /// The caller asked for something the dialect cannot express. Raised
    /// before anything is written to the engine.
    #[error("configuration error: {0}")]
    Config(String),
    /// `initialize` was called twice on the same session.
    #[error("engine already initialized")]
    AlreadyInitialized,
    /// The engine closed its output while a command was pending.
    #[error("engine process terminated")]
    Terminated,
    /// The caller stopped waiting for the command.
    #[error("command cancelled")]
    Cancelled,
    /// Spawning or reaping the engine process failed.
    #[error("engine i/o failed: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Whether this error invalidates the mirrored board.
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, EngineError::Protocol(_))
    }
}

/// Error parsing or applying a move or position in engine notation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    /// Text is neither coordinate notation nor SAN.
    #[error("invalid move notation '{notation}'")]
    InvalidNotation { notation: String },
    /// Well-formed move text that is not legal in the position.
    #[error("illegal move '{notation}' in {fen}")]
    IllegalMove { notation: String, fen: String },
    /// FEN could not be parsed or describes an impossible position.
    #[error("invalid FEN '{fen}': {reason}")]
    InvalidFen { fen: String, reason: String },
}

impl From<NotationError> for EngineError {
    fn from(err: NotationError) -> Self {
        EngineError::Protocol(err.to_string())
    }
}
