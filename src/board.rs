//! Game board with full move history.
//!
//! A [`GameBoard`] keeps the root position, every move played from it, and the
//! position after each move, so plies can be retracted without an unmake
//! routine. It is the session's record of what the engine believes the
//! position to be.
//!
//! Engine notation: moves are written in coordinate notation (`e2e4`, `e1g1`,
//! `e7e8q`) and read in either coordinate notation or SAN (`Nf3`, `O-O`).

use std::fmt;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Outcome, Position};

use crate::error::NotationError;

/// Root position plus move stack.
#[derive(Clone)]
pub struct GameBoard {
    root_fen: String,
    /// `positions[i]` is the position after `stack[..i]`; never empty.
    positions: Vec<Chess>,
    stack: Vec<Move>,
}

impl Default for GameBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl GameBoard {
    /// Board at the standard starting position.
    #[must_use]
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    /// Board rooted at an arbitrary legal position.
    #[must_use]
    pub fn from_position(root: Chess) -> Self {
        GameBoard {
            root_fen: fen_of(&root),
            positions: vec![root],
            stack: Vec::new(),
        }
    }

    /// Board rooted at the position described by `fen`.
    pub fn from_fen(fen: &str) -> Result<Self, NotationError> {
        let invalid = |reason: String| NotationError::InvalidFen {
            fen: fen.to_string(),
            reason,
        };
        let parsed = Fen::from_ascii(fen.trim().as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let root: Chess = parsed
            .into_position(CastlingMode::Standard)
            .map_err(|e| invalid(e.to_string()))?;
        Ok(Self::from_position(root))
    }

    /// A copy of this board with the move stack cleared.
    #[must_use]
    pub fn root(&self) -> GameBoard {
        GameBoard {
            root_fen: self.root_fen.clone(),
            positions: vec![self.positions[0].clone()],
            stack: Vec::new(),
        }
    }

    /// FEN of the root position.
    #[must_use]
    pub fn root_fen(&self) -> &str {
        &self.root_fen
    }

    /// Whether both boards start from the same position.
    #[must_use]
    pub fn same_root(&self, other: &GameBoard) -> bool {
        self.root_fen == other.root_fen
    }

    /// Current position.
    #[must_use]
    pub fn position(&self) -> &Chess {
        // positions is never empty
        &self.positions[self.positions.len() - 1]
    }

    /// FEN of the current position.
    #[must_use]
    pub fn fen(&self) -> String {
        fen_of(self.position())
    }

    /// Moves played from the root, oldest first.
    #[must_use]
    pub fn move_stack(&self) -> &[Move] {
        &self.stack
    }

    /// Number of plies played from the root.
    #[must_use]
    pub fn ply(&self) -> usize {
        self.stack.len()
    }

    #[must_use]
    pub fn turn(&self) -> Color {
        self.position().turn()
    }

    /// Play a move, rejecting it if it is not legal in the current position.
    pub fn push(&mut self, mv: Move) -> Result<(), NotationError> {
        let current = self.position();
        if !current.is_legal(&mv) {
            return Err(NotationError::IllegalMove {
                notation: self.to_xboard(&mv),
                fen: self.fen(),
            });
        }
        let mut next = current.clone();
        next.play_unchecked(&mv);
        self.positions.push(next);
        self.stack.push(mv);
        Ok(())
    }

    /// Retract the last ply.
    pub fn pop(&mut self) -> Option<Move> {
        let mv = self.stack.pop()?;
        self.positions.pop();
        Some(mv)
    }

    /// Render a move in engine notation.
    #[must_use]
    pub fn to_xboard(&self, mv: &Move) -> String {
        mv.to_uci(CastlingMode::Standard).to_string()
    }

    /// Parse a move in coordinate notation or SAN relative to the current
    /// position.
    pub fn parse_xboard(&self, text: &str) -> Result<Move, NotationError> {
        let text = text.trim();
        let pos = self.position();

        if let Ok(uci) = UciMove::from_ascii(text.as_bytes()) {
            return uci.to_move(pos).map_err(|_| self.illegal(text));
        }

        let normalized = normalize_castling(text);
        match SanPlus::from_ascii(normalized.as_bytes()) {
            Ok(san) => san.san.to_move(pos).map_err(|_| self.illegal(text)),
            Err(_) => Err(NotationError::InvalidNotation {
                notation: text.to_string(),
            }),
        }
    }

    /// Parse a move and play it.
    pub fn push_xboard(&mut self, text: &str) -> Result<Move, NotationError> {
        let mv = self.parse_xboard(text)?;
        self.push(mv.clone())?;
        Ok(mv)
    }

    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.position().is_game_over()
    }

    /// Result string (`1-0`, `0-1`, `1/2-1/2`) once the game is over.
    #[must_use]
    pub fn result(&self) -> Option<&'static str> {
        self.position().outcome().map(|outcome| match outcome {
            Outcome::Decisive {
                winner: Color::White,
            } => "1-0",
            Outcome::Decisive {
                winner: Color::Black,
            } => "0-1",
            Outcome::Draw => "1/2-1/2",
        })
    }

    fn illegal(&self, text: &str) -> NotationError {
        NotationError::IllegalMove {
            notation: text.to_string(),
            fen: self.fen(),
        }
    }
}

impl PartialEq for GameBoard {
    fn eq(&self, other: &Self) -> bool {
        self.same_root(other) && self.stack == other.stack
    }
}

impl Eq for GameBoard {}

impl fmt::Debug for GameBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let moves: Vec<String> = self.stack.iter().map(|m| self.to_xboard(m)).collect();
        f.debug_struct("GameBoard")
            .field("root", &self.root_fen)
            .field("moves", &moves)
            .finish()
    }
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// Some engines castle with zeros.
fn normalize_castling(text: &str) -> String {
    match text.trim_end_matches(['+', '#']) {
        "0-0" => "O-O".to_string(),
        "0-0-0" => "O-O-O".to_string(),
        _ => text.to_string(),
    }
}
