//! Lines received from an `XBoard` engine.
//!
//! During play every line is run through an ordered list of matchers and the
//! first one that accepts it decides what the line means. Thinking output has
//! the shape:
//!
//! `<ply> <score> <time> <nodes> [<seldepth> [<nps> [.. <tbhits>]]] <pv>`
//!
//! Where:
//! - ply: search depth
//! - score: centipawns, or a mate score offset by 100000
//! - time: centiseconds
//! - pv: moves in SAN or coordinate notation, possibly with move numbers

use std::ops::BitOr;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use shakmaty::Move;

use crate::board::GameBoard;

static ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(Error|Illegal move)(\s*\([^()]+\))?\s*:").expect("valid error pattern")
});

const MATE_SCORE: i64 = 100_000;

/// Whether the engine is reporting an error (`Error (..): ..`, `Illegal move: ..`).
#[must_use]
pub fn is_error_line(line: &str) -> bool {
    ERROR_PATTERN.is_match(line)
}

/// Arguments of a `feature ...` announcement.
#[must_use]
pub fn feature_args(line: &str) -> Option<&str> {
    line.strip_prefix("feature ")
}

/// Echo lines a play command is waiting for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PongTokens {
    /// Confirms the engine has processed everything up to its move.
    pub after_move: Option<String>,
    /// Confirms the engine has stopped pondering.
    pub after_ponder: Option<String>,
}

/// Meaning of one engine line while a play command is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayLine {
    Move(String),
    Hint(String),
    PongAfterMove,
    PongAfterPonder,
    OfferDraw,
    Resign,
    Result(String),
    Comment,
    Error(String),
    Thinking(String),
    Unexpected(String),
}

type Matcher = fn(&str, &PongTokens) -> Option<PlayLine>;

const PLAY_MATCHERS: [Matcher; 10] = [
    |line, _| line.strip_prefix("move ").map(|arg| PlayLine::Move(arg.to_string())),
    |line, _| line.strip_prefix("Hint: ").map(|arg| PlayLine::Hint(arg.to_string())),
    |line, pongs| (pongs.after_move.as_deref() == Some(line)).then_some(PlayLine::PongAfterMove),
    |line, pongs| {
        (pongs.after_ponder.as_deref() == Some(line)).then_some(PlayLine::PongAfterPonder)
    },
    |line, _| (line == "offer draw").then_some(PlayLine::OfferDraw),
    |line, _| (line == "resign").then_some(PlayLine::Resign),
    |line, _| {
        ["1-0", "0-1", "1/2-1/2"]
            .iter()
            .any(|prefix| line.starts_with(prefix))
            .then(|| PlayLine::Result(line.to_string()))
    },
    |line, _| line.starts_with('#').then_some(PlayLine::Comment),
    |line, _| is_error_line(line).then(|| PlayLine::Error(line.to_string())),
    |line, _| is_thinking_line(line).then(|| PlayLine::Thinking(line.to_string())),
];

/// Classify a line received while a play command is active.
#[must_use]
pub fn classify_play_line(line: &str, pongs: &PongTokens) -> PlayLine {
    PLAY_MATCHERS
        .iter()
        .find_map(|matcher| matcher(line, pongs))
        .unwrap_or_else(|| PlayLine::Unexpected(line.to_string()))
}

fn is_thinking_line(line: &str) -> bool {
    line.split_whitespace().count() >= 4
        && line.trim_start().starts_with(|c: char| c.is_ascii_digit())
}

// ============================================================================
// Thinking output
// ============================================================================

/// Selects which parts of thinking output are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct InfoFlags(u8);

impl InfoFlags {
    pub const NONE: InfoFlags = InfoFlags(0);
    /// Depth, seldepth, time, nodes, nps and tbhits.
    pub const BASIC: InfoFlags = InfoFlags(1);
    pub const SCORE: InfoFlags = InfoFlags(2);
    pub const PV: InfoFlags = InfoFlags(4);
    pub const ALL: InfoFlags = InfoFlags(7);

    #[must_use]
    pub fn contains(self, other: InfoFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for InfoFlags {
    type Output = InfoFlags;

    fn bitor(self, rhs: InfoFlags) -> InfoFlags {
        InfoFlags(self.0 | rhs.0)
    }
}

/// Evaluation from the engine's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Score {
    /// Centipawns
    Cp(i64),
    /// Mate in N plies; negative when the engine is getting mated
    Mate(i64),
    /// The engine has already delivered mate
    MateGiven,
}

impl Score {
    fn from_xboard(raw: i64) -> Score {
        if raw <= -MATE_SCORE {
            Score::Mate(raw + MATE_SCORE)
        } else if raw == MATE_SCORE {
            Score::MateGiven
        } else if raw > MATE_SCORE {
            Score::Mate(raw - MATE_SCORE)
        } else {
            Score::Cp(raw)
        }
    }
}

/// Parsed thinking output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Info {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub score: Option<Score>,
    pub time: Option<Duration>,
    pub nodes: Option<u64>,
    pub nps: Option<u64>,
    pub tbhits: Option<u64>,
    pub pv: Vec<Move>,
}

/// Parse one line of thinking output relative to `board`'s current position.
///
/// Lines with fewer than four leading integers yield an empty [`Info`].
#[must_use]
pub fn parse_thinking(line: &str, board: &GameBoard, selector: InfoFlags) -> Info {
    let mut info = Info::default();
    let mut tokens = line.split_whitespace().peekable();

    let mut integers = Vec::new();
    while let Some(value) = tokens.peek().and_then(|t| t.parse::<i64>().ok()) {
        integers.push(value);
        tokens.next();
    }
    if integers.len() < 4 {
        return info;
    }

    let (depth, raw_score, centis, nodes) = (integers[0], integers[1], integers[2], integers[3]);
    let extra = &integers[4..];

    if selector.contains(InfoFlags::BASIC) {
        info.depth = u32::try_from(depth).ok();
        info.time = u64::try_from(centis)
            .ok()
            .and_then(|cs| cs.checked_mul(10))
            .map(Duration::from_millis);
        info.nodes = u64::try_from(nodes).ok();
        info.seldepth = extra.first().and_then(|&v| u32::try_from(v).ok());
        info.nps = extra.get(1).and_then(|&v| u64::try_from(v).ok());
        if extra.len() > 2 {
            info.tbhits = extra.last().and_then(|&v| u64::try_from(v).ok());
        }
    }

    if selector.contains(InfoFlags::SCORE) {
        info.score = Some(Score::from_xboard(raw_score));
    }

    if selector.contains(InfoFlags::PV) {
        let mut line_board = board.clone();
        for token in tokens {
            if is_move_number(token) {
                continue;
            }
            match line_board.push_xboard(token) {
                Ok(mv) => info.pv.push(mv),
                Err(_) => break,
            }
        }
    }

    info
}

/// `12.` or `12...`
fn is_move_number(token: &str) -> bool {
    let digits = token.trim_end_matches('.');
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
