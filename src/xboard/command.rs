//! Commands sent to an `XBoard` engine.
//!
//! Each variant renders to exactly one wire line through `Display`.

use std::fmt;
use std::time::Duration;

/// One line of driver-to-engine traffic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XBoardCommand {
    /// Switch the engine into xboard mode
    XBoard,
    /// Protocol version announcement
    Protover(u32),
    /// UCI handshake, only sent while probing
    Uci,
    /// Reset to the start position, engine plays black
    New,
    /// Enter force mode (accept moves without thinking)
    Force,
    /// Start thinking for the side to move
    Go,
    /// Toggle random mode
    Random,
    /// Tell the engine its opponent is a computer
    Computer,
    /// Retract one half-move
    Undo,
    /// Retract the last two half-moves (one for each side)
    Remove,
    /// A move in coordinate notation
    Move(String),
    /// Conventional or incremental clock: `level <mps> <min>:<ss> <inc>`
    Level {
        moves_per_session: u32,
        base_seconds: u64,
        increment: Duration,
    },
    /// Exact time per move
    St(Duration),
    /// Maximum search depth
    Sd(u32),
    /// Engine's own clock (centiseconds)
    Time(u64),
    /// Opponent's clock (centiseconds)
    OTime(u64),
    Post,
    NoPost,
    /// Ponder on our time
    Hard,
    Easy,
    /// Ask for `pong N` once all prior commands are processed
    Ping(u32),
    /// Move now (`?`)
    MoveNow,
    Quit,
    /// Anything else, kept verbatim
    Unknown(String),
}

impl fmt::Display for XBoardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            XBoardCommand::XBoard => f.write_str("xboard"),
            XBoardCommand::Protover(version) => write!(f, "protover {version}"),
            XBoardCommand::Uci => f.write_str("uci"),
            XBoardCommand::New => f.write_str("new"),
            XBoardCommand::Force => f.write_str("force"),
            XBoardCommand::Go => f.write_str("go"),
            XBoardCommand::Random => f.write_str("random"),
            XBoardCommand::Computer => f.write_str("computer"),
            XBoardCommand::Undo => f.write_str("undo"),
            XBoardCommand::Remove => f.write_str("remove"),
            XBoardCommand::Move(mv) => f.write_str(mv),
            XBoardCommand::Level {
                moves_per_session,
                base_seconds,
                increment,
            } => write!(
                f,
                "level {moves_per_session} {}:{:02} {}",
                base_seconds / 60,
                base_seconds % 60,
                increment.as_secs_f64()
            ),
            XBoardCommand::St(time) => write!(f, "st {}", time.as_secs_f64()),
            XBoardCommand::Sd(depth) => write!(f, "sd {depth}"),
            XBoardCommand::Time(cs) => write!(f, "time {cs}"),
            XBoardCommand::OTime(cs) => write!(f, "otim {cs}"),
            XBoardCommand::Post => f.write_str("post"),
            XBoardCommand::NoPost => f.write_str("nopost"),
            XBoardCommand::Hard => f.write_str("hard"),
            XBoardCommand::Easy => f.write_str("easy"),
            XBoardCommand::Ping(n) => write!(f, "ping {n}"),
            XBoardCommand::MoveNow => f.write_str("?"),
            XBoardCommand::Quit => f.write_str("quit"),
            XBoardCommand::Unknown(line) => f.write_str(line),
        }
    }
}
