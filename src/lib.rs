//! Driver for chess engines speaking the first-generation xboard protocol
//! (CECP v1), plus a prober that tells xboard engines from UCI ones.

pub mod board;
pub mod channel;
pub mod engine;
pub mod error;
pub mod harness;
pub mod probe;
pub mod session;
pub mod timer;
pub mod xboard;

pub use board::GameBoard;
pub use channel::{EngineCommand, LineChannel, ProcessChannel, ProcessExit};
pub use engine::{popen_cecp, CecpEngine, ConfigMapping, ConfigValue, Dialect, Limit, SessionConfig};
pub use error::{EngineError, NotationError};
pub use probe::probe;
pub use session::{GameId, PlayOptions, PlayResult};
pub use xboard::{Info, InfoFlags, Score};
