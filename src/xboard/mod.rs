//! XBoard/WinBoard wire vocabulary.
//!
//! [`command`] holds what we send, [`output`] interprets what engines print.
//!
//! # Protocol Overview
//!
//! Engines in this dialect read coordinate moves ("e2e4", "e1g1", "e7e8q")
//! and may answer in either coordinate notation or SAN. Clocks are given in
//! centiseconds, `level` takes minutes and seconds. A `ping N` is answered
//! with `pong N` once every earlier command has been processed.

pub mod command;
pub mod output;

pub use command::XBoardCommand;
pub use output::{
    classify_play_line, feature_args, is_error_line, parse_thinking, Info, InfoFlags, PlayLine,
    PongTokens, Score,
};
