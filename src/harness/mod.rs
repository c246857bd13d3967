//! Batch harness behind the `checkmate` binary.
//!
//! Finds executables, works out which dialect each one speaks and plays a
//! few short self-play games against every CECP engine, reporting engines
//! that crash, emit garbage or refuse to quit.

pub mod discovery;
pub mod runner;

pub use discovery::{
    append_blacklist, find_engines, read_blacklist, read_engine_list, Discovered, DiscoveryError,
    ExcludeList,
};
pub use runner::{
    play_game, play_games, run_all, test_engine, EngineOutcome, EngineReport, GameEnd, GameReport,
    ProtocolFilter, RunConfig, Summary,
};
