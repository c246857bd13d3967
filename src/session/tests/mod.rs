//! Session tests.
//!
//! Commands are driven directly, without a channel:
//! - `resync.rs` - board/game synchronization traffic
//! - `play.rs` - the play command lifecycle
//! - `proptest.rs` - property-based tests for resync


use crate::board::GameBoard;
use crate::session::Effects;

fn board_from(moves: &[&str]) -> GameBoard {
    let mut board = GameBoard::new();
    for mv in moves {
        board.push_xboard(mv).expect("legal test move");
    }
    board
}

fn lines(fx: &mut Effects) -> Vec<String> {
    fx.take_sent().iter().map(ToString::to_string).collect()
}
