mod common;

use std::time::Duration;

use cecp_driver::harness::{play_game, play_games, GameEnd, RunConfig};
use cecp_driver::{
    ConfigMapping, ConfigValue, EngineError, GameBoard, GameId, InfoFlags, Limit, PlayOptions,
    ProcessExit,
};
use cecp_driver::xboard::XBoardCommand;
use common::{count, initialized, parse_xboard_command, Script};
use shakmaty::Position;
use tokio::time::Instant;

fn quick(max_plies: usize, iterations: u32) -> RunConfig {
    RunConfig {
        iterations,
        max_plies,
        ..RunConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn initialize_reads_name_and_waits_out_the_handshake() {
    let started = Instant::now();
    let (engine, received) = initialized(Script::SelfPlay).await;
    assert_eq!(engine.name(), Some("MockEngine 1.0"));
    assert!(engine.session().is_initialized());
    assert!(started.elapsed() >= Duration::from_secs(3));
    assert_eq!(*received.lock(), ["xboard"]);
}

#[tokio::test(start_paused = true)]
async fn second_initialize_is_rejected() {
    let (mut engine, _) = initialized(Script::SelfPlay).await;
    assert!(matches!(engine.initialize().await, Err(EngineError::AlreadyInitialized)));
}

#[tokio::test(start_paused = true)]
async fn play_from_start_position() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;
    let board = GameBoard::new();
    let result = engine
        .play(&board, Limit::move_time(Duration::from_millis(100)), PlayOptions::default())
        .await
        .unwrap();

    let mv = result.mv.expect("a move");
    assert!(board.position().is_legal(&mv));
    assert!(!result.resigned);
    assert!(!engine.has_lingering_command());

    let sent = received.lock().clone();
    assert_eq!(&sent[1..7], ["new", "force", "st 0.1", "nopost", "easy", "go"]);
    assert!(sent[7].starts_with("ping "));
}

#[tokio::test(start_paused = true)]
async fn thinking_output_is_reported_when_requested() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;
    let options = PlayOptions {
        info: InfoFlags::ALL,
        ..PlayOptions::default()
    };
    let result = engine
        .play(&GameBoard::new(), Limit::depth(3), options)
        .await
        .unwrap();

    let info = result.info.expect("thinking line");
    assert_eq!(info.depth, Some(3));
    assert_eq!(info.nodes, Some(1000));
    assert_eq!(info.pv.first(), result.mv.as_ref());
    assert_eq!(count(&received, "post"), 1);
    assert_eq!(count(&received, "sd 3"), 1);
}

#[tokio::test(start_paused = true)]
async fn self_play_game_sends_new_once() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;
    let report = play_game(&mut engine, &quick(12, 1)).await;

    assert!(!report.end.is_failure(), "{}", report.end);
    assert!(report.plies <= 12);
    assert_eq!(count(&received, "new"), 1);
    assert_eq!(count(&received, "go"), report.plies);
    assert_eq!(engine.session().board().ply(), report.plies);
}

#[tokio::test(start_paused = true)]
async fn every_game_starts_fresh() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;
    let games = play_games(&mut engine, &quick(6, 3)).await;

    assert_eq!(games.len(), 3);
    assert!(games.iter().all(|g| !g.end.is_failure() && g.plies <= 6));
    assert_eq!(count(&received, "new"), 3);
}

#[tokio::test(start_paused = true)]
async fn resigning_engine_ends_the_game() {
    let (mut engine, _) = initialized(Script::Resign).await;
    let report = play_game(&mut engine, &quick(10, 1)).await;
    assert_eq!(report.end, GameEnd::Resigned);
    assert_eq!(report.plies, 0);
}

#[tokio::test(start_paused = true)]
async fn illegal_move_fails_and_forces_new_game() {
    let (mut engine, received) = initialized(Script::IllegalMove).await;
    let game = Some(GameId::new());
    let board = GameBoard::new();
    let options = PlayOptions {
        game,
        ..PlayOptions::default()
    };

    let err = engine
        .play(&board, Limit::move_time(Duration::from_millis(100)), options.clone())
        .await
        .unwrap_err();
    assert!(err.is_protocol());

    // same game id, but the mirror was invalidated
    let _ = engine
        .play(&board, Limit::move_time(Duration::from_millis(100)), options)
        .await;
    assert_eq!(count(&received, "new"), 2);
}

#[tokio::test(start_paused = true)]
async fn crash_is_reported_as_terminated() {
    let (mut engine, _) = initialized(Script::Crash).await;
    let err = engine
        .play(&GameBoard::new(), Limit::move_time(Duration::from_millis(100)), PlayOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Terminated));

    let report = play_game(&mut engine, &quick(10, 1)).await;
    assert!(report.end.is_failure());
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_and_quit_settles() {
    let (mut engine, received) = initialized(Script::Silent).await;
    let err = engine
        .play_until(
            &GameBoard::new(),
            Limit::move_time(Duration::from_millis(100)),
            PlayOptions::default(),
            tokio::time::sleep(Duration::from_secs(1)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(engine.has_lingering_command());
    assert_eq!(count(&received, "?"), 1);

    let exit = engine.quit().await.unwrap();
    assert_eq!(exit, ProcessExit::Exited(Some(0)));
    assert!(!engine.has_lingering_command());

    let sent = received.lock().clone();
    let pings: Vec<&String> = sent.iter().filter(|l| l.starts_with("ping ")).collect();
    assert_eq!(pings.len(), 1);
    assert_eq!(sent.last().map(String::as_str), Some("quit"));
}

#[tokio::test(start_paused = true)]
async fn engine_that_ignores_quit_is_killed() {
    let (mut engine, _) = initialized(Script::Stubborn).await;
    assert_eq!(engine.quit().await.unwrap(), ProcessExit::Killed);
}

#[tokio::test(start_paused = true)]
async fn configure_rejects_managed_options() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;

    let mut managed = ConfigMapping::new();
    managed.insert("MultiPV".to_string(), Some(ConfigValue::Int(2)));
    assert!(matches!(engine.configure(managed).await, Err(EngineError::Config(_))));

    let mut threads = ConfigMapping::new();
    threads.insert("Threads".to_string(), Some(ConfigValue::Int(1)));
    engine.configure(threads).await.unwrap();
    assert!(engine.session().target_config().contains_key("Threads"));
    assert_eq!(received.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn continuing_a_game_replays_only_the_new_move() {
    let (mut engine, received) = initialized(Script::SelfPlay).await;
    let game = Some(GameId::new());
    let options = PlayOptions {
        game,
        ..PlayOptions::default()
    };
    let limit = Limit::move_time(Duration::from_millis(100));

    let mut board = GameBoard::new();
    board.push_xboard("e2e4").unwrap();
    let reply = engine.play(&board, limit, options.clone()).await.unwrap();
    board.push(reply.mv.unwrap()).unwrap();
    board.push_xboard("g1f3").unwrap();
    received.lock().clear();

    engine.play(&board, limit, options).await.unwrap();
    let sent = received.lock().clone();
    assert_eq!(&sent[..2], ["force", "g1f3"]);
}

#[test]
fn mock_engine_reads_rendered_commands() {
    let commands = [
        XBoardCommand::New,
        XBoardCommand::Force,
        XBoardCommand::Remove,
        XBoardCommand::Sd(7),
        XBoardCommand::Time(1234),
        XBoardCommand::Ping(9),
        XBoardCommand::Move("e7e8q".to_string()),
        XBoardCommand::Level {
            moves_per_session: 40,
            base_seconds: 300,
            increment: Duration::from_secs(2),
        },
    ];
    for cmd in commands {
        assert_eq!(parse_xboard_command(&cmd.to_string()), Some(cmd));
    }
    assert_eq!(parse_xboard_command("   "), None);
    assert_eq!(
        parse_xboard_command("bogus 1 2"),
        Some(XBoardCommand::Unknown("bogus 1 2".to_string()))
    );
}
