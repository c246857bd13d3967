//! Playing test games against each candidate engine.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use log::{debug, error, info, warn};

use crate::board::GameBoard;
use crate::channel::{EngineCommand, LineChannel, ProcessExit};
use crate::engine::{popen_cecp, CecpEngine, ConfigMapping, ConfigValue, Dialect, Limit, SessionConfig};
use crate::harness::discovery::append_blacklist;
use crate::probe::probe;
use crate::session::{GameId, PlayOptions};

/// Transcript lines dumped to the log when a game fails.
const TRANSCRIPT_CONTEXT: usize = 20;

/// Which dialects the harness should exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolFilter {
    Uci,
    Xboard,
    Both,
}

impl ProtocolFilter {
    #[must_use]
    pub fn allows(self, dialect: Dialect) -> bool {
        match (self, dialect) {
            (ProtocolFilter::Both, _) => true,
            (ProtocolFilter::Uci, Dialect::Uci) => true,
            (ProtocolFilter::Xboard, Dialect::Cecp) => true,
            _ => false,
        }
    }
}

/// Harness settings.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Games per engine
    pub iterations: u32,
    pub max_plies: usize,
    pub move_time: Duration,
    /// Slack on top of `move_time` before a move is abandoned
    pub move_grace: Duration,
    pub filter: ProtocolFilter,
    /// Append engines that refuse to quit to `blacklist`
    pub gen_blacklist: bool,
    pub blacklist: PathBuf,
    pub session: SessionConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            iterations: 1,
            max_plies: 160,
            move_time: Duration::from_millis(100),
            move_grace: Duration::from_secs(2),
            filter: ProtocolFilter::Both,
            gen_blacklist: false,
            blacklist: PathBuf::from("blacklist"),
            session: SessionConfig::default(),
        }
    }
}

impl RunConfig {
    /// Upper bound on the time spent searching across `engines` engines.
    #[must_use]
    pub fn worst_case_runtime(&self, engines: usize) -> Duration {
        let moves = self.max_plies as u128 * u128::from(self.iterations) * engines as u128;
        let nanos = self.move_time.as_nanos().saturating_mul(moves);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// How a game ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEnd {
    /// Checkmate, stalemate or a draw by rule, with the result string
    GameOver(&'static str),
    PlyLimit,
    Resigned,
    Failed(String),
}

impl GameEnd {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, GameEnd::Failed(_))
    }
}

impl fmt::Display for GameEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEnd::GameOver(result) => write!(f, "game over ({result})"),
            GameEnd::PlyLimit => f.write_str("ply limit reached"),
            GameEnd::Resigned => f.write_str("resigned"),
            GameEnd::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameReport {
    pub plies: usize,
    pub end: GameEnd,
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Played(Vec<GameReport>),
    SkippedUci,
    SkippedUnknown,
    /// Dialect excluded by the protocol filter
    Filtered(Dialect),
    /// Could not be probed or started
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReport {
    pub path: PathBuf,
    pub name: Option<String>,
    pub outcome: EngineOutcome,
    pub exit: Option<ProcessExit>,
}

impl EngineReport {
    fn new(path: &Path, outcome: EngineOutcome) -> Self {
        EngineReport {
            path: path.to_path_buf(),
            name: None,
            outcome,
            exit: None,
        }
    }

    #[must_use]
    pub fn refused_to_die(&self) -> bool {
        self.exit == Some(ProcessExit::Killed)
    }
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    pub engines: usize,
    pub played: usize,
    pub skipped: usize,
    pub failed: usize,
    pub games: usize,
    pub failed_games: usize,
    pub refused_to_die: Vec<PathBuf>,
}

impl Summary {
    #[must_use]
    pub fn from_reports(reports: &[EngineReport]) -> Self {
        let mut summary = Summary {
            engines: reports.len(),
            ..Summary::default()
        };
        for report in reports {
            match &report.outcome {
                EngineOutcome::Played(games) => {
                    summary.played += 1;
                    summary.games += games.len();
                    summary.failed_games += games.iter().filter(|g| g.end.is_failure()).count();
                }
                EngineOutcome::SkippedUci | EngineOutcome::SkippedUnknown | EngineOutcome::Filtered(_) => {
                    summary.skipped += 1;
                }
                EngineOutcome::Failed(_) => summary.failed += 1,
            }
            if report.refused_to_die() {
                summary.refused_to_die.push(report.path.clone());
            }
        }
        summary
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Tested {} engines: {} played, {} skipped, {} failed to start",
            self.engines, self.played, self.skipped, self.failed
        )?;
        write!(f, "Games: {} played, {} failed", self.games, self.failed_games)?;
        for path in &self.refused_to_die {
            write!(f, "\nRefused to die: {}", path.display())?;
        }
        Ok(())
    }
}

/// Play one game of the engine against itself from the start position.
pub async fn play_game<C: LineChannel>(engine: &mut CecpEngine<C>, config: &RunConfig) -> GameReport {
    let mut board = GameBoard::new();
    let options = PlayOptions {
        game: Some(GameId::new()),
        ..PlayOptions::default()
    };

    let end = loop {
        if let Some(result) = board.result() {
            break GameEnd::GameOver(result);
        }
        if board.ply() >= config.max_plies {
            break GameEnd::PlyLimit;
        }

        let deadline = tokio::time::sleep(config.move_time + config.move_grace);
        let played = engine
            .play_until(&board, Limit::move_time(config.move_time), options.clone(), deadline)
            .await;
        match played {
            Ok(result) => {
                if result.draw_offered {
                    debug!("{}: offered a draw at ply {}", engine.session(), board.ply());
                }
                match result.mv {
                    Some(mv) => {
                        if let Err(err) = board.push(mv) {
                            break GameEnd::Failed(err.to_string());
                        }
                    }
                    None if result.resigned => break GameEnd::Resigned,
                    None => break GameEnd::Failed("no move returned".to_string()),
                }
            }
            Err(err) => break GameEnd::Failed(err.to_string()),
        }
    };

    if let GameEnd::Failed(reason) = &end {
        error!(
            "{}: game failed at ply {}: {}\n{}",
            engine.session(),
            board.ply(),
            reason,
            engine.transcript().tail(TRANSCRIPT_CONTEXT).join("\n")
        );
    } else {
        info!("{}: {} after {} plies", engine.session(), end, board.ply());
    }
    GameReport {
        plies: board.ply(),
        end,
    }
}

/// Configure an initialized engine and play `iterations` games.
pub async fn play_games<C: LineChannel>(engine: &mut CecpEngine<C>, config: &RunConfig) -> Vec<GameReport> {
    let mut threads = ConfigMapping::new();
    threads.insert("Threads".to_string(), Some(ConfigValue::Int(1)));
    if let Err(err) = engine.configure(threads).await {
        debug!("Engine {} has no Threads option: {}", engine.session(), err);
    }

    let mut games = Vec::new();
    for _ in 0..config.iterations {
        games.push(play_game(engine, config).await);
    }
    games
}

/// Probe, and for CECP engines play the configured games.
pub async fn test_engine(path: &Path, config: &RunConfig) -> EngineReport {
    println!("Testing executable: {}", path.display());
    let command = EngineCommand::new(path).process_group(true);

    let dialect = match probe(&command, config.session).await {
        Ok(dialect) => dialect,
        Err(err) => {
            error!("{command}: probe failed: {err}");
            return EngineReport::new(path, EngineOutcome::Failed(err.to_string()));
        }
    };

    if dialect == Dialect::Unknown {
        println!("Unknown protocol used by {} -- skipping", path.display());
        return EngineReport::new(path, EngineOutcome::SkippedUnknown);
    }
    if !config.filter.allows(dialect) {
        info!("{command}: {dialect} engine excluded by protocol filter");
        return EngineReport::new(path, EngineOutcome::Filtered(dialect));
    }
    if dialect == Dialect::Uci {
        println!("{} speaks UCI, which this driver does not play -- skipping", path.display());
        return EngineReport::new(path, EngineOutcome::SkippedUci);
    }

    let mut engine = match popen_cecp(&command, config.session).await {
        Ok(engine) => engine,
        Err(err) => {
            error!("{command}: failed to start: {err}");
            return EngineReport::new(path, EngineOutcome::Failed(err.to_string()));
        }
    };

    let games = play_games(&mut engine, config).await;
    let mut report = EngineReport::new(path, EngineOutcome::Played(games));
    report.name = engine.name().map(str::to_string);
    report.exit = match engine.quit().await {
        Ok(exit) => Some(exit),
        Err(err) => {
            warn!("{command}: failed to quit: {err}");
            None
        }
    };

    if report.refused_to_die() {
        warn!("{command}: refused to die");
        if config.gen_blacklist {
            if let Err(err) = append_blacklist(&config.blacklist, path) {
                warn!("{err}");
            }
        }
    }
    report
}

/// Test every engine in order, then print the summary.
pub async fn run_all<'a>(engines: impl IntoIterator<Item = &'a PathBuf>, config: &RunConfig) -> Summary {
    let mut reports = Vec::new();
    for path in engines {
        let report = test_engine(path, config).await;
        if let EngineOutcome::Played(games) = &report.outcome {
            for (n, game) in games.iter().enumerate() {
                println!("  game {}: {} after {} plies", n + 1, game.end, game.plies);
            }
        }
        reports.push(report);
    }
    let summary = Summary::from_reports(&reports);
    println!("{summary}");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    fn played(ends: Vec<GameEnd>) -> EngineOutcome {
        EngineOutcome::Played(ends.into_iter().map(|end| GameReport { plies: 10, end }).collect())
    }

    #[test]
    fn filter_matches_dialects() {
        assert!(ProtocolFilter::Both.allows(Dialect::Uci));
        assert!(ProtocolFilter::Both.allows(Dialect::Cecp));
        assert!(ProtocolFilter::Xboard.allows(Dialect::Cecp));
        assert!(!ProtocolFilter::Xboard.allows(Dialect::Uci));
        assert!(ProtocolFilter::Uci.allows(Dialect::Uci));
        assert!(!ProtocolFilter::Uci.allows(Dialect::Cecp));
    }

    #[test]
    fn runtime_estimate() {
        let config = RunConfig {
            iterations: 2,
            ..RunConfig::default()
        };
        // 0.1 s * 160 plies * 2 games * 3 engines
        assert_eq!(config.worst_case_runtime(3), Duration::from_secs(96));
        assert_eq!(config.worst_case_runtime(0), Duration::ZERO);
    }

    #[test]
    fn summary_counts() {
        let mut zombie = EngineReport::new(
            Path::new("/e/zombie"),
            played(vec![GameEnd::PlyLimit, GameEnd::Failed("terminated".into())]),
        );
        zombie.exit = Some(ProcessExit::Killed);
        let reports = vec![
            zombie,
            EngineReport::new(Path::new("/e/good"), played(vec![GameEnd::GameOver("1-0")])),
            EngineReport::new(Path::new("/e/uci"), EngineOutcome::SkippedUci),
            EngineReport::new(Path::new("/e/mute"), EngineOutcome::SkippedUnknown),
            EngineReport::new(Path::new("/e/gone"), EngineOutcome::Failed("boom".into())),
        ];

        let summary = Summary::from_reports(&reports);
        assert_eq!(summary.engines, 5);
        assert_eq!(summary.played, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.games, 3);
        assert_eq!(summary.failed_games, 1);
        assert_eq!(summary.refused_to_die, [PathBuf::from("/e/zombie")]);
        assert!(summary.to_string().contains("Refused to die: /e/zombie"));
    }
}
