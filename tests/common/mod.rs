//! In-memory xboard engine for driving the controller without processes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::pending;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cecp_driver::xboard::XBoardCommand;
use cecp_driver::{CecpEngine, GameBoard, LineChannel, ProcessExit, SessionConfig};
use parking_lot::Mutex;
use shakmaty::Position;

/// How the mock engine misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Plays the first legal move whenever it is on move
    SelfPlay,
    /// Only moves when told to move now
    Silent,
    /// Resigns instead of moving
    Resign,
    /// Answers with a move that is not legal
    IllegalMove,
    /// Closes its output when told to go
    Crash,
    /// Plays normally but ignores `quit`
    Stubborn,
}

pub struct MockEngine {
    script: Script,
    board: GameBoard,
    forced: bool,
    post: bool,
    searching: bool,
    quit: bool,
    closed: bool,
    outbox: VecDeque<String>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockEngine {
    pub fn new(script: Script) -> Self {
        let mut outbox = VecDeque::new();
        outbox.push_back("MockEngine 1.0".to_string());
        MockEngine {
            script,
            board: GameBoard::new(),
            forced: false,
            post: false,
            searching: false,
            quit: false,
            closed: false,
            outbox,
            received: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every line the driver sent, shared so it survives moving the mock.
    pub fn received(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.received)
    }

    fn say(&mut self, line: impl Into<String>) {
        self.outbox.push_back(line.into());
    }

    fn play_best(&mut self) {
        self.searching = false;
        let Some(mv) = self.board.position().legal_moves().first().cloned() else {
            return;
        };
        let text = self.board.to_xboard(&mv);
        if self.post {
            self.say(format!("3 15 10 1000 {text}"));
        }
        if self.board.push(mv).is_ok() {
            self.say(format!("move {text}"));
        }
    }

    fn search(&mut self) {
        match self.script {
            Script::SelfPlay | Script::Stubborn => self.play_best(),
            Script::Silent => self.searching = true,
            Script::Resign => self.say("resign"),
            Script::IllegalMove => self.say("move e2e5"),
            Script::Crash => self.closed = true,
        }
    }

    fn react(&mut self, command: XBoardCommand) {
        match command {
            XBoardCommand::New => {
                self.board = GameBoard::new();
                self.forced = false;
            }
            XBoardCommand::Force => self.forced = true,
            XBoardCommand::Go => {
                self.forced = false;
                self.search();
            }
            XBoardCommand::MoveNow if self.searching => self.play_best(),
            XBoardCommand::Move(text) => {
                if self.board.push_xboard(&text).is_err() {
                    self.say(format!("Illegal move: {text}"));
                } else if !self.forced {
                    self.search();
                }
            }
            XBoardCommand::Undo => {
                self.board.pop();
            }
            XBoardCommand::Remove => {
                self.board.pop();
                self.board.pop();
            }
            XBoardCommand::Post => self.post = true,
            XBoardCommand::NoPost => self.post = false,
            XBoardCommand::Ping(n) => self.say(format!("pong {n}")),
            XBoardCommand::Quit => self.quit = true,
            XBoardCommand::Unknown(line) => self.say(format!("Error (unknown command): {line}")),
            _ => {}
        }
    }
}

#[async_trait]
impl LineChannel for MockEngine {
    async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.received.lock().push(line.to_string());
        if self.closed {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "engine exited"));
        }
        if let Some(command) = parse_xboard_command(line) {
            self.react(command);
        }
        Ok(())
    }

    async fn recv_line(&mut self) -> io::Result<Option<String>> {
        if let Some(line) = self.outbox.pop_front() {
            return Ok(Some(line));
        }
        if self.closed {
            return Ok(None);
        }
        pending().await
    }

    async fn wait_exit(&mut self, grace: Duration) -> io::Result<ProcessExit> {
        if self.quit && self.script != Script::Stubborn {
            return Ok(ProcessExit::Exited(Some(0)));
        }
        tokio::time::sleep(grace).await;
        Ok(ProcessExit::Killed)
    }

    async fn terminate(&mut self) -> io::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Read back a line the driver sent, the way an engine would.
pub fn parse_xboard_command(line: &str) -> Option<XBoardCommand> {
    let trimmed = line.trim();
    let mut words = trimmed.split_whitespace();
    let head = words.next()?;
    let args: Vec<&str> = words.collect();
    let number = |i: usize| args.get(i).and_then(|v| v.parse().ok());

    Some(match head {
        "xboard" => XBoardCommand::XBoard,
        "protover" => XBoardCommand::Protover(number(0).unwrap_or(1)),
        "uci" => XBoardCommand::Uci,
        "new" => XBoardCommand::New,
        "force" => XBoardCommand::Force,
        "go" => XBoardCommand::Go,
        "random" => XBoardCommand::Random,
        "computer" => XBoardCommand::Computer,
        "undo" => XBoardCommand::Undo,
        "remove" => XBoardCommand::Remove,
        "level" => XBoardCommand::Level {
            moves_per_session: args.first().and_then(|v| v.parse().ok()).unwrap_or(0),
            base_seconds: args.get(1).and_then(|v| parse_base_time(v)).unwrap_or(0),
            increment: args.get(2).and_then(|v| parse_seconds(v)).unwrap_or_default(),
        },
        "st" => XBoardCommand::St(args.first().and_then(|v| parse_seconds(v)).unwrap_or_default()),
        "sd" => XBoardCommand::Sd(args.first().and_then(|v| v.parse().ok()).unwrap_or(64)),
        "time" => XBoardCommand::Time(args.first().and_then(|v| v.parse().ok()).unwrap_or(0)),
        "otim" => XBoardCommand::OTime(args.first().and_then(|v| v.parse().ok()).unwrap_or(0)),
        "post" => XBoardCommand::Post,
        "nopost" => XBoardCommand::NoPost,
        "hard" => XBoardCommand::Hard,
        "easy" => XBoardCommand::Easy,
        "ping" => XBoardCommand::Ping(number(0).unwrap_or(0)),
        "?" => XBoardCommand::MoveNow,
        "quit" => XBoardCommand::Quit,
        _ if is_likely_move(head) => XBoardCommand::Move(head.to_string()),
        _ => XBoardCommand::Unknown(trimmed.to_string()),
    })
}

/// Check if a string looks like a coordinate move (`e2e4`, `e7e8q`)
fn is_likely_move(s: &str) -> bool {
    let bytes = s.as_bytes();
    if !(4..=5).contains(&bytes.len()) {
        return false;
    }
    let square = |file: u8, rank: u8| (b'a'..=b'h').contains(&file) && (b'1'..=b'8').contains(&rank);
    square(bytes[0], bytes[1])
        && square(bytes[2], bytes[3])
        && bytes.get(4).map_or(true, |p| b"qrbnk".contains(p))
}

/// Parse base time (supports "5" minutes or "5:30" format) into seconds
fn parse_base_time(s: &str) -> Option<u64> {
    if let Some((mins, secs)) = s.split_once(':') {
        let mins: u64 = mins.parse().ok()?;
        let secs: u64 = secs.parse().ok()?;
        Some(mins * 60 + secs)
    } else {
        s.parse::<u64>().ok().map(|mins| mins * 60)
    }
}

fn parse_seconds(s: &str) -> Option<Duration> {
    let secs: f64 = s.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Initialized engine around a fresh mock, plus the mock's receive log.
pub async fn initialized(script: Script) -> (CecpEngine<MockEngine>, Arc<Mutex<Vec<String>>>) {
    let mock = MockEngine::new(script);
    let received = mock.received();
    let mut engine = CecpEngine::new(mock, SessionConfig::default());
    engine.initialize().await.expect("initialize");
    (engine, received)
}

pub fn count(received: &Mutex<Vec<String>>, line: &str) -> usize {
    received.lock().iter().filter(|l| *l == line).count()
}
