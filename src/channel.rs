//! Line-oriented transport to an engine process.
//!
//! [`LineChannel`] is the seam between the driver and the outside world: the
//! driver only ever sends whole lines, receives whole lines and waits for the
//! process to go away. [`ProcessChannel`] implements it over a child's pipes.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::task::JoinHandle;

/// How the engine process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited on its own; `None` when terminated by a signal
    Exited(Option<i32>),
    /// Did not exit within the grace period and was killed
    Killed,
}

/// Bidirectional text stream to an engine.
#[async_trait]
pub trait LineChannel: Send {
    /// Write one line. Ordered, best effort.
    async fn send_line(&mut self, line: &str) -> io::Result<()>;

    /// Next line without its terminator, `None` at end of stream.
    ///
    /// Must be cancel safe: a partially read line is kept for the next call.
    async fn recv_line(&mut self) -> io::Result<Option<String>>;

    /// Close the engine's input and wait for it to exit, killing it after
    /// `grace`. Must keep waiting in the background if the caller gives up.
    async fn wait_exit(&mut self, grace: Duration) -> io::Result<ProcessExit>;

    /// Kill the engine without waiting for it.
    async fn terminate(&mut self) -> io::Result<()>;
}

/// How to spawn an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Start the engine in its own process group so terminal signals such
    /// as Ctrl-C are not delivered to it (unix only).
    pub new_process_group: bool,
}

impl EngineCommand {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        EngineCommand {
            program: program.into(),
            args: Vec::new(),
            new_process_group: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn process_group(mut self, enabled: bool) -> Self {
        self.new_process_group = enabled;
        self
    }
}

impl From<&Path> for EngineCommand {
    fn from(path: &Path) -> Self {
        EngineCommand::new(path)
    }
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// [`LineChannel`] over a child process's stdin and stdout.
pub struct ProcessChannel {
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    pending: Vec<u8>,
    child: Option<Child>,
    reaper: Option<JoinHandle<io::Result<ProcessExit>>>,
    exit: Option<ProcessExit>,
}

impl ProcessChannel {
    /// Spawn the engine with piped stdin/stdout. Stderr is discarded.
    pub fn spawn(command: &EngineCommand) -> io::Result<Self> {
        let mut std_command = std::process::Command::new(&command.program);
        std_command
            .args(&command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if command.program.is_absolute() {
            if let Some(dir) = command.program.parent() {
                // engines look for books and tables next to themselves
                std_command.current_dir(dir);
            }
        }
        #[cfg(unix)]
        if command.new_process_group {
            use std::os::unix::process::CommandExt;
            std_command.process_group(0);
        }

        let mut child = tokio::process::Command::from(std_command)
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;

        Ok(ProcessChannel {
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            pending: Vec::new(),
            child: Some(child),
            reaper: None,
            exit: None,
        })
    }

    /// Process id, while the child has not been handed to the reaper.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }
}

fn missing_pipe(name: &str) -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, format!("engine {name} unavailable"))
}

#[async_trait]
impl LineChannel for ProcessChannel {
    async fn send_line(&mut self, line: &str) -> io::Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| missing_pipe("stdin"))?;
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        stdin.write_all(&data).await?;
        stdin.flush().await
    }

    async fn recv_line(&mut self) -> io::Result<Option<String>> {
        // read_until appends to `pending`, so a cancelled read loses nothing
        let read = self.stdout.read_until(b'\n', &mut self.pending).await?;
        if read == 0 && self.pending.is_empty() {
            return Ok(None);
        }
        let mut raw = std::mem::take(&mut self.pending);
        while matches!(raw.last(), Some(b'\n' | b'\r')) {
            raw.pop();
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    async fn wait_exit(&mut self, grace: Duration) -> io::Result<ProcessExit> {
        if let Some(exit) = self.exit {
            return Ok(exit);
        }
        // closing stdin is the last word for engines that ignore `quit`
        self.stdin.take();

        if self.reaper.is_none() {
            let child = self.child.take().ok_or_else(|| missing_pipe("process"))?;
            self.reaper = Some(tokio::spawn(reap(child, grace)));
        }

        let Some(reaper) = self.reaper.as_mut() else {
            return Err(missing_pipe("process"));
        };
        let exit = reaper
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;
        self.reaper = None;
        self.exit = Some(exit);
        Ok(exit)
    }

    async fn terminate(&mut self) -> io::Result<()> {
        self.stdin.take();
        match self.child.as_mut() {
            Some(child) => child.start_kill(),
            None => Ok(()),
        }
    }
}

/// Runs on its own task so it finishes even if the waiter is dropped.
async fn reap(mut child: Child, grace: Duration) -> io::Result<ProcessExit> {
    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => Ok(ProcessExit::Exited(status?.code())),
        Err(_) => {
            child.kill().await?;
            Ok(ProcessExit::Killed)
        }
    }
}

/// Direction of a recorded wire line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sent,
    Received,
}

/// The most recent wire lines of one engine, oldest first.
#[derive(Debug)]
pub struct Transcript {
    lines: Mutex<VecDeque<(Direction, String)>>,
    capacity: usize,
}

impl Default for Transcript {
    fn default() -> Self {
        Self::with_capacity(256)
    }
}

impl Transcript {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Transcript {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn record(&self, direction: Direction, line: &str) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back((direction, line.to_string()));
    }

    /// The last `n` lines rendered as `>> sent` / `<< received`.
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<String> {
        let lines = self.lines.lock();
        let skip = lines.len().saturating_sub(n);
        lines
            .iter()
            .skip(skip)
            .map(|(direction, line)| match direction {
                Direction::Sent => format!(">> {line}"),
                Direction::Received => format!("<< {line}"),
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
