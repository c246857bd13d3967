//! Dialect identification, extension hooks and session timing.

use std::fmt;
use std::time::Duration;

use crate::engine::options::ConfigValue;

/// Dialect an engine speaks, as observed by probing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    Uci,
    /// CECP, also known as the xboard protocol
    Cecp,
    Unknown,
}

impl Dialect {
    /// Detect the dialect from a handshake reply, if the line is conclusive.
    #[must_use]
    pub fn detect(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed == "uciok" {
            Some(Dialect::Uci)
        } else if trimmed.starts_with("feature done") {
            Some(Dialect::Cecp)
        } else {
            None
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::Uci => "UCI",
            Dialect::Cecp => "CECP",
            Dialect::Unknown => "unknown",
        })
    }
}

/// Hooks for protocol extensions.
///
/// Feature negotiation and option setting are not part of the first protocol
/// version; the default methods do nothing.
pub trait ExtensionHooks: Send {
    /// Called with the arguments of each `feature` line during initialization.
    fn on_feature(&mut self, _args: &str) {}

    /// Called for every option applied by `configure` or `play`.
    fn set_option(&mut self, _name: &str, _value: Option<&ConfigValue>) {}
}

/// Hooks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtensions;

impl ExtensionHooks for NoExtensions {}

/// Timeouts used by a session and the prober.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// How long to wait for the handshake before carrying on anyway
    pub init_timeout: Duration,
    /// How long a probe waits for `uciok` or `feature done`
    pub probe_timeout: Duration,
    /// How long a cancelled command may take to acknowledge its settle ping
    pub settle_timeout: Duration,
    /// How long `quit` waits for the process to exit before killing it
    pub quit_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(3),
            probe_timeout: Duration::from_secs(2),
            settle_timeout: Duration::from_secs(5),
            quit_grace: Duration::from_secs(5),
        }
    }
}
