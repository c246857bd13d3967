//! Engine driver.
//!
//! This module ties a [`LineChannel`](crate::channel::LineChannel) to a
//! [`Session`](crate::session::Session): time controls, option handling,
//! dialect identification and the async controller that runs commands.

mod controller;
pub mod options;
mod protocol;
pub mod time;

pub use controller::{popen_cecp, CecpEngine};
pub use options::{ConfigMapping, ConfigValue, MANAGED_OPTIONS};
pub use protocol::{Dialect, ExtensionHooks, NoExtensions, SessionConfig};
pub use time::{time_control_commands, Limit};
