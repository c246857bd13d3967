//! Engine option values and the options the session manages itself.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::EngineError;

/// Options the session sets on its own; callers may not configure them.
pub const MANAGED_OPTIONS: [&str; 4] = ["uci_chess960", "uci_variant", "multipv", "ponder"];

/// Value of an engine option.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ConfigValue {
    /// Truthiness: `false`, `0` and the empty string are false.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            ConfigValue::Bool(b) => *b,
            ConfigValue::Int(n) => *n != 0,
            ConfigValue::Str(s) => !s.is_empty(),
        }
    }

    /// Parse a `name=value` style value: booleans, then integers, else text.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.to_ascii_lowercase().as_str() {
            "true" => return ConfigValue::Bool(true),
            "false" => return ConfigValue::Bool(false),
            _ => {}
        }
        raw.parse::<i64>()
            .map_or_else(|_| ConfigValue::Str(raw.to_string()), ConfigValue::Int)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{b}"),
            ConfigValue::Int(n) => write!(f, "{n}"),
            ConfigValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Int(n)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Str(s.to_string())
    }
}

/// Option name to value. `None` means "set without a value".
pub type ConfigMapping = BTreeMap<String, Option<ConfigValue>>;

/// Whether `name` is one of [`MANAGED_OPTIONS`], ignoring case.
#[must_use]
pub fn is_managed(name: &str) -> bool {
    let normalized = name.trim().to_ascii_lowercase();
    MANAGED_OPTIONS.contains(&normalized.as_str())
}

/// Fail on the first managed option name among `names`.
pub fn reject_managed<'a>(names: impl IntoIterator<Item = &'a String>) -> Result<(), EngineError> {
    match names.into_iter().find(|name| is_managed(name)) {
        Some(name) => Err(EngineError::Config(format!(
            "cannot set {name} which is automatically managed"
        ))),
        None => Ok(()),
    }
}

/// Whether `name` is present with a truthy value.
#[must_use]
pub fn is_set(config: &ConfigMapping, name: &str) -> bool {
    config
        .get(name)
        .and_then(Option::as_ref)
        .is_some_and(ConfigValue::is_truthy)
}

/// Parse `name=value` (or bare `name`) into a mapping entry.
#[must_use]
pub fn parse_option(spec: &str) -> (String, Option<ConfigValue>) {
    match spec.split_once('=') {
        Some((name, value)) => (name.trim().to_string(), Some(ConfigValue::parse(value))),
        None => (spec.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn managed_names_ignore_case() {
        assert!(is_managed("Ponder"));
        assert!(is_managed("MultiPV"));
        assert!(is_managed("UCI_Chess960"));
        assert!(is_managed("uci_variant"));
        assert!(!is_managed("Threads"));
    }

    #[test]
    fn reject_managed_names_the_option() {
        let names = vec!["Hash".to_string(), "MultiPV".to_string()];
        match reject_managed(&names) {
            Err(EngineError::Config(msg)) => assert!(msg.contains("MultiPV")),
            other => panic!("Expected config error, got {other:?}"),
        }
        assert!(reject_managed(&vec!["Hash".to_string()]).is_ok());
    }

    #[test]
    fn truthiness() {
        assert!(ConfigValue::Bool(true).is_truthy());
        assert!(!ConfigValue::Bool(false).is_truthy());
        assert!(!ConfigValue::Int(0).is_truthy());
        assert!(ConfigValue::Int(-1).is_truthy());
        assert!(!ConfigValue::Str(String::new()).is_truthy());
    }

    #[test]
    fn is_set_requires_truthy_value() {
        let mut config = ConfigMapping::new();
        config.insert("random".to_string(), Some(true.into()));
        config.insert("computer".to_string(), None);
        config.insert("zero".to_string(), Some(0.into()));
        assert!(is_set(&config, "random"));
        assert!(!is_set(&config, "computer"));
        assert!(!is_set(&config, "zero"));
        assert!(!is_set(&config, "missing"));
    }

    #[test]
    fn parse_values() {
        assert_eq!(ConfigValue::parse("TRUE"), ConfigValue::Bool(true));
        assert_eq!(ConfigValue::parse(" 42 "), ConfigValue::Int(42));
        assert_eq!(ConfigValue::parse("book.bin"), ConfigValue::from("book.bin"));
    }

    #[test]
    fn parse_option_specs() {
        assert_eq!(
            parse_option("Threads=1"),
            ("Threads".to_string(), Some(ConfigValue::Int(1)))
        );
        assert_eq!(parse_option("random"), ("random".to_string(), None));
    }
}
