//! Layered lookup across the configuration sources.
//!
//! Precedence: command-line option > defaults secret > process environment >
//! hardcoded default. Empty values count as absent at every layer.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::options::CommandLineOptions;
use crate::errors::{DeployError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Argument,
    Secret,
    Environment,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Argument => write!(f, "argument"),
            Source::Secret => write!(f, "secret"),
            Source::Environment => write!(f, "environment"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    pub options: CommandLineOptions,
    pub secret_defaults: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
}

impl ConfigSources {
    pub fn new(
        options: CommandLineOptions,
        secret_defaults: BTreeMap<String, String>,
        environment: BTreeMap<String, String>,
    ) -> Self {
        Self {
            options,
            secret_defaults,
            environment,
        }
    }

    /// Finds the highest-precedence non-empty value for `key`
    pub fn lookup(&self, key: &str) -> Option<(&str, Source)> {
        let layers = [
            (self.options.get(key), Source::Argument),
            (self.secret_defaults.get(key).map(|s| s.as_str()), Source::Secret),
            (self.environment.get(key).map(|s| s.as_str()), Source::Environment),
        ];

        layers
            .into_iter()
            .find_map(|(value, source)| value.filter(|v| !v.is_empty()).map(|v| (v, source)))
    }

    pub fn str(&self, key: &str) -> Option<String> {
        self.lookup(key).map(|(value, source)| {
            debug!("{} from {}: {}", key, source, value);
            value.to_string()
        })
    }

    pub fn str_or(&self, key: &str, default: &str) -> String {
        self.str(key).unwrap_or_else(|| default.to_string())
    }

    pub fn required(&self, key: &str) -> Result<String> {
        self.str(key).ok_or_else(|| DeployError::missing(key))
    }

    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.str(key) {
            Some(raw) => raw.trim().parse::<T>().map_err(|e| DeployError::InvalidValue {
                key: key.to_string(),
                reason: format!("'{}': {}", raw, e),
            }),
            None => Ok(default),
        }
    }

    /// Only the literal `true` (any case) enables a flag
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.str(key)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }
}
