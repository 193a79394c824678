//! Pipeline configuration.
//!
//! Loaded from `$PREFLIGHT_HOME/config.toml` (default `~/.preflight/`).
//! Every field has a default; a missing file means defaults, and a
//! malformed file is reported on the trace stream and ignored rather than
//! breaking command entry.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

use crate::cache::DEFAULT_CACHE_CAPACITY;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Bounded size of the detection result cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Seconds a session-validity marker stays fresh
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: i64,

    /// External re-authentication command, as an argv list
    #[serde(default = "default_reauth_command")]
    pub reauth_command: Vec<String>,

    /// Scheme prefix applied to qualified bucket references
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_session_ttl() -> i64 {
    3600
}

fn default_reauth_command() -> Vec<String> {
    vec!["aws".to_string(), "sso".to_string(), "login".to_string()]
}

fn default_scheme() -> String {
    "s3://".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_capacity: default_cache_capacity(),
            session_ttl_secs: default_session_ttl(),
            reauth_command: default_reauth_command(),
            scheme: default_scheme(),
        }
    }
}

/// Get home directory
pub(crate) fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// State directory: `$PREFLIGHT_HOME` if set, else `~/.preflight`
pub fn state_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("PREFLIGHT_HOME") {
        return Some(PathBuf::from(dir));
    }
    dirs_home().map(|h| h.join(".preflight"))
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load the configuration, falling back to defaults when the file is
    /// absent or unreadable.
    pub fn load() -> Self {
        let path = match state_dir() {
            Some(dir) => dir.join("config.toml"),
            None => return Self::default(),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Self::default(),
        };
        match Self::from_toml(&text) {
            Ok(config) => config,
            Err(e) => {
                crate::trace!("ignoring malformed {}: {e}", path.display());
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.session_ttl_secs, 3600);
        assert_eq!(config.scheme, "s3://");
        assert_eq!(config.reauth_command, vec!["aws", "sso", "login"]);
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = Config::from_toml(
            r#"
            session_ttl_secs = 60
            reauth_command = ["true"]
            "#,
        )
        .unwrap();
        assert_eq!(config.session_ttl_secs, 60);
        assert_eq!(config.reauth_command, vec!["true"]);
        assert_eq!(config.scheme, "s3://");
        assert_eq!(config.cache_capacity, DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn malformed_toml_errors() {
        assert!(Config::from_toml("session_ttl_secs = \"soon\"").is_err());
    }
}
