//! Glob patterns matched against whole command lines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid glob pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

/// A registered routing pattern.
///
/// Wildcard patterns (`*`, `?`, `[...]`) are glob-matched against the full,
/// unmodified line. Literal patterns are command words, confirmed by
/// detection rather than whole-line equality.
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    glob: glob::Pattern,
}

impl Pattern {
    pub fn new(raw: &str) -> Result<Self, PatternError> {
        let glob = glob::Pattern::new(raw).map_err(|source| PatternError::Invalid {
            pattern: raw.to_string(),
            source,
        })?;
        Ok(Self {
            raw: raw.to_string(),
            glob,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// No glob metacharacters: this is a bare command word.
    pub fn is_literal(&self) -> bool {
        !self.raw.chars().any(|c| matches!(c, '*' | '?' | '['))
    }

    /// Glob match against the full line.
    pub fn matches_line(&self, line: &str) -> bool {
        self.glob.matches(line)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Pattern {}
