//! Session validity tracking.
//!
//! A small marker file per user and profile holds the Unix timestamp of
//! the last successful re-authentication. Inside the TTL window the marker
//! is trusted and no external call happens; outside it the configured
//! re-auth command runs, and the marker is refreshed on success or removed
//! on failure. Writes are last-write-wins: concurrent sessions can race,
//! and the worst case is one redundant re-authentication.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Utc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("re-authentication exited with status {0}")]
    ReauthFailed(i32),
}

pub struct SessionGuard {
    path: PathBuf,
    ttl_secs: i64,
    reauth: Vec<String>,
}

impl SessionGuard {
    pub fn new(path: PathBuf, ttl_secs: i64, reauth: Vec<String>) -> Self {
        SessionGuard {
            path,
            ttl_secs,
            reauth,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Profile component of the marker filename, from `$AWS_PROFILE`.
    pub fn profile() -> String {
        std::env::var("AWS_PROFILE").unwrap_or_else(|_| "default".to_string())
    }

    fn read_timestamp(&self) -> Option<i64> {
        let text = fs::read_to_string(&self.path).ok()?;
        text.split_whitespace().next()?.parse().ok()
    }

    /// Whether the marker exists and is inside its TTL window.
    pub fn is_fresh(&self) -> bool {
        match self.read_timestamp() {
            Some(ts) => {
                let age = Utc::now().timestamp() - ts;
                age >= 0 && age < self.ttl_secs
            }
            None => false,
        }
    }

    /// Record a successful validation at the current time.
    pub fn refresh(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", Utc::now().timestamp()))
    }

    /// Drop the marker after a failed validation.
    pub fn invalidate(&self) {
        let _ = fs::remove_file(&self.path);
    }

    /// Re-authenticate if the marker is stale. Blocks on the external
    /// command for as long as it takes.
    pub fn ensure_valid(&self) -> Result<(), SessionError> {
        if self.is_fresh() {
            return Ok(());
        }
        if self.reauth.is_empty() {
            return Ok(());
        }
        crate::trace!("session marker stale; running {}", self.reauth.join(" "));
        let status = Command::new(&self.reauth[0])
            .args(&self.reauth[1..])
            .status()
            .map_err(|e| {
                self.invalidate();
                SessionError::Io(e)
            })?;
        if status.success() {
            self.refresh()?;
            Ok(())
        } else {
            self.invalidate();
            Err(SessionError::ReauthFailed(status.code().unwrap_or(-1)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn guard_in(dir: &Path, ttl: i64, reauth: &[&str]) -> SessionGuard {
        SessionGuard::new(
            dir.join("session-default"),
            ttl,
            reauth.iter().map(|s| s.to_string()).collect(),
        )
    }

    #[test]
    fn missing_marker_is_stale() {
        let dir = tempdir().unwrap();
        assert!(!guard_in(dir.path(), 3600, &[]).is_fresh());
    }

    #[test]
    fn refreshed_marker_is_fresh() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 3600, &[]);
        guard.refresh().unwrap();
        assert!(guard.is_fresh());
    }

    #[test]
    fn old_marker_is_stale() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 10, &[]);
        let old = Utc::now().timestamp() - 60;
        fs::write(guard.path(), format!("{old}\n")).unwrap();
        assert!(!guard.is_fresh());
    }

    #[test]
    fn garbage_marker_is_stale() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 3600, &[]);
        fs::write(guard.path(), "not a timestamp\n").unwrap();
        assert!(!guard.is_fresh());
    }

    #[test]
    fn successful_reauth_refreshes_the_marker() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 3600, &["true"]);
        guard.ensure_valid().unwrap();
        assert!(guard.is_fresh());
    }

    #[test]
    fn failed_reauth_removes_the_marker() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 10, &["false"]);
        let old = Utc::now().timestamp() - 60;
        fs::write(guard.path(), format!("{old}\n")).unwrap();

        let result = guard.ensure_valid();
        assert!(matches!(result, Err(SessionError::ReauthFailed(_))));
        assert!(!guard.path().exists());
    }

    #[test]
    fn fresh_marker_skips_the_external_command() {
        let dir = tempdir().unwrap();
        // A command that cannot succeed; it must never run
        let guard = guard_in(dir.path(), 3600, &["/nonexistent-reauth-tool"]);
        guard.refresh().unwrap();
        guard.ensure_valid().unwrap();
    }

    #[test]
    fn invalidate_is_idempotent() {
        let dir = tempdir().unwrap();
        let guard = guard_in(dir.path(), 3600, &[]);
        guard.invalidate();
        guard.refresh().unwrap();
        guard.invalidate();
        assert!(!guard.path().exists());
    }
}
