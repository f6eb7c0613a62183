//! Created/updated timestamps from version control history.

use crate::error::{Error, Result};
use crate::resolver::canonical_location;
use chrono::{DateTime, FixedOffset};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Which commit the `date` field of a document comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatedSource {
    /// Most recent commit touching the file
    #[default]
    LatestCommit,
    /// Same commit as `created`, so both fields are identical
    FirstCommit,
}

/// Source of per-file commit timestamps.
///
/// Implementations must be thread-safe so a single instance can be shared
/// by the pipeline.
pub trait VersionHistory: Send + Sync {
    /// Timestamp of the commit that first added the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no history or the query fails.
    fn created(&self, path: &Path) -> Result<DateTime<FixedOffset>>;

    /// Timestamp of the most recent commit that touched the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no history or the query fails.
    fn updated(&self, path: &Path) -> Result<DateTime<FixedOffset>>;
}

/// History backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitHistory {
    repo: PathBuf,
}

impl GitHistory {
    /// Creates a history reader running git inside `repo`.
    #[must_use]
    pub fn new(repo: impl Into<PathBuf>) -> Self {
        Self { repo: repo.into() }
    }

    fn log(&self, path: &Path, args: &[&str]) -> Result<Vec<String>> {
        // git resolves the worktree to its real path, so the pathspec must match
        let target = canonical_location(path).map_err(|e| Error::io(path, e))?;

        debug!("git log {} -- {}", args.join(" "), target.display());

        let output = self.command(path, args, &target)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::git(
                path,
                format!("git log exited with {}: {stderr}", output.status),
            ));
        }

        let stdout = String::from_utf8(output.stdout)
            .map_err(|e| Error::git(path, format!("utf8 decode: {e}")))?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn command(&self, path: &Path, args: &[&str], target: &Path) -> Result<Output> {
        Command::new("git")
            .arg("-C")
            .arg(&self.repo)
            .arg("log")
            .args(args)
            .arg("--")
            .arg(target)
            .output()
            .map_err(|e| Error::git(path, format!("failed to execute git: {e}")))
    }
}

impl VersionHistory for GitHistory {
    fn created(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
        // newest first; the oldest addition is the last line
        let lines = self.log(path, &["--follow", "--diff-filter=A", "--format=%aI"])?;
        let value = lines
            .last()
            .ok_or_else(|| Error::git(path, "no commit adds this file"))?;
        parse_timestamp(value)
    }

    fn updated(&self, path: &Path) -> Result<DateTime<FixedOffset>> {
        let lines = self.log(path, &["-1", "--format=%aI"])?;
        let value = lines
            .first()
            .ok_or_else(|| Error::git(path, "no commit touches this file"))?;
        parse_timestamp(value)
    }
}

/// Parses a strict ISO 8601 commit date (`%aI`).
///
/// # Errors
///
/// Returns an error if the value is not RFC 3339 compatible.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|e| Error::timestamp(value, e))
}
