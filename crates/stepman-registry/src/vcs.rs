//! Version-control collaborator.
//!
//! The registry never speaks a VCS protocol itself. It asks a
//! [`SourceControl`] to fetch contents into a directory or to mirror a
//! directory's pending changes upstream, and only looks at success or
//! failure. [`GitCli`] drives the `git` binary.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::error::{RegistryError, Result};

/// Abstract version-control operations used by setup, update and share.
pub trait SourceControl {
    /// Fetch `uri` into `dest`, optionally pinned to `tag`.
    fn clone_repo(&self, uri: &str, dest: &Path, tag: Option<&str>) -> Result<()>;

    /// Bring an existing checkout up to date with its origin.
    fn pull(&self, dir: &Path) -> Result<()>;

    /// Commit hash of the checked-out revision.
    fn head_commit(&self, dir: &Path) -> Result<String>;

    /// Whether the working tree has uncommitted changes.
    fn has_changes(&self, dir: &Path) -> Result<bool>;

    /// Check out `branch`, creating it if it does not exist.
    fn switch_branch(&self, dir: &Path, branch: &str) -> Result<()>;

    /// Stage one path.
    fn stage(&self, dir: &Path, path: &Path) -> Result<()>;

    fn commit(&self, dir: &Path, message: &str) -> Result<()>;

    /// Push `branch` to the upstream remote.
    fn push(&self, dir: &Path, branch: &str) -> Result<()>;
}

/// [`SourceControl`] backed by the `git` command-line tool.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    remote: String,
}

impl Default for GitCli {
    fn default() -> Self {
        GitCli::new("git", "origin")
    }
}

impl GitCli {
    /// Use `program` as the git binary and push to `remote`.
    pub fn new(program: impl Into<String>, remote: impl Into<String>) -> Self {
        GitCli {
            program: program.into(),
            remote: remote.into(),
        }
    }

    /// Run git and return trimmed stdout.
    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let operation = format!("git {}", args.first().copied().unwrap_or_default());
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        debug!(?dir, ?args, "running git");

        let output = cmd
            .output()
            .map_err(|e| RegistryError::collaborator(&operation, e.to_string()))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(RegistryError::collaborator(
                operation,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

impl SourceControl for GitCli {
    fn clone_repo(&self, uri: &str, dest: &Path, tag: Option<&str>) -> Result<()> {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }
        let dest = dest.to_string_lossy();
        let mut args = vec!["clone", "--recursive"];
        if let Some(tag) = tag {
            args.extend(["--branch", tag, "--depth", "1"]);
        }
        args.extend([uri, &*dest]);
        self.run(None, &args).map(|_| ())
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        self.run(Some(dir), &["pull"]).map(|_| ())
    }

    fn head_commit(&self, dir: &Path) -> Result<String> {
        self.run(Some(dir), &["rev-parse", "HEAD"])
    }

    fn has_changes(&self, dir: &Path) -> Result<bool> {
        let status = self.run(Some(dir), &["status", "--porcelain"])?;
        Ok(!status.is_empty())
    }

    fn switch_branch(&self, dir: &Path, branch: &str) -> Result<()> {
        self.run(Some(dir), &["checkout", branch])
            .or_else(|_| self.run(Some(dir), &["checkout", "-b", branch]))
            .map(|_| ())
    }

    fn stage(&self, dir: &Path, path: &Path) -> Result<()> {
        let path = path.to_string_lossy();
        self.run(Some(dir), &["add", &*path]).map(|_| ())
    }

    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.run(Some(dir), &["commit", "-m", message]).map(|_| ())
    }

    fn push(&self, dir: &Path, branch: &str) -> Result<()> {
        self.run(Some(dir), &["push", "-u", self.remote.as_str(), branch])
            .map(|_| ())
    }
}
