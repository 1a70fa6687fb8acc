//! In-process doubles for the registry's seams.
//!
//! Compiled for this crate's tests and behind the `testing` feature for
//! downstream test suites.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::alias::AliasGenerator;
use crate::error::{RegistryError, Result};
use crate::fsutil;
use crate::route::{Route, RouteStore};
use crate::vcs::SourceControl;

/// Deterministic tokens: `<prefix>0`, `<prefix>1`, ...
#[derive(Debug, Default)]
pub struct SeededAlias {
    prefix: String,
    next: Cell<u64>,
}

impl SeededAlias {
    pub fn new(prefix: impl Into<String>) -> Self {
        SeededAlias {
            prefix: prefix.into(),
            next: Cell::new(0),
        }
    }
}

impl AliasGenerator for SeededAlias {
    fn generate(&self) -> String {
        let n = self.next.get();
        self.next.set(n + 1);
        format!("{}{n}", self.prefix)
    }
}

/// Always the same token. Reproduces an alias across runs.
#[derive(Debug, Clone)]
pub struct FixedAlias(pub String);

impl AliasGenerator for FixedAlias {
    fn generate(&self) -> String {
        self.0.clone()
    }
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    routes: RefCell<Vec<Route>>,
    fail_saves: bool,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        MemoryRouteStore::default()
    }

    /// A store whose every save fails, for exercising persistence errors.
    pub fn failing() -> Self {
        MemoryRouteStore {
            routes: RefCell::new(Vec::new()),
            fail_saves: true,
        }
    }

    /// Snapshot of what has been saved.
    pub fn saved(&self) -> Vec<Route> {
        self.routes.borrow().clone()
    }
}

impl RouteStore for MemoryRouteStore {
    fn load(&self) -> Result<Vec<Route>> {
        Ok(self.routes.borrow().clone())
    }

    fn save(&self, routes: &[Route]) -> Result<()> {
        if self.fail_saves {
            return Err(RegistryError::Persist {
                path: PathBuf::from("<memory>"),
                detail: "store is read-only".to_string(),
            });
        }
        *self.routes.borrow_mut() = routes.to_vec();
        Ok(())
    }
}

/// In-process [`SourceControl`] for tests and offline use.
///
/// "Cloning" a registered URI copies its source directory; unknown URIs
/// fail. Every call is recorded as `"<operation> <argument>"`.
#[derive(Debug, Default)]
pub struct ScriptedVcs {
    sources: HashMap<String, PathBuf>,
    commit: String,
    pending_changes: bool,
    failing: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedVcs {
    pub fn new() -> Self {
        ScriptedVcs {
            commit: "0000000000000000000000000000000000000000".to_string(),
            ..Default::default()
        }
    }

    /// Serve `uri` from the contents of `dir`.
    pub fn with_source(mut self, uri: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.sources.insert(uri.into(), dir.into());
        self
    }

    /// Commit hash reported by `head_commit`.
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = commit.into();
        self
    }

    /// What `has_changes` reports.
    pub fn with_pending_changes(mut self, pending: bool) -> Self {
        self.pending_changes = pending;
        self
    }

    /// Make an operation (`clone`, `pull`, `push`, ...) fail.
    pub fn failing(mut self, operation: impl Into<String>) -> Self {
        self.failing.insert(operation.into());
        self
    }

    /// Calls made so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Number of calls to one operation.
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    fn record(&self, operation: &str, arg: &str) -> Result<()> {
        self.calls.borrow_mut().push(format!("{operation} {arg}"));
        if self.failing.contains(operation) {
            return Err(RegistryError::collaborator(
                format!("scripted {operation}"),
                "configured to fail",
            ));
        }
        Ok(())
    }
}

impl SourceControl for ScriptedVcs {
    fn clone_repo(&self, uri: &str, dest: &Path, _tag: Option<&str>) -> Result<()> {
        self.record("clone", uri)?;
        let src = self.sources.get(uri).ok_or_else(|| {
            RegistryError::collaborator("scripted clone", format!("repository not found: {uri}"))
        })?;
        fsutil::copy_dir(src, dest, false)
            .map_err(|e| RegistryError::collaborator("scripted clone", e.to_string()))
    }

    fn pull(&self, dir: &Path) -> Result<()> {
        self.record("pull", &dir.to_string_lossy())
    }

    fn head_commit(&self, dir: &Path) -> Result<String> {
        self.record("head", &dir.to_string_lossy())?;
        Ok(self.commit.clone())
    }

    fn has_changes(&self, dir: &Path) -> Result<bool> {
        self.record("status", &dir.to_string_lossy())?;
        Ok(self.pending_changes)
    }

    fn switch_branch(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("checkout", branch)
    }

    fn stage(&self, _dir: &Path, path: &Path) -> Result<()> {
        self.record("add", &path.to_string_lossy())
    }

    fn commit(&self, _dir: &Path, message: &str) -> Result<()> {
        self.record("commit", message)
    }

    fn push(&self, _dir: &Path, branch: &str) -> Result<()> {
        self.record("push", branch)
    }
}
