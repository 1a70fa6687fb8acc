//! Share workflow: contribute a step version to a collection.
//!
//! `start` opens a session bound to a registered route, `create` authors a
//! descriptor into the route's collection tree and rebuilds its spec, and
//! `finish` hands the pending change to the VCS collaborator. At most one
//! session exists at a time, persisted in `share.json`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use stepman_spec::{
    is_path_component, is_valid_step_id, validate, write_atomic, SpecError, StepDescriptor,
    DESCRIPTOR_FILE,
};
use tracing::{debug, error, info, warn};

use crate::error::{RegistryError, Result};
use crate::home::StepmanHome;
use crate::materialize::rebuild_spec;
use crate::prompt::Prompt;
use crate::route::{Route, RouteRegistry};
use crate::vcs::SourceControl;

/// The in-progress contribution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareSession {
    pub collection: String,
    #[serde(default)]
    pub step_id: String,
    #[serde(default)]
    pub step_tag: String,
}

/// Persistence of the single active session.
#[derive(Debug, Clone)]
pub struct ShareStore {
    path: PathBuf,
}

impl ShareStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ShareStore { path: path.into() }
    }

    /// The session file of a stepman home.
    pub fn for_home(home: &StepmanHome) -> Self {
        ShareStore::new(home.share_path())
    }

    /// Load the active session, if any.
    pub fn load(&self) -> Result<Option<ShareSession>> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let data =
            std::fs::read_to_string(&self.path).map_err(|e| RegistryError::io(&self.path, e))?;
        Ok(Some(serde_json::from_str(&data)?))
    }

    pub fn save(&self, session: &ShareSession) -> Result<()> {
        let json = serde_json::to_string_pretty(session)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|e| RegistryError::Persist {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }

    /// Remove the active session. Clearing an absent session is fine.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RegistryError::io(&self.path, e)),
        }
    }
}

/// Arguments of `share create`.
#[derive(Debug, Clone, Copy)]
pub struct CreateRequest<'a> {
    /// Version tag of the step release.
    pub tag: &'a str,
    /// Source repository of the step.
    pub git: &'a str,
    /// Step id; derived from `git` when absent.
    pub step_id: Option<&'a str>,
}

/// A descriptor written by `share create`.
#[derive(Debug, Clone)]
pub struct ShareCreated {
    pub step: StepDescriptor,
    pub descriptor_path: PathBuf,
    /// Soft validation warnings about the new descriptor.
    pub warnings: Vec<String>,
}

/// Result of `share finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishOutcome {
    /// The collection had nothing to publish.
    NoChanges,
    /// The change was committed and pushed on `branch`.
    Pushed { branch: String },
}

/// Orchestrates the share workflow over the registry and its collaborators.
pub struct ShareWorkflow<'a> {
    registry: &'a RouteRegistry,
    store: ShareStore,
    vcs: &'a dyn SourceControl,
    prompt: &'a dyn Prompt,
}

impl<'a> ShareWorkflow<'a> {
    pub fn new(
        registry: &'a RouteRegistry,
        store: ShareStore,
        vcs: &'a dyn SourceControl,
        prompt: &'a dyn Prompt,
    ) -> Self {
        ShareWorkflow {
            registry,
            store,
            vcs,
            prompt,
        }
    }

    /// Open a session for `collection`. Replaces any earlier session.
    pub fn start(&self, collection: &str) -> Result<ShareSession> {
        if collection.trim().is_empty() {
            return Err(RegistryError::input("no step collection specified"));
        }
        self.route(collection)?;

        if let Some(previous) = self.store.load()? {
            warn!(collection = %previous.collection, "discarding previous share session");
        }
        let session = ShareSession {
            collection: collection.to_string(),
            ..Default::default()
        };
        self.store.save(&session)?;
        info!(collection = %collection, "share started");
        Ok(session)
    }

    /// Author a descriptor for `request` into the session's collection.
    pub fn create(&self, request: CreateRequest<'_>) -> Result<ShareCreated> {
        let mut session = self.store.load()?.ok_or(RegistryError::NoShareSession)?;

        let tag = request.tag.trim();
        if tag.is_empty() {
            return Err(RegistryError::input("no step tag specified"));
        }
        if !is_path_component(tag) {
            return Err(RegistryError::input(format!(
                "step tag '{tag}' cannot name a version directory \
                 (no path separators, no leading '.')"
            )));
        }
        let git = request.git.trim();
        if git.is_empty() {
            return Err(RegistryError::input("no step source uri specified"));
        }

        let step_id = match request.step_id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => step_id_from_git(git),
        };
        if !is_valid_step_id(&step_id) {
            return Err(SpecError::InvalidStep {
                id: step_id.clone(),
                version: tag.to_string(),
                errors: vec![format!("step id '{step_id}' doesn't conform to [a-z0-9-]")],
            }
            .into());
        }

        let route = self.route(&session.collection)?;
        let layout = route.layout();
        let descriptor_path = layout.descriptor_path(&step_id, tag)?;

        let step = self.fetch_descriptor(git, tag, &step_id)?;
        let report = validate(&step);
        if !report.is_valid() {
            return Err(SpecError::InvalidStep {
                id: step_id,
                version: tag.to_string(),
                errors: report.errors,
            }
            .into());
        }
        for warning in &report.warnings {
            warn!(step = %step, "{warning}");
        }

        if descriptor_path.exists() {
            let question = format!(
                "Step already exists at {}. Overwrite it?",
                descriptor_path.display()
            );
            if !self.prompt.confirm(&question)? {
                return Err(RegistryError::OverwriteDeclined {
                    path: descriptor_path,
                });
            }
        }

        session.step_id = step_id.clone();
        session.step_tag = tag.to_string();
        self.store.save(&session)?;

        self.vcs.switch_branch(&route.collection_dir(), &step_id)?;

        let yaml = step.to_yaml()?;
        let previous = std::fs::read(&descriptor_path).ok();
        write_atomic(&descriptor_path, yaml.as_bytes())
            .map_err(|e| RegistryError::io(&descriptor_path, e))?;
        info!(step = %step, path = ?descriptor_path, "descriptor written");

        if let Err(e) = rebuild_spec(&route) {
            restore_descriptor(&descriptor_path, previous.as_deref());
            return Err(e);
        }

        Ok(ShareCreated {
            step,
            descriptor_path,
            warnings: report.warnings,
        })
    }

    /// Publish the session's change and close the session.
    ///
    /// Without pending changes this only warns; nothing is staged,
    /// committed or pushed.
    pub fn finish(&self) -> Result<FinishOutcome> {
        let session = self.store.load()?.ok_or(RegistryError::NoShareSession)?;
        let route = self.route(&session.collection)?;
        let collection_dir = route.collection_dir();

        if !self.vcs.has_changes(&collection_dir)? {
            warn!(collection = %session.collection, "no changes to share");
            self.store.clear()?;
            return Ok(FinishOutcome::NoChanges);
        }
        if session.step_id.is_empty() {
            return Err(RegistryError::input(
                "no step created in this session, run share create first",
            ));
        }

        let descriptor = route
            .layout()
            .descriptor_path(&session.step_id, &session.step_tag)?;
        let relative = descriptor
            .strip_prefix(&collection_dir)
            .unwrap_or(&descriptor)
            .to_path_buf();

        self.vcs.stage(&collection_dir, &relative)?;
        self.vcs.commit(
            &collection_dir,
            &format!("{} {}", session.step_id, session.step_tag),
        )?;
        self.vcs.push(&collection_dir, &session.step_id)?;
        self.store.clear()?;

        info!(step_id = %session.step_id, branch = %session.step_id, "share finished");
        Ok(FinishOutcome::Pushed {
            branch: session.step_id,
        })
    }

    fn route(&self, collection: &str) -> Result<Route> {
        self.registry
            .route_for(collection)
            .cloned()
            .ok_or_else(|| RegistryError::RouteNotFound {
                collection: collection.to_string(),
            })
    }

    /// Clone the step's release into scratch space and stamp its descriptor.
    fn fetch_descriptor(&self, git: &str, tag: &str, step_id: &str) -> Result<StepDescriptor> {
        let scratch = tempfile::tempdir().map_err(|e| RegistryError::io(std::env::temp_dir(), e))?;
        let checkout = scratch.path().join(step_id);
        debug!(git = %git, tag = %tag, dir = ?checkout, "fetching step source");

        self.vcs.clone_repo(git, &checkout, Some(tag))?;
        let mut step = StepDescriptor::read(&checkout.join(DESCRIPTOR_FILE), step_id, tag)?;
        let commit = self.vcs.head_commit(&checkout)?;
        step.stamp_source(git, &commit, Utc::now());
        Ok(step)
    }
}

/// Put back what `create` replaced: the earlier descriptor, or nothing.
/// Failures are logged; the caller surfaces the rebuild error.
fn restore_descriptor(path: &Path, previous: Option<&[u8]>) {
    let restored = match previous {
        Some(bytes) => write_atomic(path, bytes),
        None => std::fs::remove_file(path).map(|()| {
            // Empty version and step directories go too.
            for dir in path.ancestors().skip(1).take(2) {
                if std::fs::remove_dir(dir).is_err() {
                    break;
                }
            }
        }),
    };
    match restored {
        Ok(()) => warn!(path = ?path, "spec rebuild failed, descriptor reverted"),
        Err(e) => error!(path = ?path, "failed to revert descriptor: {e}"),
    }
}

/// Derive a step id from a source URI: the last path segment up to its
/// first dot (`https://host/org/my-step.git` gives `my-step`).
pub fn step_id_from_git(git: &str) -> String {
    let last = git
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or_default();
    last.split('.').next().unwrap_or_default().to_string()
}
