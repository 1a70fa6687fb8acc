//! Collection materialization: transactional setup and update.
//!
//! Setup runs
//! ```text
//! START -> ACQUIRING -> AGGREGATING -> COMMITTED
//! ```
//! and rolls back (base directory deleted, registry entry dropped) on any
//! failure before the commit. The route is registered last, after its spec
//! is on disk, so the registry never advertises a route without a spec.

use std::path::{Path, PathBuf};

use stepman_spec::{aggregate, Aggregation};
use tracing::{debug, error, info, warn};

use crate::alias::{normalize, AliasGenerator};
use crate::error::{RegistryError, Result};
use crate::fsutil;
use crate::home::StepmanHome;
use crate::route::{Route, RouteRegistry};
use crate::vcs::SourceControl;

/// A setup request.
#[derive(Debug, Clone, Copy)]
pub struct SetupRequest<'a> {
    /// Collection identifier: a VCS URI, or a directory path in local mode.
    pub collection: &'a str,
    /// Copy from a local directory instead of cloning.
    pub local: bool,
    /// Copy the generated spec here after the route is committed.
    pub export_path: Option<&'a Path>,
}

/// What a setup or update produced.
#[derive(Debug, Clone)]
pub struct SetupOutcome {
    pub route: Route,
    /// The route already existed with its directory; nothing was done.
    pub already_set_up: bool,
    pub step_count: usize,
    pub version_count: usize,
    /// Soft validation warnings from aggregation.
    pub warnings: Vec<String>,
}

impl SetupOutcome {
    fn from_aggregation(route: Route, aggregation: Aggregation) -> Self {
        SetupOutcome {
            route,
            already_set_up: false,
            step_count: aggregation.spec.step_count(),
            version_count: aggregation.spec.version_count(),
            warnings: aggregation.warnings,
        }
    }
}

/// Acquires collections into route directories and keeps their specs built.
pub struct Materializer<'a> {
    home: &'a StepmanHome,
    vcs: &'a dyn SourceControl,
    aliases: &'a dyn AliasGenerator,
}

impl<'a> Materializer<'a> {
    pub fn new(
        home: &'a StepmanHome,
        vcs: &'a dyn SourceControl,
        aliases: &'a dyn AliasGenerator,
    ) -> Self {
        Materializer {
            home,
            vcs,
            aliases,
        }
    }

    /// Set up a collection.
    ///
    /// A no-op when the route exists and its directory is present. A route
    /// whose directory has vanished is dropped and set up again.
    pub fn setup(
        &self,
        registry: &mut RouteRegistry,
        request: SetupRequest<'_>,
    ) -> Result<SetupOutcome> {
        let collection = request.collection.trim();
        if collection.is_empty() {
            return Err(RegistryError::input("no step collection specified"));
        }

        if let Some(route) = registry.route_for(collection) {
            if route.collection_dir().is_dir() {
                debug!(collection = %collection, "nothing to set up, route is ready");
                return Ok(SetupOutcome {
                    route: route.clone(),
                    already_set_up: true,
                    step_count: 0,
                    version_count: 0,
                    warnings: Vec::new(),
                });
            }
            warn!(
                collection = %collection,
                path = ?route.collection_dir(),
                "route has no collection directory, setting it up again"
            );
            registry.forget(collection)?;
        }

        let alias = normalize(collection, self.aliases);
        let route = Route::new(self.home, collection, &alias, request.local);

        if route.base_path.exists() {
            warn!(path = ?route.base_path, "removing leftover directory without a route");
            fsutil::remove_dir_tolerant(&route.base_path)
                .map_err(|e| RegistryError::io(&route.base_path, e))?;
        }

        let aggregation = match self.acquire(&route).and_then(|()| rebuild_spec(&route)) {
            Ok(aggregation) => aggregation,
            Err(e) => {
                self.rollback(registry, &route);
                return Err(e);
            }
        };

        if let Err(e) = registry.add(route.clone()) {
            self.rollback(registry, &route);
            return Err(e);
        }
        info!(collection = %collection, alias = %alias, "collection set up");

        if let Some(export) = request.export_path {
            export_spec(&route, export)?;
        }

        Ok(SetupOutcome::from_aggregation(route, aggregation))
    }

    /// Refresh an existing collection and rebuild its spec.
    ///
    /// Remote routes pull; local routes copy their source again. A failure
    /// leaves the committed route and its previous spec in place.
    pub fn update(&self, registry: &RouteRegistry, collection: &str) -> Result<SetupOutcome> {
        let route = registry
            .route_for(collection)
            .cloned()
            .ok_or_else(|| RegistryError::RouteNotFound {
                collection: collection.to_string(),
            })?;

        if route.local {
            copy_local(&route)?;
        } else {
            self.vcs.pull(&route.collection_dir())?;
        }

        let aggregation = rebuild_spec(&route)?;
        info!(collection = %collection, "collection updated");
        Ok(SetupOutcome::from_aggregation(route, aggregation))
    }

    fn acquire(&self, route: &Route) -> Result<()> {
        if route.local {
            warn!(source = %route.steplib_uri, "using local step collection");
            copy_local(route)
        } else {
            info!(source = %route.steplib_uri, "cloning step collection");
            self.vcs
                .clone_repo(&route.steplib_uri, &route.collection_dir(), None)
        }
    }

    /// Undo a half-built route. Cleanup failures are logged; the caller
    /// surfaces the original error.
    fn rollback(&self, registry: &mut RouteRegistry, route: &Route) {
        warn!(collection = %route.steplib_uri, "setup failed, rolling back route");
        if let Err(e) = fsutil::remove_dir_tolerant(&route.base_path) {
            error!(path = ?route.base_path, "failed to remove route directory: {e}");
        }
        if let Err(e) = registry.forget(&route.steplib_uri) {
            error!(collection = %route.steplib_uri, "failed to drop route entry: {e}");
        }
    }
}

/// Rebuild and persist a route's aggregated spec from its collection tree.
pub fn rebuild_spec(route: &Route) -> Result<Aggregation> {
    let aggregation = aggregate(&route.layout(), &route.steplib_uri)?;
    aggregation.spec.write(&route.spec_path())?;
    Ok(aggregation)
}

/// Copy a local source into the route's collection directory.
///
/// The copy is staged next to the collection and swapped in whole, so
/// versions deleted from the source disappear and a failed copy leaves the
/// previous tree alone.
fn copy_local(route: &Route) -> Result<()> {
    let dest = route.collection_dir();
    let staging = fsutil::sibling(&dest, "staging");
    info!(path = ?dest, "copying local collection");

    std::fs::create_dir_all(&route.base_path)
        .map_err(|e| RegistryError::io(&route.base_path, e))?;
    fsutil::remove_dir_tolerant(&staging).map_err(|e| RegistryError::io(&staging, e))?;

    let copied = fsutil::copy_dir(Path::new(&route.steplib_uri), &staging, false)
        .and_then(|()| fsutil::replace_dir(&staging, &dest));
    if let Err(e) = copied {
        if let Err(cleanup) = fsutil::remove_dir_tolerant(&staging) {
            error!(path = ?staging, "failed to remove staging directory: {cleanup}");
        }
        return Err(RegistryError::collaborator("copy local collection", e.to_string()));
    }
    Ok(())
}

fn export_spec(route: &Route, to: &Path) -> Result<()> {
    let from: PathBuf = route.spec_path();
    info!(from = ?from, to = ?to, "exporting spec");
    fsutil::copy_file(&from, to).map_err(|source| RegistryError::Export {
        from,
        to: to.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedAlias, MemoryRouteStore, ScriptedVcs, SeededAlias};
    use stepman_spec::AggregatedSpec;

    const REMOTE: &str = "https://example.com/steplib.git";

    fn write_step(root: &Path, id: &str, version: &str) {
        let dir = root.join("steps").join(id).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("step.yml"),
            "summary: Step\nsource:\n  git: https://example.com/s.git\n  commit: abc\n",
        )
        .unwrap();
    }

    fn memory_registry() -> RouteRegistry {
        RouteRegistry::open(Box::new(MemoryRouteStore::new())).unwrap()
    }

    fn remote(collection: &str) -> SetupRequest<'_> {
        SetupRequest {
            collection,
            local: false,
            export_path: None,
        }
    }

    #[test]
    fn fresh_remote_setup() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        write_step(&origin, "script", "1.1.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();

        let outcome = Materializer::new(&home, &vcs, &aliases)
            .setup(&mut registry, remote(REMOTE))
            .unwrap();

        assert_eq!(vcs.count("clone"), 1);
        assert_eq!(registry.routes().len(), 1);
        assert!(!outcome.already_set_up);
        assert_eq!(outcome.version_count, 2);

        let spec = AggregatedSpec::load(&outcome.route.spec_path()).unwrap();
        assert_eq!(spec.version_count(), 2);
        assert_eq!(spec.steps["script"].latest_version_number, "1.1.0");
    }

    #[test]
    fn second_setup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        let first = materializer.setup(&mut registry, remote(REMOTE)).unwrap();
        let spec_before = std::fs::read_to_string(first.route.spec_path()).unwrap();
        let second = materializer.setup(&mut registry, remote(REMOTE)).unwrap();

        assert!(second.already_set_up);
        assert_eq!(second.route, first.route);
        assert_eq!(vcs.count("clone"), 1);
        assert_eq!(registry.routes().len(), 1);
        assert_eq!(
            std::fs::read_to_string(first.route.spec_path()).unwrap(),
            spec_before
        );
        let collections = std::fs::read_dir(dir.path().join("home/step_collections"))
            .unwrap()
            .count();
        assert_eq!(collections, 1);
    }

    #[test]
    fn failed_clone_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().failing("clone");
        let aliases = FixedAlias("x".to_string());
        let mut registry = memory_registry();

        let err = Materializer::new(&home, &vcs, &aliases)
            .setup(&mut registry, remote(REMOTE))
            .unwrap_err();

        assert!(matches!(err, RegistryError::Collaborator { .. }));
        assert!(!registry.exists(REMOTE));
        let base = home.route_base_dir(&normalize(REMOTE, &aliases));
        assert!(!base.exists());
    }

    #[test]
    fn invalid_descriptor_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "Bad_Id", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = FixedAlias("x".to_string());
        let mut registry = memory_registry();

        let err = Materializer::new(&home, &vcs, &aliases)
            .setup(&mut registry, remote(REMOTE))
            .unwrap_err();

        assert!(matches!(err, RegistryError::Spec(_)));
        assert!(!registry.exists(REMOTE));
        assert!(!home.route_base_dir(&normalize(REMOTE, &aliases)).exists());
    }

    #[test]
    fn failed_commit_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = FixedAlias("x".to_string());
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::failing())).unwrap();

        let err = Materializer::new(&home, &vcs, &aliases)
            .setup(&mut registry, remote(REMOTE))
            .unwrap_err();

        assert!(matches!(err, RegistryError::Persist { .. }));
        assert!(!home.route_base_dir(&normalize(REMOTE, &aliases)).exists());
    }

    #[test]
    fn local_setup_over_leftover_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local-steps");
        write_step(&source, "script", "1.0.0");
        let source_id = source.to_string_lossy().to_string();
        let home = StepmanHome::new(dir.path().join("home"));
        let aliases = FixedAlias("x".to_string());

        // Leftover from a failed run: directory present, no route.
        let leftover = home.route_base_dir(&normalize(&source_id, &aliases));
        std::fs::create_dir_all(leftover.join("collection/steps/stale/0.1.0")).unwrap();

        let vcs = ScriptedVcs::new();
        let mut registry = memory_registry();
        let outcome = Materializer::new(&home, &vcs, &aliases)
            .setup(
                &mut registry,
                SetupRequest {
                    collection: &source_id,
                    local: true,
                    export_path: None,
                },
            )
            .unwrap();

        assert!(!outcome.already_set_up);
        assert!(outcome.route.local);
        assert_eq!(outcome.step_count, 1);
        assert!(!leftover.join("collection/steps/stale").exists());
        assert_eq!(vcs.count("clone"), 0);
    }

    #[test]
    fn local_setup_with_missing_source_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing").to_string_lossy().to_string();
        let home = StepmanHome::new(dir.path().join("home"));
        let aliases = FixedAlias("x".to_string());
        let vcs = ScriptedVcs::new();
        let mut registry = memory_registry();

        let result = Materializer::new(&home, &vcs, &aliases).setup(
            &mut registry,
            SetupRequest {
                collection: &missing,
                local: true,
                export_path: None,
            },
        );

        assert!(result.is_err());
        assert!(!registry.exists(&missing));
        assert!(!home.route_base_dir(&normalize(&missing, &aliases)).exists());
    }

    #[test]
    fn dangling_route_is_set_up_again() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        let first = materializer.setup(&mut registry, remote(REMOTE)).unwrap();
        std::fs::remove_dir_all(&first.route.base_path).unwrap();

        let second = materializer.setup(&mut registry, remote(REMOTE)).unwrap();
        assert!(!second.already_set_up);
        assert_ne!(second.route.folder_alias, first.route.folder_alias);
        assert_eq!(registry.routes().len(), 1);
        assert_eq!(vcs.count("clone"), 2);
    }

    #[test]
    fn export_copies_spec() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let export = dir.path().join("out/spec.json");

        Materializer::new(&home, &vcs, &aliases)
            .setup(
                &mut registry,
                SetupRequest {
                    collection: REMOTE,
                    local: false,
                    export_path: Some(&export),
                },
            )
            .unwrap();

        assert_eq!(AggregatedSpec::load(&export).unwrap().version_count(), 1);
    }

    #[test]
    fn failed_export_keeps_route() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();

        // A file where the export's parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let export = blocker.join("spec.json");

        let err = Materializer::new(&home, &vcs, &aliases)
            .setup(
                &mut registry,
                SetupRequest {
                    collection: REMOTE,
                    local: false,
                    export_path: Some(&export),
                },
            )
            .unwrap_err();

        assert!(matches!(err, RegistryError::Export { .. }));
        let route = registry.route_for(REMOTE).unwrap();
        assert!(route.spec_path().is_file());
    }

    #[test]
    fn empty_identifier_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path());
        let vcs = ScriptedVcs::new();
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();

        let err = Materializer::new(&home, &vcs, &aliases)
            .setup(&mut registry, remote("  "))
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput { .. }));
        assert!(vcs.calls().is_empty());
    }

    #[test]
    fn update_local_picks_up_new_steps() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local-steps");
        write_step(&source, "script", "1.0.0");
        let source_id = source.to_string_lossy().to_string();
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new();
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        materializer
            .setup(
                &mut registry,
                SetupRequest {
                    collection: &source_id,
                    local: true,
                    export_path: None,
                },
            )
            .unwrap();
        write_step(&source, "script", "2.0.0");

        let outcome = materializer.update(&registry, &source_id).unwrap();
        assert_eq!(outcome.version_count, 2);
        let spec = AggregatedSpec::load(&outcome.route.spec_path()).unwrap();
        assert_eq!(spec.steps["script"].latest_version_number, "2.0.0");
    }

    #[test]
    fn update_local_drops_removed_versions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local-steps");
        write_step(&source, "script", "1.0.0");
        write_step(&source, "script", "2.0.0");
        let source_id = source.to_string_lossy().to_string();
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new();
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        let setup = materializer
            .setup(
                &mut registry,
                SetupRequest {
                    collection: &source_id,
                    local: true,
                    export_path: None,
                },
            )
            .unwrap();
        assert_eq!(setup.version_count, 2);

        std::fs::remove_dir_all(source.join("steps/script/2.0.0")).unwrap();
        let outcome = materializer.update(&registry, &source_id).unwrap();

        assert_eq!(outcome.version_count, 1);
        let spec = AggregatedSpec::load(&outcome.route.spec_path()).unwrap();
        assert_eq!(spec.steps["script"].latest_version_number, "1.0.0");
        assert!(!outcome.route.collection_dir().join("steps/script/2.0.0").exists());
    }

    #[test]
    fn failed_local_update_keeps_previous_tree() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("local-steps");
        write_step(&source, "script", "1.0.0");
        let source_id = source.to_string_lossy().to_string();
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new();
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        let setup = materializer
            .setup(
                &mut registry,
                SetupRequest {
                    collection: &source_id,
                    local: true,
                    export_path: None,
                },
            )
            .unwrap();
        std::fs::remove_dir_all(&source).unwrap();

        assert!(materializer.update(&registry, &source_id).is_err());
        let route = setup.route;
        assert!(route.collection_dir().join("steps/script/1.0.0/step.yml").is_file());
        assert_eq!(AggregatedSpec::load(&route.spec_path()).unwrap().version_count(), 1);
        assert!(!fsutil::sibling(&route.collection_dir(), "staging").exists());
    }

    #[test]
    fn update_remote_pulls() {
        let dir = tempfile::tempdir().unwrap();
        let origin = dir.path().join("origin");
        write_step(&origin, "script", "1.0.0");
        let home = StepmanHome::new(dir.path().join("home"));
        let vcs = ScriptedVcs::new().with_source(REMOTE, &origin);
        let aliases = SeededAlias::new("t");
        let mut registry = memory_registry();
        let materializer = Materializer::new(&home, &vcs, &aliases);

        materializer.setup(&mut registry, remote(REMOTE)).unwrap();
        materializer.update(&registry, REMOTE).unwrap();
        assert_eq!(vcs.count("pull"), 1);
    }

    #[test]
    fn update_unknown_collection() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path());
        let vcs = ScriptedVcs::new();
        let aliases = SeededAlias::new("t");
        let registry = memory_registry();

        assert!(matches!(
            Materializer::new(&home, &vcs, &aliases).update(&registry, REMOTE),
            Err(RegistryError::RouteNotFound { .. })
        ));
    }
}
