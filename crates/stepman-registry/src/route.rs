//! Route registry: collection identifier to local materialized location.
//!
//! The `RouteStore` trait abstracts over where the registry is persisted.
//! `FileRouteStore` keeps it in `routing.json` with atomic replacement.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stepman_spec::{write_atomic, CollectionLayout};
use tracing::{debug, info};

use crate::error::{RegistryError, Result};
use crate::fsutil;
use crate::home::{self, StepmanHome};

/// A committed binding of a collection identifier to its local directory.
///
/// Routes are never edited in place; a changed route is removed and added
/// again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Collection identifier (URI or local path).
    pub steplib_uri: String,
    /// Filesystem-safe alias naming the base directory.
    pub folder_alias: String,
    /// Base directory derived from the alias.
    pub base_path: PathBuf,
    /// Whether the collection was copied from a local directory.
    #[serde(default)]
    pub local: bool,
}

impl Route {
    /// Build a route whose base directory lives under `home`.
    pub fn new(home: &StepmanHome, steplib_uri: &str, folder_alias: &str, local: bool) -> Self {
        Route {
            steplib_uri: steplib_uri.to_string(),
            folder_alias: folder_alias.to_string(),
            base_path: home.route_base_dir(folder_alias),
            local,
        }
    }

    /// Materialized collection tree.
    pub fn collection_dir(&self) -> PathBuf {
        home::collection_dir(&self.base_path)
    }

    /// Aggregated spec file.
    pub fn spec_path(&self) -> PathBuf {
        home::spec_path(&self.base_path)
    }

    /// Schema of the materialized tree.
    pub fn layout(&self) -> CollectionLayout {
        CollectionLayout::new(self.collection_dir())
    }
}

/// Persistence backend for the route list.
pub trait RouteStore {
    /// Load all routes. An empty store yields an empty list.
    fn load(&self) -> Result<Vec<Route>>;

    /// Replace the persisted route list. Must be all-or-nothing.
    fn save(&self, routes: &[Route]) -> Result<()>;
}

/// JSON file store (`routing.json`).
#[derive(Debug, Clone)]
pub struct FileRouteStore {
    path: PathBuf,
}

impl FileRouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRouteStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteStore for FileRouteStore {
    fn load(&self) -> Result<Vec<Route>> {
        if !self.path.is_file() {
            debug!(path = ?self.path, "routing file not found, starting empty");
            return Ok(Vec::new());
        }
        let data =
            std::fs::read_to_string(&self.path).map_err(|e| RegistryError::io(&self.path, e))?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, routes: &[Route]) -> Result<()> {
        let json = serde_json::to_string_pretty(routes)?;
        write_atomic(&self.path, json.as_bytes()).map_err(|e| RegistryError::Persist {
            path: self.path.clone(),
            detail: e.to_string(),
        })
    }
}

/// The registry of all routes, backed by a [`RouteStore`].
pub struct RouteRegistry {
    store: Box<dyn RouteStore>,
    routes: Vec<Route>,
}

impl RouteRegistry {
    /// Open a registry, loading its current routes.
    pub fn open(store: Box<dyn RouteStore>) -> Result<Self> {
        let routes = store.load()?;
        Ok(RouteRegistry { store, routes })
    }

    /// Open the file-backed registry of a stepman home.
    pub fn open_home(home: &StepmanHome) -> Result<Self> {
        RouteRegistry::open(Box::new(FileRouteStore::new(home.routing_path())))
    }

    /// All routes in insertion order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up the route of a collection.
    pub fn route_for(&self, collection: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.steplib_uri == collection)
    }

    /// Whether a route is registered for the collection.
    pub fn exists(&self, collection: &str) -> bool {
        self.route_for(collection).is_some()
    }

    /// Register a route, replacing any previous route for the same
    /// collection. Nothing changes if persisting fails.
    pub fn add(&mut self, route: Route) -> Result<()> {
        if let Some(owner) = self
            .routes
            .iter()
            .find(|r| r.folder_alias == route.folder_alias && r.steplib_uri != route.steplib_uri)
        {
            return Err(RegistryError::AliasTaken {
                alias: route.folder_alias.clone(),
                collection: owner.steplib_uri.clone(),
            });
        }

        let mut next: Vec<Route> = self
            .routes
            .iter()
            .filter(|r| r.steplib_uri != route.steplib_uri)
            .cloned()
            .collect();
        next.push(route);

        self.store.save(&next)?;
        self.routes = next;
        Ok(())
    }

    /// Remove a route and its base directory.
    ///
    /// The directory goes first: if that fails the route stays registered
    /// and the removal can be retried. A partially or fully missing
    /// directory is fine.
    pub fn remove(&mut self, collection: &str) -> Result<Route> {
        let route = self
            .route_for(collection)
            .cloned()
            .ok_or_else(|| RegistryError::RouteNotFound {
                collection: collection.to_string(),
            })?;

        fsutil::remove_dir_tolerant(&route.base_path)
            .map_err(|e| RegistryError::io(&route.base_path, e))?;
        self.forget(collection)?;

        info!(collection = %collection, alias = %route.folder_alias, "removed route");
        Ok(route)
    }

    /// Drop the registry entry only, leaving the filesystem alone.
    ///
    /// Returns whether an entry existed.
    pub fn forget(&mut self, collection: &str) -> Result<bool> {
        if !self.exists(collection) {
            return Ok(false);
        }
        let next: Vec<Route> = self
            .routes
            .iter()
            .filter(|r| r.steplib_uri != collection)
            .cloned()
            .collect();
        self.store.save(&next)?;
        self.routes = next;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryRouteStore;

    fn route(home: &StepmanHome, uri: &str, alias: &str) -> Route {
        Route::new(home, uri, alias, false)
    }

    #[test]
    fn add_and_lookup() {
        let home = StepmanHome::new("/h");
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::new())).unwrap();

        assert!(!registry.exists("https://example.com/a.git"));
        registry.add(route(&home, "https://example.com/a.git", "a1")).unwrap();

        let found = registry.route_for("https://example.com/a.git").unwrap();
        assert_eq!(found.folder_alias, "a1");
        assert_eq!(found.base_path, PathBuf::from("/h/step_collections/a1"));
    }

    #[test]
    fn add_replaces_same_collection() {
        let home = StepmanHome::new("/h");
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::new())).unwrap();
        registry.add(route(&home, "lib", "a1")).unwrap();
        registry.add(route(&home, "lib", "a2")).unwrap();

        assert_eq!(registry.routes().len(), 1);
        assert_eq!(registry.route_for("lib").unwrap().folder_alias, "a2");
    }

    #[test]
    fn alias_must_be_unique() {
        let home = StepmanHome::new("/h");
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::new())).unwrap();
        registry.add(route(&home, "one", "same")).unwrap();

        let err = registry.add(route(&home, "two", "same")).unwrap_err();
        assert!(matches!(err, RegistryError::AliasTaken { .. }));
        assert!(!registry.exists("two"));
    }

    #[test]
    fn failed_save_leaves_registry_unchanged() {
        let home = StepmanHome::new("/h");
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::failing())).unwrap();
        assert!(registry.add(route(&home, "lib", "a1")).is_err());
        assert!(!registry.exists("lib"));
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path());
        {
            let mut registry = RouteRegistry::open_home(&home).unwrap();
            registry.add(route(&home, "https://example.com/a.git", "a1")).unwrap();
            registry.add(route(&home, "/local/steps", "b1")).unwrap();
        }

        let reopened = RouteRegistry::open_home(&home).unwrap();
        let uris: Vec<&str> = reopened.routes().iter().map(|r| r.steplib_uri.as_str()).collect();
        assert_eq!(uris, vec!["https://example.com/a.git", "/local/steps"]);
        assert!(!dir.path().join(".routing.json.tmp").exists());
    }

    #[test]
    fn remove_deletes_entry_and_directory() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path());
        let mut registry = RouteRegistry::open_home(&home).unwrap();
        let r = route(&home, "lib", "a1");
        std::fs::create_dir_all(r.collection_dir().join("steps")).unwrap();
        registry.add(r.clone()).unwrap();

        registry.remove("lib").unwrap();
        assert!(!registry.exists("lib"));
        assert!(!r.base_path.exists());
        assert!(RouteRegistry::open_home(&home).unwrap().routes().is_empty());
    }

    #[test]
    fn remove_tolerates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let home = StepmanHome::new(dir.path());
        let mut registry = RouteRegistry::open_home(&home).unwrap();
        registry.add(route(&home, "lib", "gone")).unwrap();

        registry.remove("lib").unwrap();
        assert!(!registry.exists("lib"));
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut registry = RouteRegistry::open(Box::new(MemoryRouteStore::new())).unwrap();
        assert!(matches!(
            registry.remove("nope"),
            Err(RegistryError::RouteNotFound { .. })
        ));
        assert!(!registry.forget("nope").unwrap());
    }
}
