//! CLI command implementations.

pub mod collections;
pub mod delete;
pub mod setup;
pub mod share;
pub mod step;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stepman_registry::{Route, RouteRegistry, StepmanHome};

/// Open the route registry of `home`.
pub fn open_registry(home: &StepmanHome) -> Result<RouteRegistry> {
    RouteRegistry::open_home(home)
        .with_context(|| format!("reading {}", home.routing_path().display()))
}

/// Look up the route of `collection`, failing with a hint when it is missing.
pub fn require_route(registry: &RouteRegistry, collection: &str) -> Result<Route> {
    registry
        .route_for(collection)
        .cloned()
        .with_context(|| format!("no route for '{collection}' (run `stepman setup` first)"))
}

/// A local collection is identified by its absolute directory path.
/// A `file://` prefix is accepted.
pub fn local_collection_id(raw: &str) -> Result<String> {
    let path = PathBuf::from(raw.strip_prefix("file://").unwrap_or(raw));
    let absolute = std::fs::canonicalize(&path)
        .with_context(|| format!("local collection {} not found", path.display()))?;
    Ok(absolute.to_string_lossy().to_string())
}

/// The route identifier a user typed for an existing collection.
///
/// An exact route match wins. Otherwise a `file://` URI or an existing
/// directory resolves to the canonical path that `setup --local` registered.
pub fn resolve_collection(registry: &RouteRegistry, raw: &str) -> Result<String> {
    if registry.route_for(raw).is_some() {
        return Ok(raw.to_string());
    }
    if raw.starts_with("file://") || Path::new(raw).is_dir() {
        return local_collection_id(raw);
    }
    Ok(raw.to_string())
}
