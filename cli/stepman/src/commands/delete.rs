//! `stepman delete`: remove a collection's route and local copy.

use anyhow::{Context, Result};
use stepman_registry::StepmanHome;

use super::{open_registry, resolve_collection};

/// Run `stepman delete --collection <id>`.
pub fn run(home: &StepmanHome, collection: &str) -> Result<()> {
    let mut registry = open_registry(home)?;
    let collection = resolve_collection(&registry, collection)?;
    let route = registry
        .remove(&collection)
        .with_context(|| format!("deleting {collection}"))?;
    println!("Deleted {collection}");
    println!("  removed: {}", route.base_path.display());
    Ok(())
}
