//! `stepman update`: refresh a collection and rebuild its spec.

use anyhow::{Context, Result};
use stepman_registry::{Materializer, RandomAlias, SourceControl, StepmanHome};

use super::{open_registry, resolve_collection};

/// Run `stepman update --collection <id>`.
pub fn run(home: &StepmanHome, vcs: &dyn SourceControl, collection: &str) -> Result<()> {
    let registry = open_registry(home)?;
    let collection = resolve_collection(&registry, collection)?;
    let outcome = Materializer::new(home, vcs, &RandomAlias)
        .update(&registry, &collection)
        .with_context(|| format!("updating {collection}"))?;

    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    println!(
        "Updated {collection}: {} steps, {} versions",
        outcome.step_count, outcome.version_count
    );
    Ok(())
}
