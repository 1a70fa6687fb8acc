//! `stepman setup`: materialize a collection and build its spec.

use std::path::Path;

use anyhow::{Context, Result};
use stepman_registry::{AliasGenerator, Materializer, SetupRequest, SourceControl, StepmanHome};

use super::{local_collection_id, open_registry};

/// Run `stepman setup --collection <id> [--local] [--copy-spec-json <path>]`.
pub fn run(
    home: &StepmanHome,
    vcs: &dyn SourceControl,
    aliases: &dyn AliasGenerator,
    collection: &str,
    local: bool,
    export_path: Option<&Path>,
) -> Result<()> {
    let collection = if local {
        local_collection_id(collection)?
    } else {
        collection.to_string()
    };

    let mut registry = open_registry(home)?;
    let outcome = Materializer::new(home, vcs, aliases)
        .setup(
            &mut registry,
            SetupRequest {
                collection: &collection,
                local,
                export_path,
            },
        )
        .with_context(|| format!("setting up {collection}"))?;

    if outcome.already_set_up {
        println!("Collection already set up: {collection}");
        return Ok(());
    }

    for warning in &outcome.warnings {
        println!("  warning: {warning}");
    }
    println!(
        "Set up {collection}: {} steps, {} versions",
        outcome.step_count, outcome.version_count
    );
    println!("  spec: {}", outcome.route.spec_path().display());
    if let Some(export) = export_path {
        println!("  copied to: {}", export.display());
    }
    Ok(())
}
