//! `stepman step-info` and `stepman step-list`: query a collection's spec.

use anyhow::{Context, Result};
use stepman_registry::StepmanHome;
use stepman_spec::AggregatedSpec;

use super::{open_registry, require_route, resolve_collection};

fn load_spec(home: &StepmanHome, collection: &str) -> Result<AggregatedSpec> {
    let registry = open_registry(home)?;
    let collection = resolve_collection(&registry, collection)?;
    let route = require_route(&registry, &collection)?;
    let path = route.spec_path();
    AggregatedSpec::load(&path).with_context(|| format!("reading {}", path.display()))
}

/// Run `stepman step-info --collection <id> --id <step> [--version <tag>]`.
///
/// Without a version the latest one is shown.
pub fn info(
    home: &StepmanHome,
    collection: &str,
    id: &str,
    version: Option<&str>,
    json: bool,
) -> Result<()> {
    let spec = load_spec(home, collection)?;
    let step = spec.resolve(id, version)?;

    if json {
        println!("{}", serde_json::to_string_pretty(step)?);
    } else {
        println!("# {step}");
        print!("{}", step.to_yaml()?);
    }
    Ok(())
}

/// Run `stepman step-list --collection <id>`.
pub fn list(home: &StepmanHome, collection: &str) -> Result<()> {
    let spec = load_spec(home, collection)?;
    if spec.steps.is_empty() {
        println!("No steps in {collection}.");
        return Ok(());
    }
    println!(
        "{} steps, {} versions in {collection}:",
        spec.step_count(),
        spec.version_count()
    );
    for (id, group) in &spec.steps {
        println!("  {id} ({})", group.latest_version_number);
    }
    Ok(())
}
