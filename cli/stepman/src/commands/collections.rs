//! `stepman collections`: list registered routes.

use anyhow::Result;
use stepman_registry::StepmanHome;

use super::open_registry;

/// Run `stepman collections [--format json]`.
pub fn run(home: &StepmanHome, json: bool) -> Result<()> {
    let registry = open_registry(home)?;
    let routes = registry.routes();

    if json {
        println!("{}", serde_json::to_string_pretty(routes)?);
        return Ok(());
    }

    if routes.is_empty() {
        println!("No collections set up.");
        return Ok(());
    }
    for route in routes {
        let mode = if route.local { " (local)" } else { "" };
        println!("{}{mode}", route.steplib_uri);
        println!("  alias: {}", route.folder_alias);
        println!("  path:  {}", route.collection_dir().display());
        println!("  spec:  {}", route.spec_path().display());
    }
    Ok(())
}
