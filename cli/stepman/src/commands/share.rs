//! `stepman share`: contribute a step version to a collection.

use anyhow::{Context, Result};
use dialoguer::Confirm;
use stepman_registry::{
    CreateRequest, FinishOutcome, Prompt, RegistryError, RouteRegistry, ShareStore,
    ShareWorkflow, SourceControl, StepmanHome,
};

use super::{open_registry, resolve_collection};

/// Interactive yes/no prompt on the terminal. Defaults to "no".
pub struct DialoguerPrompt;

impl Prompt for DialoguerPrompt {
    fn confirm(&self, question: &str) -> stepman_registry::Result<bool> {
        Confirm::new()
            .with_prompt(question)
            .default(false)
            .interact()
            .map_err(|e| RegistryError::collaborator("prompt", e.to_string()))
    }
}

const GUIDE: &str = "\
Sharing a step takes three commands:

  1. stepman share start --collection <collection>
       Opens a share session for a collection you have set up.

  2. stepman share create --tag <version> --git <step-repo> [--stepid <id>]
       Fetches the step at <version>, stamps its source and writes
       steps/<id>/<version>/step.yml on a branch named <id>.

  3. stepman share finish
       Commits the new step.yml and pushes the branch. Open a pull
       request from it against the collection.
";

/// Run `stepman share` with no subcommand.
pub fn guide() {
    print!("{GUIDE}");
}

fn workflow<'a>(
    home: &StepmanHome,
    registry: &'a RouteRegistry,
    vcs: &'a dyn SourceControl,
    prompt: &'a dyn Prompt,
) -> ShareWorkflow<'a> {
    ShareWorkflow::new(registry, ShareStore::for_home(home), vcs, prompt)
}

/// Run `stepman share start --collection <id>`.
pub fn start(home: &StepmanHome, vcs: &dyn SourceControl, collection: &str) -> Result<()> {
    let registry = open_registry(home)?;
    let collection = resolve_collection(&registry, collection)?;
    let session = workflow(home, &registry, vcs, &DialoguerPrompt)
        .start(&collection)
        .context("starting share")?;
    println!("Share started for {}", session.collection);
    println!("Next: stepman share create --tag <version> --git <step-repo>");
    Ok(())
}

/// Run `stepman share create --tag <tag> --git <uri> [--stepid <id>]`.
pub fn create(
    home: &StepmanHome,
    vcs: &dyn SourceControl,
    prompt: &dyn Prompt,
    tag: &str,
    git: &str,
    step_id: Option<&str>,
) -> Result<()> {
    let registry = open_registry(home)?;
    let created = workflow(home, &registry, vcs, prompt)
        .create(CreateRequest { tag, git, step_id })
        .context("creating shared step")?;

    for warning in &created.warnings {
        println!("  warning: {warning}");
    }
    println!("Created {}", created.step);
    println!("  descriptor: {}", created.descriptor_path.display());
    println!("Next: stepman share finish");
    Ok(())
}

/// Run `stepman share finish`.
pub fn finish(home: &StepmanHome, vcs: &dyn SourceControl) -> Result<()> {
    let registry = open_registry(home)?;
    let outcome = workflow(home, &registry, vcs, &DialoguerPrompt)
        .finish()
        .context("finishing share")?;

    match outcome {
        FinishOutcome::NoChanges => println!("No changes to share."),
        FinishOutcome::Pushed { branch } => {
            println!("Pushed branch '{branch}'.");
            println!("Open a pull request from it against the collection.");
        }
    }
    Ok(())
}
