//! `config.toml` user configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stepman_registry::GitCli;

/// The top-level configuration of a stepman home. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepmanConfig {
    #[serde(default)]
    pub git: GitConfig,
    #[serde(default)]
    pub setup: SetupConfig,
}

/// Version control settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Git binary.
    #[serde(default = "default_program")]
    pub program: String,
    /// Remote that `share finish` pushes to.
    #[serde(default = "default_remote")]
    pub remote: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig {
            program: default_program(),
            remote: default_remote(),
        }
    }
}

fn default_program() -> String {
    "git".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

/// Defaults for `stepman setup`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    /// Treat collections as local directories unless told otherwise.
    #[serde(default)]
    pub local: bool,
}

impl StepmanConfig {
    /// Load the configuration at `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(StepmanConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Parse a configuration from a TOML string.
    #[cfg(test)]
    pub fn from_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing config.toml")
    }

    /// The git collaborator described by this configuration.
    pub fn git_cli(&self) -> GitCli {
        GitCli::new(&self.git.program, &self.git.remote)
    }
}
