//! The stepman home directory.
//!
//! Layout:
//! ```text
//! <home>/
//!   routing.json  Route registry
//!   share.json  Active share session
//!   config.toml  User configuration
//!   step_collections/
//!     <alias>/
//!       collection/  Materialized collection tree
//!       spec/spec.json  Aggregated spec
//! ```

use std::path::{Path, PathBuf};

const ROUTING_FILE: &str = "routing.json";
const SHARE_FILE: &str = "share.json";
const CONFIG_FILE: &str = "config.toml";
const COLLECTIONS_DIR: &str = "step_collections";
const COLLECTION_SUBDIR: &str = "collection";
const SPEC_SUBDIR: &str = "spec";
const SPEC_FILE: &str = "spec.json";

/// Paths under a stepman home directory.
#[derive(Debug, Clone)]
pub struct StepmanHome {
    root: PathBuf,
}

impl StepmanHome {
    /// Create a home rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StepmanHome { root: root.into() }
    }

    /// The default location (`~/.stepman`).
    pub fn default_location() -> Option<Self> {
        dirs_or_home().map(|home| StepmanHome::new(home.join(".stepman")))
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn routing_path(&self) -> PathBuf {
        self.root.join(ROUTING_FILE)
    }

    pub fn share_path(&self) -> PathBuf {
        self.root.join(SHARE_FILE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    /// Base directory owned by one route.
    pub fn route_base_dir(&self, alias: &str) -> PathBuf {
        self.root.join(COLLECTIONS_DIR).join(alias)
    }
}

/// Materialized tree under a route base directory.
pub fn collection_dir(base: &Path) -> PathBuf {
    base.join(COLLECTION_SUBDIR)
}

/// Aggregated spec under a route base directory.
pub fn spec_path(base: &Path) -> PathBuf {
    base.join(SPEC_SUBDIR).join(SPEC_FILE)
}

/// Get the user's home directory.
fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
