//! Collection manifest (`steplib.yml`).

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};
use crate::layout::CollectionLayout;

/// Format version written into aggregated specs.
pub const SPEC_FORMAT_VERSION: &str = "1.0.0";

/// Collection-level metadata found at the root of a collection tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionManifest {
    #[serde(default = "default_format_version")]
    pub format_version: String,
    /// Canonical source of the collection.
    #[serde(default)]
    pub steplib_source: String,
}

fn default_format_version() -> String {
    SPEC_FORMAT_VERSION.to_string()
}

impl CollectionManifest {
    /// Manifest used when a collection ships none.
    pub fn implicit(collection_id: &str) -> Self {
        CollectionManifest {
            format_version: default_format_version(),
            steplib_source: collection_id.to_string(),
        }
    }

    /// Load the manifest of a collection tree, falling back to
    /// [`CollectionManifest::implicit`] when the file is absent.
    pub fn load(layout: &CollectionLayout, collection_id: &str) -> Result<Self> {
        let path = layout.manifest_path();
        if !path.is_file() {
            tracing::debug!(?path, "no collection manifest, using defaults");
            return Ok(CollectionManifest::implicit(collection_id));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| SpecError::io(&path, e))?;
        let mut manifest: CollectionManifest =
            serde_yaml_ng::from_str(&content).map_err(|e| SpecError::Parse {
                path: path.clone(),
                detail: e.to_string(),
            })?;
        if manifest.steplib_source.is_empty() {
            manifest.steplib_source = collection_id.to_string();
        }
        Ok(manifest)
    }
}
