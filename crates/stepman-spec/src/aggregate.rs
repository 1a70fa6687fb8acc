//! Spec aggregation.
//!
//! Walks a materialized collection, validates every descriptor and merges
//! them into one [`AggregatedSpec`] keyed by step id then version. The
//! aggregate is a derived artifact: it is always rebuilt from scratch and is
//! never patched in place.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::atomic::write_atomic;
use crate::collection::CollectionManifest;
use crate::descriptor::StepDescriptor;
use crate::error::{Result, SpecError};
use crate::layout::CollectionLayout;
use crate::validate::validate;
use crate::version;

/// The aggregated specification of one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSpec {
    pub format_version: String,
    /// Unix timestamp of the rebuild that produced this document.
    pub generated_at_timestamp: i64,
    pub steplib_source: String,
    #[serde(default)]
    pub steps: BTreeMap<String, StepGroup>,
}

/// All versions of one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepGroup {
    pub latest_version_number: String,
    #[serde(default)]
    pub versions: BTreeMap<String, StepDescriptor>,
}

/// Result of a rebuild: the spec plus every soft warning raised on the way.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub spec: AggregatedSpec,
    pub warnings: Vec<String>,
}

impl AggregatedSpec {
    /// Create an empty spec for a collection.
    pub fn new(manifest: &CollectionManifest) -> Self {
        AggregatedSpec {
            format_version: manifest.format_version.clone(),
            generated_at_timestamp: chrono::Utc::now().timestamp(),
            steplib_source: manifest.steplib_source.clone(),
            steps: BTreeMap::new(),
        }
    }

    /// Add a descriptor. A second descriptor for the same (id, version) is
    /// rejected rather than merged.
    pub fn insert(&mut self, step: StepDescriptor) -> Result<()> {
        let group = self.steps.entry(step.id.clone()).or_default();
        if group.versions.contains_key(&step.version) {
            return Err(SpecError::DuplicateStep {
                id: step.id,
                version: step.version,
            });
        }
        group.versions.insert(step.version.clone(), step);
        group.latest_version_number = version::latest(group.versions.keys().map(String::as_str))
            .unwrap_or_default()
            .to_string();
        Ok(())
    }

    /// Look up a step version; `None` means the latest one.
    pub fn resolve(&self, id: &str, version: Option<&str>) -> Result<&StepDescriptor> {
        let group = self.steps.get(id).ok_or_else(|| SpecError::StepNotFound {
            id: id.to_string(),
        })?;
        let wanted = version.unwrap_or(group.latest_version_number.as_str());
        group
            .versions
            .get(wanted)
            .ok_or_else(|| SpecError::VersionNotFound {
                id: id.to_string(),
                version: wanted.to_string(),
            })
    }

    /// Number of distinct step ids.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Number of (id, version) pairs.
    pub fn version_count(&self) -> usize {
        self.steps.values().map(|g| g.versions.len()).sum()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a spec document, restoring each descriptor's id and version
    /// from its keys.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut spec: AggregatedSpec = serde_json::from_str(json)?;
        for (id, group) in spec.steps.iter_mut() {
            for (version, step) in group.versions.iter_mut() {
                step.id = id.clone();
                step.version = version.clone();
            }
        }
        Ok(spec)
    }

    /// Load a persisted spec.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::io(path, e))?;
        AggregatedSpec::from_json(&content)
    }

    /// Persist atomically, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes()).map_err(|e| SpecError::io(path, e))?;
        debug!(?path, steps = self.step_count(), "wrote aggregated spec");
        Ok(())
    }
}

/// Rebuild the aggregated spec of a collection tree.
///
/// Fails on the first descriptor with a hard validation error; nothing is
/// written by this function.
pub fn aggregate(layout: &CollectionLayout, collection_id: &str) -> Result<Aggregation> {
    let manifest = CollectionManifest::load(layout, collection_id)?;
    let mut spec = AggregatedSpec::new(&manifest);
    let mut warnings = Vec::new();

    for location in layout.discover()? {
        let step =
            StepDescriptor::read(&location.descriptor_path, &location.id, &location.version)?;

        let report = validate(&step);
        for warning in &report.warnings {
            warn!(step = %step, "{warning}");
            warnings.push(format!("{step}: {warning}"));
        }
        if !report.is_valid() {
            return Err(SpecError::InvalidStep {
                id: step.id,
                version: step.version,
                errors: report.errors,
            });
        }

        spec.insert(step)?;
    }

    info!(
        collection = %collection_id,
        steps = spec.step_count(),
        versions = spec.version_count(),
        "aggregated collection spec"
    );
    Ok(Aggregation { spec, warnings })
}
