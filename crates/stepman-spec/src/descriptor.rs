//! Step descriptor model (`step.yml`).
//!
//! A descriptor is one versioned step definition. Its identifier and version
//! come from its position in the collection tree, not from the file, so both
//! are skipped during (de)serialization and filled in by the reader.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SpecError};

/// Key under which an input/output entry stores its options.
const OPTS_KEY: &str = "opts";

/// One versioned step definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    /// Step identifier (directory name under `steps/`).
    #[serde(skip)]
    pub id: String,
    /// Version tag (directory name under `steps/<id>/`).
    #[serde(skip)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Single-line summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_url: Option<String>,
    /// Where this version was published from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<StepSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host_os_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub project_type_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_requires_admin_user: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_always_run: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_skippable: Option<bool>,
    /// Ordered input contract.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<EnvEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<EnvEntry>,
}

/// Source reference: origin URI plus the commit the version was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSource {
    #[serde(default)]
    pub git: String,
    #[serde(default)]
    pub commit: String,
}

/// Options attached to an input or output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enumerated value set; when non-empty the default must be too.
    #[serde(
        default,
        deserialize_with = "scalar_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub value_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expand: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_dont_change_value: Option<bool>,
}

impl EnvOptions {
    fn is_empty(&self) -> bool {
        *self == EnvOptions::default()
    }
}

/// An input or output entry: a single `{key: default}` pair plus `opts`.
///
/// Entries with zero or several keys are kept as parsed so the validator can
/// report them; [`EnvEntry::key_value`] only answers for well-formed ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvEntry {
    values: BTreeMap<String, String>,
    pub opts: EnvOptions,
}

impl EnvEntry {
    /// Create a well-formed entry.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert(key.into(), value.into());
        EnvEntry {
            values,
            opts: EnvOptions::default(),
        }
    }

    /// Attach an enumerated value set.
    pub fn with_value_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.value_options = options.into_iter().map(Into::into).collect();
        self
    }

    /// The `(key, default)` pair, or `None` unless exactly one key is set.
    pub fn key_value(&self) -> Option<(&str, &str)> {
        if self.values.len() != 1 {
            return None;
        }
        self.values
            .iter()
            .next()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of keys besides `opts`.
    pub fn key_count(&self) -> usize {
        self.values.len()
    }
}

impl Serialize for EnvEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let with_opts = !self.opts.is_empty();
        let len = self.values.len() + usize::from(with_opts);
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.values {
            map.serialize_entry(key, value)?;
        }
        if with_opts {
            map.serialize_entry(OPTS_KEY, &self.opts)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for EnvEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut raw = BTreeMap::<String, serde_json::Value>::deserialize(deserializer)?;

        let opts = match raw.remove(OPTS_KEY) {
            Some(serde_json::Value::Null) | None => EnvOptions::default(),
            Some(v) => serde_json::from_value(v).map_err(de::Error::custom)?,
        };

        let mut values = BTreeMap::new();
        for (key, value) in raw {
            let text = scalar_text(&value).ok_or_else(|| {
                de::Error::custom(format!("value of '{key}' must be a scalar"))
            })?;
            values.insert(key, text);
        }

        Ok(EnvEntry { values, opts })
    }
}

/// Textual form of a scalar; `null` is the empty string.
fn scalar_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => Some(String::new()),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.iter()
        .map(|v| scalar_text(v).ok_or_else(|| de::Error::custom("value_options must be scalars")))
        .collect()
}

impl StepDescriptor {
    /// Parse a descriptor from YAML, stamping it with its tree position.
    pub fn from_yaml(
        id: &str,
        version: &str,
        yaml: &str,
    ) -> std::result::Result<Self, serde_yaml_ng::Error> {
        let mut step: StepDescriptor = serde_yaml_ng::from_str(yaml)?;
        step.id = id.to_string();
        step.version = version.to_string();
        Ok(step)
    }

    /// Read and parse a `step.yml` file.
    pub fn read(path: &Path, id: &str, version: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SpecError::io(path, e))?;
        StepDescriptor::from_yaml(id, version, &content).map_err(|e| SpecError::Parse {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Stamp the source reference and publish time.
    pub fn stamp_source(&mut self, git: &str, commit: &str, published_at: DateTime<Utc>) {
        self.source = Some(StepSource {
            git: git.to_string(),
            commit: commit.to_string(),
        });
        self.published_at = Some(published_at);
    }
}

impl fmt::Display for StepDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}
