//! Spec error types.

use std::path::PathBuf;

/// Errors that can occur while reading, validating or aggregating steps.
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    /// A step descriptor failed hard validation.
    #[error("invalid step '{id}@{version}': {}", errors.join("; "))]
    InvalidStep {
        id: String,
        version: String,
        errors: Vec<String>,
    },

    /// The same (identifier, version) pair was offered twice.
    #[error("duplicate step '{id}@{version}' in collection")]
    DuplicateStep { id: String, version: String },

    /// The collection tree does not follow the expected layout.
    #[error("malformed collection layout at {path}: {detail}")]
    MalformedLayout { path: PathBuf, detail: String },

    /// A step id or version that cannot name a single directory.
    #[error("invalid {kind} '{value}': must be a single path component")]
    InvalidComponent { kind: &'static str, value: String },

    /// A step descriptor or collection manifest could not be parsed.
    #[error("failed to parse {path}: {detail}")]
    Parse { path: PathBuf, detail: String },

    /// Step not present in an aggregated spec.
    #[error("step not found: {id}")]
    StepNotFound { id: String },

    /// Step present, version missing.
    #[error("version {version} not found for step '{id}'")]
    VersionNotFound { id: String, version: String },

    /// I/O error with the path it happened at.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    /// Wrap a `std::io::Error` with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SpecError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for spec operations.
pub type Result<T> = std::result::Result<T, SpecError>;
