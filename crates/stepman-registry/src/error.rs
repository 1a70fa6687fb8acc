//! Registry error types.

use std::path::PathBuf;

use stepman_spec::SpecError;

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No route is registered for the collection.
    #[error("no route found for collection: {collection}")]
    RouteNotFound { collection: String },

    /// Another route already owns the alias.
    #[error("alias '{alias}' is already used by collection {collection}")]
    AliasTaken { alias: String, collection: String },

    /// Missing or invalid user input. Reported before any side effect.
    #[error("invalid input: {detail}")]
    InvalidInput { detail: String },

    /// A fetch, copy or mirror collaborator failed.
    #[error("{operation} failed: {detail}")]
    Collaborator { operation: String, detail: String },

    /// Spec reading, validation or aggregation failed.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// The registry file could not be persisted.
    #[error("failed to persist {path}: {detail}")]
    Persist { path: PathBuf, detail: String },

    /// Copying the aggregated spec to the export path failed. The route
    /// itself is committed.
    #[error("failed to export spec from {from} to {to}: {source}")]
    Export {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// `share create`/`finish` without `share start`.
    #[error("no active share session; start one with `stepman share start`")]
    NoShareSession,

    /// The user declined to overwrite an existing descriptor.
    #[error("overwrite of {path} declined")]
    OverwriteDeclined { path: PathBuf },

    /// I/O error with the path it happened at.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RegistryError {
    /// Wrap a `std::io::Error` with the path it happened at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::Io {
            path: path.into(),
            source,
        }
    }

    /// Build an input error.
    pub fn input(detail: impl Into<String>) -> Self {
        RegistryError::InvalidInput {
            detail: detail.into(),
        }
    }

    /// Build a collaborator error.
    pub fn collaborator(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        RegistryError::Collaborator {
            operation: operation.into(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
