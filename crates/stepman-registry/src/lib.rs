//! Local route registry and collection materialization for step libraries.
//!
//! A step collection (a git repository or a local directory of versioned
//! step descriptors) is materialized under the stepman home and bound to
//! its identifier by a [`Route`]. Setup is transactional: a route is only
//! registered once its collection tree and aggregated spec are on disk.
//!
//! # Architecture
//!
//! - [`RouteRegistry`] maps identifiers to routes, persisted through a
//!   [`RouteStore`].
//! - [`Materializer`] acquires, aggregates and commits collections.
//! - [`ShareWorkflow`] authors new step versions into a collection.
//!
//! Version control, alias generation and user confirmation are injected as
//! [`SourceControl`], [`AliasGenerator`] and [`Prompt`]. In-process doubles
//! for all three live in `testing`, behind the `testing` feature.

pub mod alias;
pub mod error;
pub mod fsutil;
pub mod home;
pub mod materialize;
pub mod prompt;
pub mod route;
pub mod share;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod vcs;

// Re-exports for convenience.
pub use alias::{normalize, AliasGenerator, RandomAlias};
pub use error::{RegistryError, Result};
pub use home::StepmanHome;
pub use materialize::{rebuild_spec, Materializer, SetupOutcome, SetupRequest};
pub use prompt::{FixedAnswer, Prompt};
pub use route::{FileRouteStore, Route, RouteRegistry, RouteStore};
pub use share::{
    step_id_from_git, CreateRequest, FinishOutcome, ShareCreated, ShareSession, ShareStore,
    ShareWorkflow,
};
pub use vcs::{GitCli, SourceControl};
