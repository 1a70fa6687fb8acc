//! Step library specification model.
//!
//! Describes what a step collection contains: individual step descriptors
//! (`step.yml`), the rules they must satisfy, the on-disk collection tree
//! they live in, and the aggregated spec document built from that tree.
//!
//! # Collection tree
//!
//! ```text
//! <collection>/steplib.yml
//! <collection>/steps/<step-id>/<version>/step.yml
//! ```
//!
//! The aggregated spec is a derived artifact. It is always rebuilt in full
//! from the tree and never edited by hand.

pub mod aggregate;
pub mod atomic;
pub mod collection;
pub mod descriptor;
pub mod error;
pub mod layout;
pub mod validate;
pub mod version;

// Re-exports for convenience.
pub use aggregate::{aggregate, AggregatedSpec, Aggregation, StepGroup};
pub use atomic::write_atomic;
pub use collection::{CollectionManifest, SPEC_FORMAT_VERSION};
pub use descriptor::{EnvEntry, EnvOptions, StepDescriptor, StepSource};
pub use error::{Result, SpecError};
pub use layout::{is_path_component, CollectionLayout, StepLocation, DESCRIPTOR_FILE};
pub use validate::{is_valid_step_id, validate, ValidationReport, MAX_SUMMARY_LENGTH};
