//! Trailpack analyzer: turn audit entries into a package manifest.
//!
//! Stages, in pipeline order:
//! 1. [`extract`]: collapse entries into distinct components
//! 2. [`categorize`]: group components by metadata type
//! 3. [`manifest`]: build, validate and render the package manifest
//!
//! [`pipeline`] sequences the stages after the collector's fetch and
//! optionally hands the result to a package recorder.

pub mod categorize;
pub mod extract;
pub mod manifest;
pub mod pipeline;

pub use categorize::categorize;
pub use extract::{extract, Extraction};
pub use manifest::{
    generate, render, render_json, render_xml, ManifestOptions, TypeOrder, DEFAULT_API_VERSION,
    DEFAULT_NAMESPACE,
};
pub use trailpack_schema::ManifestFormat;
pub use pipeline::{PackageRequest, Pipeline, PipelineError, RunReport, RunRequest, RunStage};
