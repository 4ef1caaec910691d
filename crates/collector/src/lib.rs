//! Trailpack Collector - retrieve and normalize audit entries from source
//! environments.

pub mod collector;
pub mod normalize;
pub mod registry;
pub mod source;

pub use collector::{Collector, CollectorConfig, FetchOutcome, SourceFetchError};
pub use registry::EnvironmentRegistry;
pub use source::{AuditSource, FileSource, HttpSource};
