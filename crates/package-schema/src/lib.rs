//! Data model for trailpack.
//!
//! This crate defines the records that flow through the audit-trail to
//! package pipeline: audit entries, extracted components, the package
//! manifest and the persisted deployment package.

pub mod audit;
pub mod component;
pub mod environment;
pub mod manifest;
pub mod package;
pub mod schema;
pub mod validation;

pub use audit::{AuditEntry, FlatRecord, RawAuditRecord, SetupTrailRecord};
pub use component::{CategorizedComponents, Category, Component, TypeCount};
pub use environment::{EnvironmentDescriptor, TransportConfig};
pub use manifest::{ApiVersion, ManifestFormat, PackageManifest, TypeBlock};
pub use package::{
    DeploymentPackage, DeploymentPackageSummary, NewPackage, PackageId, PackageStatus,
};
pub use validation::{validate_manifest, validate_package};
