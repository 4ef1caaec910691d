//! Deployment package records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{Component, ManifestFormat};

/// Default semantic label for a new package.
pub const DEFAULT_PACKAGE_VERSION: &str = "1.0";

/// Stable identifier of a persisted package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageId(Uuid);

impl PackageId {
    pub fn new() -> Self {
        PackageId(Uuid::new_v4())
    }
}

impl Default for PackageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PackageId {
    type Err = trailpack_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(PackageId)
            .map_err(|e| trailpack_common::Error::validation(format!("invalid package id: {}", e)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageStatus {
    #[default]
    Draft,
    Ready,
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageStatus::Draft => write!(f, "draft"),
            PackageStatus::Ready => write!(f, "ready"),
        }
    }
}

/// Everything needed to create a package. Produced by the pipeline, handed
/// to a recorder.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub name: String,
    pub manifest_document: String,
    pub manifest_format: ManifestFormat,
    pub target_environment: String,
    pub description: Option<String>,
    pub version: String,
    pub component_snapshot: Vec<Component>,
    pub status: PackageStatus,
}

impl NewPackage {
    pub fn new(name: impl Into<String>, manifest_document: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            manifest_document: manifest_document.into(),
            manifest_format: ManifestFormat::Xml,
            target_environment: String::new(),
            description: None,
            version: DEFAULT_PACKAGE_VERSION.to_string(),
            component_snapshot: Vec::new(),
            status: PackageStatus::Draft,
        }
    }

    /// Reject empty names, empty manifests and empty version labels.
    pub fn validate(&self) -> trailpack_common::Result<()> {
        if self.name.trim().is_empty() {
            return Err(trailpack_common::Error::validation(
                "package name must not be empty",
            ));
        }
        if self.manifest_document.trim().is_empty() {
            return Err(trailpack_common::Error::validation(
                "manifest document must not be empty; generate a manifest first",
            ));
        }
        if self.version.trim().is_empty() {
            return Err(trailpack_common::Error::validation(
                "package version must not be empty",
            ));
        }
        Ok(())
    }
}

/// A persisted deployment package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPackage {
    pub id: PackageId,
    pub name: String,
    /// Empty when not yet assigned.
    pub target_environment: String,
    pub description: Option<String>,
    pub version: String,
    /// Manifest text, kept verbatim for re-download.
    pub manifest_document: String,
    /// Records written before the format was tracked are XML.
    #[serde(default)]
    pub manifest_format: ManifestFormat,
    pub manifest_sha256: String,
    pub component_snapshot: Vec<Component>,
    pub component_count: usize,
    pub created_at: DateTime<Utc>,
    pub status: PackageStatus,
}

impl DeploymentPackage {
    pub fn from_new(new: NewPackage, id: PackageId, created_at: DateTime<Utc>) -> Self {
        let manifest_sha256 = trailpack_common::hash::sha256_str(&new.manifest_document);
        let component_count = new.component_snapshot.len();
        Self {
            id,
            name: new.name.trim().to_string(),
            target_environment: new.target_environment,
            description: new.description.filter(|d| !d.trim().is_empty()),
            version: new.version,
            manifest_document: new.manifest_document,
            manifest_format: new.manifest_format,
            manifest_sha256,
            component_snapshot: new.component_snapshot,
            component_count,
            created_at,
            status: new.status,
        }
    }

    pub fn summary(&self) -> DeploymentPackageSummary {
        DeploymentPackageSummary {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            version: self.version.clone(),
            target_environment: self.target_environment.clone(),
            component_count: self.component_count,
            created_at: self.created_at,
        }
    }

    /// Suggested file name when offering the manifest for download.
    pub fn download_name(&self) -> String {
        let stem: String = self
            .name
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_package.{}", stem, self.manifest_format.file_extension())
    }

    /// Whether the stored manifest still matches its recorded hash.
    pub fn verify_manifest(&self) -> bool {
        trailpack_common::hash::sha256_str(&self.manifest_document) == self.manifest_sha256
    }
}

/// Row of the deployment history listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPackageSummary {
    pub id: PackageId,
    pub name: String,
    pub status: PackageStatus,
    pub version: String,
    pub target_environment: String,
    pub component_count: usize,
    pub created_at: DateTime<Utc>,
}
