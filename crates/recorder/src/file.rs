//! File-backed package store.
//!
//! Each package is stored as a JSON file: `<store_dir>/<key>.json`, where
//! `key` is the SHA-256 of the package name. A record is first written to a
//! temporary file and then hard-linked to its final path; the link fails if
//! the path exists, so a name can only ever be claimed once.

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use trailpack_common::{Error, Result};
use trailpack_schema::{
    validate_package, DeploymentPackage, DeploymentPackageSummary, NewPackage, PackageId,
};

use crate::PackageRecorder;

pub struct FilePackageStore {
    store_dir: PathBuf,
}

impl FilePackageStore {
    /// Open a store backed by the given directory, creating it if needed.
    pub fn new(store_dir: impl AsRef<Path>) -> Result<Self> {
        let store_dir = store_dir.as_ref().to_path_buf();
        fs::create_dir_all(&store_dir).map_err(|e| {
            Error::Persistence(format!("cannot create {}: {}", store_dir.display(), e))
        })?;
        Ok(Self { store_dir })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn package_file(&self, name: &str) -> PathBuf {
        self.store_dir
            .join(format!("{}.json", trailpack_common::hash::sha256_str(name)))
    }

    fn write_new(&self, package: &DeploymentPackage) -> Result<()> {
        let final_path = self.package_file(&package.name);
        let tmp_path = self.store_dir.join(format!(".{}.tmp", package.id));

        let json = serde_json::to_string_pretty(package)?;
        fs::write(&tmp_path, json).map_err(|e| {
            Error::Persistence(format!("cannot write {}: {}", tmp_path.display(), e))
        })?;

        let linked = fs::hard_link(&tmp_path, &final_path);
        if let Err(e) = fs::remove_file(&tmp_path) {
            warn!("Failed to remove temp file {}: {}", tmp_path.display(), e);
        }

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // The path is only a hash; the stored name decides.
                let existing = Self::read_package(&final_path)?;
                if existing.name == package.name {
                    Err(Error::DuplicatePackage(package.name.clone()))
                } else {
                    Err(Error::Persistence(format!(
                        "store key {} of {} is held by package {}",
                        final_path.display(),
                        package.name,
                        existing.name
                    )))
                }
            }
            Err(e) => Err(Error::Persistence(format!(
                "cannot create {}: {}",
                final_path.display(),
                e
            ))),
        }
    }

    fn read_package(path: &Path) -> Result<DeploymentPackage> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Persistence(format!("cannot read {}: {}", path.display(), e)))?;
        let value: serde_json::Value = serde_json::from_str(&json)?;

        let result = validate_package(&value)
            .map_err(|e| Error::Persistence(format!("{}: {}", path.display(), e)))?;
        if !result.valid {
            return Err(Error::Persistence(format!(
                "{}: {}",
                path.display(),
                result.error_summary()
            )));
        }

        Ok(serde_json::from_value(value)?)
    }

    fn read_all(&self) -> Result<Vec<DeploymentPackage>> {
        let entries = fs::read_dir(&self.store_dir).map_err(|e| {
            Error::Persistence(format!("cannot list {}: {}", self.store_dir.display(), e))
        })?;

        let mut packages = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::Persistence(e.to_string()))?
                .path();
            if path.extension().is_some_and(|ext| ext == "json") {
                match Self::read_package(&path) {
                    Ok(package) => packages.push(package),
                    Err(e) => warn!("Skipping unreadable package record: {}", e),
                }
            }
        }
        Ok(packages)
    }
}

#[async_trait]
impl PackageRecorder for FilePackageStore {
    async fn create(&self, package: NewPackage) -> Result<PackageId> {
        package.validate()?;

        let id = PackageId::new();
        let record = DeploymentPackage::from_new(package, id, Utc::now());
        self.write_new(&record)?;

        info!(
            "Created deployment package {} ({}, {} components)",
            record.name, id, record.component_count
        );
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<DeploymentPackageSummary>> {
        let mut summaries: Vec<DeploymentPackageSummary> =
            self.read_all()?.iter().map(DeploymentPackage::summary).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    async fn get(&self, id: PackageId) -> Result<Option<DeploymentPackage>> {
        Ok(self.read_all()?.into_iter().find(|p| p.id == id))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<DeploymentPackage>> {
        let path = self.package_file(name.trim());
        if !path.exists() {
            return Ok(None);
        }
        debug!("Reading package {} from {}", name, path.display());
        let package = Self::read_package(&path)?;
        Ok(Some(package).filter(|p| p.name == name.trim()))
    }
}
