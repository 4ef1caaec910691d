//! Persistence of deployment packages.
//!
//! Stores are append-only from the pipeline's point of view: packages are
//! created, listed and read back, never updated in place. Package names are
//! unique per store.

pub mod file;
pub mod memory;

pub use file::FilePackageStore;
pub use memory::MemoryPackageStore;

use async_trait::async_trait;
use trailpack_common::Result;
use trailpack_schema::{DeploymentPackage, DeploymentPackageSummary, NewPackage, PackageId};

/// Trait for deployment package stores.
#[async_trait]
pub trait PackageRecorder: Send + Sync {
    /// Create a package. Fails with `Error::DuplicatePackage` if the name is
    /// taken; never leaves a partial record behind.
    async fn create(&self, package: NewPackage) -> Result<PackageId>;

    /// All packages, newest first.
    async fn list(&self) -> Result<Vec<DeploymentPackageSummary>>;

    async fn get(&self, id: PackageId) -> Result<Option<DeploymentPackage>>;

    async fn find_by_name(&self, name: &str) -> Result<Option<DeploymentPackage>>;
}
