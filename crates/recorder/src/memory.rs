//! In-memory package store.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;
use trailpack_common::{Error, Result};
use trailpack_schema::{DeploymentPackage, DeploymentPackageSummary, NewPackage, PackageId};

use crate::PackageRecorder;

#[derive(Default)]
pub struct MemoryPackageStore {
    packages: RwLock<Vec<DeploymentPackage>>,
}

impl MemoryPackageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.packages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.packages.read().await.is_empty()
    }
}

#[async_trait]
impl PackageRecorder for MemoryPackageStore {
    async fn create(&self, package: NewPackage) -> Result<PackageId> {
        package.validate()?;

        // Check and insert under one write lock.
        let mut packages = self.packages.write().await;
        let name = package.name.trim();
        if packages.iter().any(|p| p.name == name) {
            return Err(Error::DuplicatePackage(name.to_string()));
        }

        let id = PackageId::new();
        let record = DeploymentPackage::from_new(package, id, Utc::now());
        info!("Created deployment package {} ({})", record.name, id);
        packages.push(record);
        Ok(id)
    }

    async fn list(&self) -> Result<Vec<DeploymentPackageSummary>> {
        let packages = self.packages.read().await;
        Ok(packages.iter().rev().map(DeploymentPackage::summary).collect())
    }

    async fn get(&self, id: PackageId) -> Result<Option<DeploymentPackage>> {
        let packages = self.packages.read().await;
        Ok(packages.iter().find(|p| p.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<DeploymentPackage>> {
        let packages = self.packages.read().await;
        Ok(packages.iter().find(|p| p.name == name.trim()).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_duplicate_name_rejected() {
        let store = MemoryPackageStore::new();
        store
            .create(NewPackage::new("release-1", "<Package/>"))
            .await
            .unwrap();
        let second = store
            .create(NewPackage::new(" release-1 ", "<Package/>"))
            .await;
        assert!(matches!(second, Err(Error::DuplicatePackage(_))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_of_same_name() {
        let store = Arc::new(MemoryPackageStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .create(NewPackage::new("release-1", "<Package/>"))
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryPackageStore::new();
        store.create(NewPackage::new("a", "<Package/>")).await.unwrap();
        store.create(NewPackage::new("b", "<Package/>")).await.unwrap();
        let names: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
