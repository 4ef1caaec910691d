//! YAML configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use trailpack_analyzer::{ManifestOptions, DEFAULT_API_VERSION};
use trailpack_schema::{ApiVersion, EnvironmentDescriptor, TransportConfig};

pub const DEFAULT_CONFIG_PATH: &str = "trailpack.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Manifest API version used when none is given on the command line.
    pub api_version: String,
    /// Per-environment fetch timeout.
    pub fetch_timeout_seconds: u64,
    /// Window length when no start date is given.
    pub lookback_days: u32,
    pub store_dir: PathBuf,
    pub manifest: ManifestOptions,
    pub environments: Vec<EnvironmentDescriptor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            fetch_timeout_seconds: 30,
            lookback_days: 7,
            store_dir: PathBuf::from(".trailpack/packages"),
            manifest: ManifestOptions::default(),
            environments: Vec::new(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file at the default path yields the
    /// default configuration; a missing file anywhere else is an error.
    ///
    /// Relative paths in the file (store directory, file transports) are
    /// resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            if path == Path::new(DEFAULT_CONFIG_PATH) {
                warn!("No {} found, using defaults", DEFAULT_CONFIG_PATH);
                return Ok(Self::default());
            }
            bail!("Config file not found: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;

        debug!(
            "Loaded config from {} ({} environments)",
            path.display(),
            config.environments.len()
        );
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        if self.store_dir.is_relative() {
            self.store_dir = base.join(&self.store_dir);
        }
        for env in &mut self.environments {
            if let TransportConfig::File { path } = &mut env.transport {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api_version
            .parse::<ApiVersion>()
            .context("Invalid api_version")?;
        if self.fetch_timeout_seconds == 0 {
            bail!("fetch_timeout_seconds must be greater than zero");
        }
        if self.lookback_days == 0 {
            bail!("lookback_days must be greater than zero");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailpack_analyzer::{ManifestFormat, TypeOrder};

    #[test]
    fn test_load_full_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trailpack.yaml");
        std::fs::write(
            &path,
            r#"
api_version: "64.0"
fetch_timeout_seconds: 10
store_dir: packages
manifest:
  format: json
  type_order: alphabetical
  allowed_types: [ApexClass, Flow]
environments:
  - id: dev
    name: Dev Sandbox
    environment_type: sandbox
    transport: { kind: file, path: audit/dev.jsonl }
  - id: prod
    name: Production
    active: false
    transport: { kind: http, base_url: "https://audit.example.com", token_env: PROD_TOKEN }
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api_version, "64.0");
        assert_eq!(config.fetch_timeout_seconds, 10);
        assert_eq!(config.lookback_days, 7);
        assert_eq!(config.store_dir, dir.path().join("packages"));
        assert_eq!(config.manifest.format, ManifestFormat::Json);
        assert_eq!(config.manifest.type_order, TypeOrder::Alphabetical);
        assert_eq!(config.manifest.namespace, trailpack_analyzer::DEFAULT_NAMESPACE);
        assert_eq!(config.environments.len(), 2);
        assert!(config.environments[0].active);
        assert!(!config.environments[1].active);
        assert_eq!(
            config.environments[0].transport,
            TransportConfig::File {
                path: dir.path().join("audit/dev.jsonl")
            }
        );
    }

    #[test]
    fn test_invalid_api_version_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "api_version: \"65\"\n").unwrap();
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(&dir.path().join("nope.yaml")).is_err());
    }
}
