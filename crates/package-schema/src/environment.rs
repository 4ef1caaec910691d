//! Source environment descriptors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A configured source environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Stable identifier used on the command line and in entries.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Free-form type (production, sandbox, scratch, ...).
    #[serde(default)]
    pub environment_type: Option<String>,
    #[serde(default)]
    pub instance_url: Option<String>,
    /// Inactive environments are listed but never fetched from.
    #[serde(default = "default_active")]
    pub active: bool,
    pub transport: TransportConfig,
}

fn default_active() -> bool {
    true
}

/// How audit records are retrieved from an environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportConfig {
    /// Records exported to a local JSON or JSONL file.
    File { path: PathBuf },
    /// Records served over HTTP as a JSON array.
    Http {
        base_url: String,
        /// Name of the environment variable holding a bearer token.
        #[serde(default)]
        token_env: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_deserialize() {
        let json = serde_json::json!({
            "id": "dev",
            "name": "Dev Sandbox",
            "transport": { "kind": "file", "path": "audit/dev.jsonl" }
        });
        let env: EnvironmentDescriptor = serde_json::from_value(json).unwrap();
        assert!(env.active);
        assert_eq!(
            env.transport,
            TransportConfig::File {
                path: PathBuf::from("audit/dev.jsonl")
            }
        );
    }
}
