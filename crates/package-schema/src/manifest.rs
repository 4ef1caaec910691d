//! Package manifest types.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

fn api_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; cannot fail to compile.
    PATTERN.get_or_init(|| Regex::new(r"^[0-9]+\.[0-9]+$").expect("Invalid version pattern"))
}

/// Serialized form of a manifest document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    #[default]
    Xml,
    Json,
}

impl ManifestFormat {
    pub fn file_extension(&self) -> &'static str {
        match self {
            ManifestFormat::Xml => "xml",
            ManifestFormat::Json => "json",
        }
    }
}

/// A metadata API version of the form `major.minor` (e.g. `65.0`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion(String);

impl ApiVersion {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ApiVersion {
    type Err = trailpack_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if api_version_pattern().is_match(s) {
            Ok(ApiVersion(s.to_string()))
        } else {
            Err(trailpack_common::Error::format(format!(
                "API version must look like 65.0, got {:?}",
                s
            )))
        }
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = trailpack_common::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(v: ApiVersion) -> Self {
        v.0
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One metadata type and its member names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeBlock {
    pub name: String,
    pub members: Vec<String>,
}

/// The generated package manifest: a version tag plus zero or more type
/// blocks, in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub api_version: ApiVersion,
    pub types: Vec<TypeBlock>,
}

impl PackageManifest {
    /// A manifest with no type blocks.
    pub fn empty(api_version: ApiVersion) -> Self {
        Self {
            api_version,
            types: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.types.iter().map(|t| t.members.len()).sum()
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_version_parse() {
        assert_eq!(ApiVersion::from_str("65.0").unwrap().as_str(), "65.0");
        assert!(ApiVersion::from_str("60.1").is_ok());
        assert!(ApiVersion::from_str("65").is_err());
        assert!(ApiVersion::from_str("v65.0").is_err());
        assert!(ApiVersion::from_str("65.0.1").is_err());
        assert!(ApiVersion::from_str("").is_err());
    }

    #[test]
    fn test_api_version_serde() {
        let v: ApiVersion = serde_json::from_str("\"58.0\"").unwrap();
        assert_eq!(v.to_string(), "58.0");
        assert!(serde_json::from_str::<ApiVersion>("\"latest\"").is_err());
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = PackageManifest::empty("65.0".parse().unwrap());
        assert!(manifest.is_empty());
        assert_eq!(manifest.member_count(), 0);
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["apiVersion"], "65.0");
        assert_eq!(json["types"], serde_json::json!([]));
    }
}
