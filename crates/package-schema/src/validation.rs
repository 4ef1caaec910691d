//! Manifest and package validation utilities.

use crate::schema;
use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

/// Validation error type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Duplicate type block: {0}")]
    DuplicateType(String),

    #[error("Manifest hash mismatch for {package}: expected {expected}, got {actual}")]
    ManifestHashMismatch {
        package: String,
        expected: String,
        actual: String,
    },

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result of a validation pass.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    /// Join all error messages into one line.
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_against(schema_value: &Value, instance: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let compiled = JSONSchema::compile(schema_value)
        .map_err(|e| ValidationError::SchemaError(e.to_string()))?;

    let validation = compiled.validate(instance);
    if let Err(errors) = validation {
        for error in errors {
            result.add_error(ValidationError::SchemaError(format!(
                "{} at {}",
                error, error.instance_path
            )));
        }
    }

    Ok(result)
}

/// Validate a structured manifest against the JSON schema.
pub fn validate_manifest(manifest: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = validate_against(&schema::manifest_schema(), manifest)?;

    // Type names must be unique across blocks.
    if let Some(types) = manifest.get("types").and_then(|t| t.as_array()) {
        let mut seen = std::collections::HashSet::new();
        for block in types {
            if let Some(name) = block.get("name").and_then(|n| n.as_str()) {
                if !seen.insert(name) {
                    result.add_error(ValidationError::DuplicateType(name.to_string()));
                }
            }
        }
        if types.is_empty() {
            result.add_warning("manifest contains no type blocks".to_string());
        }
    }

    Ok(result)
}

/// Validate a persisted package record (schema plus manifest hash).
pub fn validate_package(package: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = validate_against(&schema::package_schema(), package)?;

    let document = package.get("manifest_document").and_then(|d| d.as_str());
    let expected = package.get("manifest_sha256").and_then(|h| h.as_str());
    if let (Some(document), Some(expected)) = (document, expected) {
        let actual = trailpack_common::hash::sha256_str(document);
        if actual != expected {
            let name = package
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("unknown");
            result.add_error(ValidationError::ManifestHashMismatch {
                package: name.to_string(),
                expected: expected.to_string(),
                actual,
            });
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_manifest_minimal() {
        let manifest = serde_json::json!({
            "apiVersion": "65.0",
            "types": [
                { "name": "ApexClass", "members": ["Bar", "Foo"] }
            ]
        });

        let result = validate_manifest(&manifest).unwrap();
        assert!(result.valid, "Errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_manifest_empty_warns() {
        let manifest = serde_json::json!({ "apiVersion": "65.0", "types": [] });
        let result = validate_manifest(&manifest).unwrap();
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn test_validate_manifest_rejects_bad_version_and_duplicates() {
        let manifest = serde_json::json!({
            "apiVersion": "65",
            "types": [
                { "name": "ApexClass", "members": ["Foo"] },
                { "name": "ApexClass", "members": ["Bar"] }
            ]
        });
        let result = validate_manifest(&manifest).unwrap();
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateType(t) if t == "ApexClass")));
    }

    #[test]
    fn test_validate_manifest_missing_field() {
        let manifest = serde_json::json!({ "apiVersion": "65.0" });
        let result = validate_manifest(&manifest).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn test_validate_package_hash_mismatch() {
        let package = serde_json::json!({
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "name": "release-1",
            "target_environment": "",
            "description": null,
            "version": "1.0",
            "manifest_document": "<Package/>",
            "manifest_sha256": "0000000000000000000000000000000000000000000000000000000000000000",
            "component_snapshot": [],
            "component_count": 0,
            "created_at": "2024-01-01T00:00:00Z",
            "status": "draft"
        });
        let result = validate_package(&package).unwrap();
        assert!(!result.valid);
        assert!(matches!(
            result.errors[0],
            ValidationError::ManifestHashMismatch { .. }
        ));
    }
}
