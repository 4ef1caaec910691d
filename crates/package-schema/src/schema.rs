//! JSON schema definitions for manifest and package validation.

/// JSON Schema for the structured package manifest.
pub const MANIFEST_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://trailpack.dev/schemas/manifest.json",
  "title": "Trailpack Package Manifest",
  "type": "object",
  "required": ["apiVersion", "types"],
  "properties": {
    "apiVersion": {
      "type": "string",
      "pattern": "^[0-9]+\\.[0-9]+$"
    },
    "types": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["name", "members"],
        "properties": {
          "name": { "type": "string", "minLength": 1 },
          "members": {
            "type": "array",
            "minItems": 1,
            "uniqueItems": true,
            "items": { "type": "string", "minLength": 1 }
          }
        }
      }
    }
  }
}"#;

/// JSON Schema for a persisted deployment package record.
pub const PACKAGE_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://trailpack.dev/schemas/package.json",
  "title": "Trailpack Deployment Package",
  "type": "object",
  "required": ["id", "name", "target_environment", "version", "manifest_document",
               "manifest_sha256", "component_snapshot", "component_count", "created_at", "status"],
  "properties": {
    "id": { "type": "string", "format": "uuid" },
    "name": { "type": "string", "minLength": 1 },
    "target_environment": { "type": "string" },
    "description": { "type": ["string", "null"] },
    "version": { "type": "string", "minLength": 1 },
    "manifest_document": { "type": "string", "minLength": 1 },
    "manifest_format": { "type": "string", "enum": ["xml", "json"] },
    "manifest_sha256": { "type": "string", "pattern": "^[0-9a-f]{64}$" },
    "component_snapshot": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["type", "name", "last_modified", "occurrence_count"],
        "properties": {
          "type": { "type": "string" },
          "name": { "type": "string" },
          "last_modified": { "type": "string", "format": "date-time" },
          "occurrence_count": { "type": "integer", "minimum": 1 }
        }
      }
    },
    "component_count": { "type": "integer", "minimum": 0 },
    "created_at": { "type": "string", "format": "date-time" },
    "status": { "type": "string", "enum": ["draft", "ready"] }
  }
}"#;

/// Get the manifest schema as a parsed JSON value.
pub fn manifest_schema() -> serde_json::Value {
    // Embedded constant, covered by tests.
    serde_json::from_str(MANIFEST_SCHEMA).expect("Invalid manifest schema")
}

/// Get the package schema as a parsed JSON value.
pub fn package_schema() -> serde_json::Value {
    serde_json::from_str(PACKAGE_SCHEMA).expect("Invalid package schema")
}
