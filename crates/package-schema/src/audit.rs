//! Audit entry types: the vendor record shapes and the normalized entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use trailpack_common::ActionType;

/// A single recorded configuration change, normalized from whatever shape
/// the source environment returned. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Environment the entry was fetched from.
    pub source_environment: String,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
    /// Classified action.
    pub action_type: ActionType,
    /// Metadata type name (e.g. `ApexClass`). `None` for unsupported records.
    pub component_type: Option<String>,
    /// Component name, possibly qualified (e.g. `Account.Rating__c`).
    pub component_name: Option<String>,
    /// Original free-form description, kept for traceability.
    pub raw_detail: String,
}

impl AuditEntry {
    /// The `(type, name)` uniqueness key, or `None` when either part is
    /// missing or blank.
    pub fn component_key(&self) -> Option<(&str, &str)> {
        let component_type = self.component_type.as_deref().map(str::trim)?;
        let name = self.component_name.as_deref().map(str::trim)?;
        if component_type.is_empty() || name.is_empty() {
            return None;
        }
        Some((component_type, name))
    }

    pub fn is_well_formed(&self) -> bool {
        self.component_key().is_some()
    }
}

/// A record as returned by a source environment's transport.
///
/// Environments running different versions expose different shapes; both
/// are accepted here and translated into [`AuditEntry`] at the collector
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawAuditRecord {
    Flat(FlatRecord),
    SetupTrail(SetupTrailRecord),
}

impl RawAuditRecord {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RawAuditRecord::Flat(r) => r.timestamp,
            RawAuditRecord::SetupTrail(r) => r.created_date,
        }
    }
}

/// Flat record shape with explicit component labels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatRecord {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub component_type: Option<String>,
    #[serde(default)]
    pub component_name: Option<String>,
    #[serde(default)]
    pub detail: String,
}

/// Setup audit trail shape: the component is only described by a section
/// label and a display sentence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetupTrailRecord {
    #[serde(deserialize_with = "vendor_timestamp")]
    pub created_date: DateTime<Utc>,
    pub action: String,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
    #[serde(default)]
    pub delegate_user: Option<String>,
}

/// Accepts RFC 3339 as well as offsets without a colon
/// (`2024-01-05T10:00:00.000+0000`).
fn vendor_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f%z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(component_type: Option<&str>, name: Option<&str>) -> AuditEntry {
        AuditEntry {
            source_environment: "dev".to_string(),
            timestamp: Utc::now(),
            action_type: ActionType::Update,
            component_type: component_type.map(String::from),
            component_name: name.map(String::from),
            raw_detail: String::new(),
        }
    }

    #[test]
    fn test_component_key() {
        assert_eq!(
            entry(Some("ApexClass"), Some("Foo")).component_key(),
            Some(("ApexClass", "Foo"))
        );
        assert_eq!(entry(Some("ApexClass"), None).component_key(), None);
        assert_eq!(entry(Some("  "), Some("Foo")).component_key(), None);
        assert!(!entry(None, Some("Foo")).is_well_formed());
    }

    #[test]
    fn test_raw_record_shapes() {
        let flat: RawAuditRecord = serde_json::from_str(
            r#"{"timestamp":"2024-01-05T10:00:00Z","action":"changedApexClass",
                "componentType":"ApexClass","componentName":"Foo"}"#,
        )
        .unwrap();
        assert!(matches!(flat, RawAuditRecord::Flat(_)));

        let setup: RawAuditRecord = serde_json::from_str(
            r#"{"CreatedDate":"2024-01-05T10:00:00.000+0000","Action":"changedApexClass",
                "Section":"Apex Class","Display":"Changed Foo Apex Class code"}"#,
        )
        .unwrap();
        match setup {
            RawAuditRecord::SetupTrail(r) => {
                assert_eq!(
                    r.created_date,
                    Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap()
                );
                assert_eq!(r.section.as_deref(), Some("Apex Class"));
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }
}
