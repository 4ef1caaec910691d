//! Normalization of vendor audit records into [`AuditEntry`].

use regex::Regex;
use std::sync::OnceLock;
use trailpack_common::ActionType;
use trailpack_schema::{AuditEntry, FlatRecord, RawAuditRecord, SetupTrailRecord};

/// Section labels of the setup audit trail and the metadata type each one
/// describes. Matched case-insensitively.
const SECTION_TYPES: &[(&str, &str)] = &[
    ("apex class", "ApexClass"),
    ("apex trigger", "ApexTrigger"),
    ("visualforce page", "ApexPage"),
    ("pages", "ApexPage"),
    ("visualforce component", "ApexComponent"),
    ("custom objects", "CustomObject"),
    ("custom object", "CustomObject"),
    ("custom fields", "CustomField"),
    ("custom field", "CustomField"),
    ("page layout", "Layout"),
    ("layouts", "Layout"),
    ("validation rules", "ValidationRule"),
    ("flows", "Flow"),
    ("flow", "Flow"),
    ("lightning components", "LightningComponentBundle"),
    ("lightning web components", "LightningComponentBundle"),
    ("aura components", "AuraDefinitionBundle"),
    ("static resource", "StaticResource"),
    ("static resources", "StaticResource"),
    ("permission sets", "PermissionSet"),
    ("permission set", "PermissionSet"),
    ("profiles", "Profile"),
    ("profile", "Profile"),
    ("custom metadata types", "CustomMetadata"),
    ("email templates", "EmailTemplate"),
    ("custom labels", "CustomLabel"),
    ("named credentials", "NamedCredential"),
    ("remote site settings", "RemoteSiteSetting"),
];

/// Words that name a component kind inside a display sentence.
const KIND_WORDS: &str = r"apex class|apex trigger|visualforce page|visualforce component|custom object|page layout|layout|validation rule|flow|lightning component|static resource|permission set|profile|email template|custom label|named credential|remote site";

fn field_on_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; cannot fail to compile.
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bcustom field\s+(?P<field>[\w]+)(?:\s*\([^)]*\))?\s+on\s+(?P<object>[\w]+)")
            .expect("Invalid field pattern")
    })
}

fn name_before_kind() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"(?i)^(?:created|changed|deleted|updated|modified|removed)\s+(?P<name>[\w.\-]+)\s+(?:{})\b",
            KIND_WORDS
        ))
        .expect("Invalid name pattern")
    })
}

fn name_after_kind() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r#"(?i)\b(?:{})s?\s+"?(?P<name>[\w.\-]+)"?"#,
            KIND_WORDS
        ))
        .expect("Invalid name pattern")
    })
}

/// Translate one raw record into an entry for `environment`.
pub fn normalize(environment: &str, record: RawAuditRecord) -> AuditEntry {
    match record {
        RawAuditRecord::Flat(r) => normalize_flat(environment, r),
        RawAuditRecord::SetupTrail(r) => normalize_setup_trail(environment, r),
    }
}

/// Translate a batch of records, preserving their order.
pub fn normalize_all(environment: &str, records: Vec<RawAuditRecord>) -> Vec<AuditEntry> {
    records
        .into_iter()
        .map(|r| normalize(environment, r))
        .collect()
}

fn normalize_flat(environment: &str, record: FlatRecord) -> AuditEntry {
    AuditEntry {
        source_environment: environment.to_string(),
        timestamp: record.timestamp,
        action_type: ActionType::classify(&record.action),
        component_type: non_blank(record.component_type),
        component_name: non_blank(record.component_name),
        raw_detail: if record.detail.is_empty() {
            record.action
        } else {
            record.detail
        },
    }
}

fn normalize_setup_trail(environment: &str, record: SetupTrailRecord) -> AuditEntry {
    let display = record.display.unwrap_or_default();
    let component_type = record.section.as_deref().and_then(section_to_type);
    let component_name = component_name_from_display(&display, component_type.as_deref());

    AuditEntry {
        source_environment: environment.to_string(),
        timestamp: record.created_date,
        action_type: ActionType::classify(&record.action),
        component_type,
        component_name,
        raw_detail: display,
    }
}

/// Map a section label to a metadata type name. Unknown labels become the
/// label with non-alphanumerics removed and each word capitalized.
pub fn section_to_type(section: &str) -> Option<String> {
    let trimmed = section.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if let Some((_, t)) = SECTION_TYPES.iter().find(|(label, _)| *label == lower) {
        return Some((*t).to_string());
    }

    let pascal: String = trimmed
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if pascal.is_empty() {
        None
    } else {
        Some(pascal)
    }
}

/// Derive the component name from a display sentence such as
/// `Changed AccountService Apex Class code` or
/// `Created custom field Rating__c (Picklist) on Account`.
///
/// Custom fields are qualified with their object (`Account.Rating__c`).
pub fn component_name_from_display(display: &str, component_type: Option<&str>) -> Option<String> {
    let display = display.trim();
    if display.is_empty() {
        return None;
    }

    if let Some(caps) = field_on_object().captures(display) {
        return Some(format!("{}.{}", &caps["object"], &caps["field"]));
    }
    if component_type == Some("CustomField") {
        return None;
    }

    name_before_kind()
        .captures(display)
        .or_else(|| name_after_kind().captures(display))
        .map(|caps| caps["name"].trim_end_matches('.').to_string())
        .filter(|name| !name.is_empty())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
