//! Audit action classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of configuration change recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    Other,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::Other => write!(f, "other"),
        }
    }
}

impl FromStr for ActionType {
    type Err = crate::Error;

    /// Strict parse of the canonical names only.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "create" => Ok(ActionType::Create),
            "update" => Ok(ActionType::Update),
            "delete" => Ok(ActionType::Delete),
            "other" => Ok(ActionType::Other),
            _ => Err(crate::Error::validation(format!("invalid action type: {}", s))),
        }
    }
}

impl ActionType {
    /// Classify a free-form vendor action label (e.g. `changedApexClass`,
    /// `Deleted custom field`) by its leading verb. Never fails.
    pub fn classify(label: &str) -> Self {
        const DELETE: [&str; 3] = ["delet", "remov", "destroy"];
        const CREATE: [&str; 2] = ["creat", "insert"];
        const UPDATE: [&str; 5] = ["chang", "updat", "modif", "edit", "renam"];

        let verb = leading_verb(label);
        let is = |stems: &[&str]| stems.iter().any(|stem| verb.starts_with(stem));

        if is(&DELETE) {
            ActionType::Delete
        } else if is(&CREATE) || matches!(verb.as_str(), "new" | "add" | "added") {
            ActionType::Create
        } else if is(&UPDATE) || verb == "set" {
            ActionType::Update
        } else {
            ActionType::Other
        }
    }
}

/// First word of a label, lowercased. In camel case the word ends where a
/// lowercase letter is followed by an uppercase one.
fn leading_verb(label: &str) -> String {
    let word = label
        .trim_start()
        .split(|c: char| !c.is_alphabetic())
        .next()
        .unwrap_or_default();

    let mut verb = String::with_capacity(word.len());
    let mut prev_lower = false;
    for c in word.chars() {
        if prev_lower && c.is_uppercase() {
            break;
        }
        prev_lower = c.is_lowercase();
        verb.extend(c.to_lowercase());
    }
    verb
}
