//! Component extraction from audit entries.

use std::collections::HashMap;
use tracing::debug;
use trailpack_schema::{AuditEntry, Component};

/// Components referenced by a batch of entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// One component per `(type, name)`, in first-seen order.
    pub components: Vec<Component>,
    /// Entries dropped for lacking a component type or name.
    pub skipped: usize,
}

impl Extraction {
    /// Number of entries that contributed to a component.
    pub fn contributing_entries(&self) -> usize {
        self.components.iter().map(|c| c.occurrence_count).sum()
    }
}

/// Collapse entries into distinct components.
///
/// Entries sharing a `(type, name)` key become one component whose
/// `last_modified` is the latest timestamp seen and whose `last_action` is
/// that entry's action. On equal timestamps the later entry wins.
pub fn extract(entries: &[AuditEntry]) -> Extraction {
    let mut extraction = Extraction::default();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for entry in entries {
        let Some(key) = entry.component_key() else {
            debug!(
                "Skipping audit entry without component ({}): {}",
                entry.source_environment, entry.raw_detail
            );
            extraction.skipped += 1;
            continue;
        };

        match index.get(&key) {
            Some(&idx) => {
                let component = &mut extraction.components[idx];
                component.occurrence_count += 1;
                if entry.timestamp >= component.last_modified {
                    component.last_modified = entry.timestamp;
                    component.last_action = entry.action_type;
                }
                if !component
                    .source_environments
                    .contains(&entry.source_environment)
                {
                    component
                        .source_environments
                        .push(entry.source_environment.clone());
                }
            }
            None => {
                index.insert(key, extraction.components.len());
                extraction.components.push(Component {
                    component_type: key.0.to_string(),
                    name: key.1.to_string(),
                    last_modified: entry.timestamp,
                    occurrence_count: 1,
                    last_action: entry.action_type,
                    source_environments: vec![entry.source_environment.clone()],
                });
            }
        }
    }

    extraction
}
