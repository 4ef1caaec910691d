//! Grouping of components by metadata type.

use tracing::warn;
use trailpack_schema::{CategorizedComponents, Component};

/// Group components by type, keeping input order within each type.
///
/// Any type name forms a category; type whitelisting happens when the
/// manifest is generated. A repeated `(type, name)` keeps its first
/// occurrence.
pub fn categorize(components: &[Component]) -> CategorizedComponents {
    let mut categorized = CategorizedComponents::new();
    for component in components {
        if !categorized.insert(component.clone()) {
            warn!(
                "Duplicate component {}/{} ignored",
                component.component_type, component.name
            );
        }
    }
    categorized
}
