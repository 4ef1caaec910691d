//! Extracted components and their per-type grouping.

use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use trailpack_common::ActionType;

/// A distinct metadata unit referenced by one or more audit entries.
/// Unique by `(component_type, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    #[serde(rename = "type")]
    pub component_type: String,
    pub name: String,
    /// Latest timestamp among the contributing entries.
    pub last_modified: DateTime<Utc>,
    /// Number of entries collapsed into this component.
    pub occurrence_count: usize,
    /// Action of the latest contributing entry.
    pub last_action: ActionType,
    /// Environments that reported a change, in first-seen order.
    #[serde(default)]
    pub source_environments: Vec<String>,
}

impl Component {
    pub fn key(&self) -> (&str, &str) {
        (&self.component_type, &self.name)
    }
}

/// All components of one metadata type, in extraction order.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub component_type: String,
    pub components: Vec<Component>,
}

/// Per-type count used for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    #[serde(rename = "type")]
    pub component_type: String,
    pub count: usize,
}

/// Components grouped by metadata type.
///
/// Categories keep the order in which their type was first seen, and
/// components keep extraction order within a category. Serializes as a JSON
/// object whose keys follow that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorizedComponents {
    categories: Vec<Category>,
}

impl CategorizedComponents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component to the category matching its type.
    ///
    /// Returns `false` (and leaves the set unchanged) when a component with
    /// the same name is already present in that category.
    pub fn insert(&mut self, component: Component) -> bool {
        let idx = match self
            .categories
            .iter()
            .position(|c| c.component_type == component.component_type)
        {
            Some(idx) => idx,
            None => {
                self.categories.push(Category {
                    component_type: component.component_type.clone(),
                    components: Vec::new(),
                });
                self.categories.len() - 1
            }
        };

        let category = &mut self.categories[idx];
        if category.components.iter().any(|c| c.name == component.name) {
            return false;
        }
        category.components.push(component);
        true
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Type names in first-seen order.
    pub fn types(&self) -> Vec<&str> {
        self.categories
            .iter()
            .map(|c| c.component_type.as_str())
            .collect()
    }

    pub fn get(&self, component_type: &str) -> Option<&[Component]> {
        self.categories
            .iter()
            .find(|c| c.component_type == component_type)
            .map(|c| c.components.as_slice())
    }

    /// All components, category by category.
    pub fn flatten(&self) -> Vec<Component> {
        self.categories
            .iter()
            .flat_map(|c| c.components.iter().cloned())
            .collect()
    }

    pub fn summary(&self) -> Vec<TypeCount> {
        self.categories
            .iter()
            .map(|c| TypeCount {
                component_type: c.component_type.clone(),
                count: c.components.len(),
            })
            .collect()
    }

    pub fn total_components(&self) -> usize {
        self.categories.iter().map(|c| c.components.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_components() == 0
    }
}

impl Serialize for CategorizedComponents {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(&category.component_type, &category.components)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategorizedComponents {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CategoriesVisitor;

        impl<'de> Visitor<'de> for CategoriesVisitor {
            type Value = CategorizedComponents;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of component type to component list")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut seen: HashSet<String> = HashSet::new();
                let mut categorized = CategorizedComponents::new();
                while let Some((key, components)) =
                    access.next_entry::<String, Vec<Component>>()?
                {
                    if !seen.insert(key.clone()) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate component type: {}",
                            key
                        )));
                    }
                    for component in components {
                        if component.component_type != key {
                            return Err(serde::de::Error::custom(format!(
                                "component {} has type {} but is listed under {}",
                                component.name, component.component_type, key
                            )));
                        }
                        categorized.insert(component);
                    }
                }
                Ok(categorized)
            }
        }

        deserializer.deserialize_map(CategoriesVisitor)
    }
}
