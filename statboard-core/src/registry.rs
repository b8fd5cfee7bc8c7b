//! Column registry entries and live category schemas.

use serde::{Deserialize, Serialize};

use crate::codes::WIRE_CODES;
use crate::{Category, Identifier};

/// Persisted mapping of a counter column to its owning category table.
///
/// `label` and `display_order` belong to the leaderboard column editor;
/// this crate only carries them through to readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ColumnRegistryEntry {
    pub column: String,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub display_order: i32,
}

impl ColumnRegistryEntry {
    pub fn new(column: impl Into<String>, category: Category) -> Self {
        Self {
            column: column.into(),
            category,
            label: None,
            display_order: 0,
        }
    }
}

/// Registry rows matching the embedded wire code table. Used to seed a fresh
/// database and the in-memory store.
pub fn default_registry_entries() -> Vec<ColumnRegistryEntry> {
    let mut next_order = std::collections::HashMap::new();
    WIRE_CODES
        .iter()
        .map(|wire| {
            let order = next_order.entry(wire.default_category).or_insert(0);
            *order += 1;
            ColumnRegistryEntry {
                column: wire.column.to_string(),
                category: wire.default_category,
                label: Some(humanize(wire.column)),
                display_order: *order,
            }
        })
        .collect()
}

/// `bullets_fired` -> `Bullets Fired`.
fn humanize(column: &str) -> String {
    column
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Counter columns physically present in one category table.
///
/// This is the allow-list every sort key and every increment column is
/// checked against before it is written into SQL text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySchema {
    category: Category,
    columns: Vec<Identifier>,
}

impl CategorySchema {
    /// Key columns and reserved row field names (`username`, `kdr`) are
    /// filtered out, so they are never routed or sorted as counters.
    /// Duplicate names keep their first position.
    pub fn new(category: Category, columns: Vec<Identifier>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let columns = columns
            .into_iter()
            .filter(|c| !c.is_key_column() && !c.is_reserved_row_field())
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Self { category, columns }
    }

    /// Schema holding exactly the default columns of `category`.
    pub fn default_for(category: Category) -> Self {
        let columns = WIRE_CODES
            .iter()
            .filter(|wire| wire.default_category == category)
            .filter_map(|wire| Identifier::parse(wire.column).ok())
            .collect();
        Self::new(category, columns)
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Counter columns in table order.
    pub fn columns(&self) -> &[Identifier] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Identifier> {
        self.columns.iter().find(|c| c.as_str() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// KDR needs both inputs present in the table.
    pub fn supports_kill_death_ratio(&self) -> bool {
        self.category.has_kill_death_ratio() && self.contains("kills") && self.contains("deaths")
    }
}
