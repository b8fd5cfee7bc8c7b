//! Category tables.
//!
//! Every statistic lives in exactly one wide table keyed by
//! `(steam_id, server_id)`. The set of tables is fixed; the set of counter
//! columns inside each table is not (see [`crate::CategorySchema`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StatError;

/// One of the fixed statistic groupings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pvp,
    Resources,
    Explosives,
    Farming,
    Misc,
    Events,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 6] = [
        Category::Pvp,
        Category::Resources,
        Category::Explosives,
        Category::Farming,
        Category::Misc,
        Category::Events,
    ];

    /// Backing table name. These are the only table identifiers that are
    /// ever interpolated into SQL text.
    pub fn table_name(self) -> &'static str {
        match self {
            Category::Pvp => "pvp_stats",
            Category::Resources => "resources_stats",
            Category::Explosives => "explosives_stats",
            Category::Farming => "farming_stats",
            Category::Misc => "misc_stats",
            Category::Events => "events_stats",
        }
    }

    /// Short name used by the leaderboard UI (`pvp`, `resources`, ...).
    pub fn short_name(self) -> &'static str {
        match self {
            Category::Pvp => "pvp",
            Category::Resources => "resources",
            Category::Explosives => "explosives",
            Category::Farming => "farming",
            Category::Misc => "misc",
            Category::Events => "events",
        }
    }

    /// Resolve a category from its exact table name.
    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.table_name() == name)
    }

    /// Resolve a `tab` query value. Accepts the table name or the short
    /// name, case-insensitively.
    pub fn parse_tab(tab: &str) -> Result<Self, StatError> {
        let wanted = tab.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.table_name() == wanted || c.short_name() == wanted)
            .ok_or_else(|| StatError::UnknownCategory {
                tab: tab.to_string(),
            })
    }

    /// Whether the kill/death ratio is defined for this category.
    pub fn has_kill_death_ratio(self) -> bool {
        matches!(self, Category::Pvp)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Category {
    type Err = StatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_tab(s)
    }
}
