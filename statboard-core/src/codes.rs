//! Wire code registry.
//!
//! Game-server plugins report statistics under two-character codes instead of
//! column names. The table below is a contract with independently deployed
//! plugins: codes are only ever added, never reassigned to another column.
//! Bump [`WIRE_CODE_VERSION`] whenever a code is added.
//!
//! The `default_category` of each code only seeds the persisted column
//! registry; routing at ingest time always goes through the registry.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::Category;

/// Version of the embedded wire code table.
pub const WIRE_CODE_VERSION: u32 = 1;

/// One entry of the wire code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCode {
    pub code: &'static str,
    pub column: &'static str,
    pub default_category: Category,
}

const fn wc(code: &'static str, column: &'static str, default_category: Category) -> WireCode {
    WireCode {
        code,
        column,
        default_category,
    }
}

/// The embedded wire code table, v1.
pub const WIRE_CODES: &[WireCode] = &[
    // A: player versus player
    wc("A1", "kills", Category::Pvp),
    wc("A2", "deaths", Category::Pvp),
    wc("A3", "suicides", Category::Pvp),
    wc("A4", "bullets_fired", Category::Pvp),
    wc("A5", "headshots", Category::Pvp),
    wc("A6", "bullets_hit", Category::Pvp),
    wc("A7", "arrows_fired", Category::Pvp),
    wc("A8", "arrows_hit", Category::Pvp),
    wc("A9", "npc_kills", Category::Pvp),
    // B: explosives
    wc("B1", "c4_thrown", Category::Explosives),
    wc("B2", "rockets_fired", Category::Explosives),
    wc("B3", "satchels_thrown", Category::Explosives),
    wc("B4", "beancans_thrown", Category::Explosives),
    wc("B5", "explosive_ammo_fired", Category::Explosives),
    wc("B6", "hv_rockets_fired", Category::Explosives),
    wc("B7", "incendiary_rockets_fired", Category::Explosives),
    wc("B8", "grenades_thrown", Category::Explosives),
    // C: gathered resources
    wc("C1", "wood_farmed", Category::Resources),
    wc("C2", "stone_farmed", Category::Resources),
    wc("C3", "metal_ore_farmed", Category::Resources),
    wc("C4", "sulfur_ore_farmed", Category::Resources),
    wc("C5", "hqm_ore_farmed", Category::Resources),
    wc("C6", "scrap_collected", Category::Resources),
    wc("C7", "cloth_farmed", Category::Resources),
    wc("C8", "leather_farmed", Category::Resources),
    // D: farming
    wc("D1", "corn_harvested", Category::Farming),
    wc("D2", "pumpkins_harvested", Category::Farming),
    wc("D3", "potatoes_harvested", Category::Farming),
    wc("D4", "hemp_harvested", Category::Farming),
    wc("D5", "berries_harvested", Category::Farming),
    wc("D6", "clones_planted", Category::Farming),
    // E: miscellaneous
    wc("E1", "time_played", Category::Misc),
    wc("E2", "barrels_broken", Category::Misc),
    wc("E3", "crates_looted", Category::Misc),
    wc("E4", "animals_killed", Category::Misc),
    wc("E5", "items_crafted", Category::Misc),
    wc("E6", "structures_built", Category::Misc),
    wc("E7", "blueprints_learned", Category::Misc),
    // F: world events
    wc("F1", "heli_kills", Category::Events),
    wc("F2", "bradley_kills", Category::Events),
    wc("F3", "cargo_hacks", Category::Events),
    wc("F4", "airdrops_looted", Category::Events),
    wc("F5", "oil_rig_crates", Category::Events),
];

static GLOBAL: Lazy<CodeRegistry> = Lazy::new(|| CodeRegistry::from_table(WIRE_CODES));

/// Bidirectional code/column lookup. Immutable once built.
#[derive(Debug, Clone)]
pub struct CodeRegistry {
    version: u32,
    by_code: HashMap<&'static str, &'static WireCode>,
    by_column: HashMap<&'static str, &'static WireCode>,
}

impl CodeRegistry {
    /// The process-wide registry built from [`WIRE_CODES`].
    pub fn global() -> &'static CodeRegistry {
        &GLOBAL
    }

    fn from_table(table: &'static [WireCode]) -> Self {
        let mut by_code = HashMap::with_capacity(table.len());
        let mut by_column = HashMap::with_capacity(table.len());
        for entry in table {
            by_code.insert(entry.code, entry);
            by_column.insert(entry.column, entry);
        }
        Self {
            version: WIRE_CODE_VERSION,
            by_code,
            by_column,
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Column for a wire code. Case-insensitive on the code.
    pub fn decode(&self, code: &str) -> Option<&'static str> {
        if code.len() != 2 {
            return None;
        }
        let upper = code.to_ascii_uppercase();
        self.by_code.get(upper.as_str()).map(|entry| entry.column)
    }

    /// Wire code for a column. Column names are matched exactly.
    pub fn encode(&self, column: &str) -> Option<&'static str> {
        self.by_column.get(column).map(|entry| entry.code)
    }

    /// All codes in table order.
    pub fn entries(&self) -> &'static [WireCode] {
        WIRE_CODES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Identifier;
    use proptest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_documented_codes() {
        let registry = CodeRegistry::global();
        assert_eq!(registry.decode("A1"), Some("kills"));
        assert_eq!(registry.decode("A2"), Some("deaths"));
        assert_eq!(registry.decode("A3"), Some("suicides"));
        assert_eq!(registry.decode("A4"), Some("bullets_fired"));
        assert_eq!(registry.decode("A5"), Some("headshots"));
        assert_eq!(registry.decode("B1"), Some("c4_thrown"));
        assert_eq!(registry.decode("C1"), Some("wood_farmed"));
    }

    #[test]
    fn test_decode_is_case_insensitive() {
        let registry = CodeRegistry::global();
        assert_eq!(registry.decode("a1"), Some("kills"));
        assert_eq!(registry.decode("c1"), Some("wood_farmed"));
    }

    #[test]
    fn test_unknown_codes_are_not_coerced() {
        let registry = CodeRegistry::global();
        assert_eq!(registry.decode("Z9"), None);
        assert_eq!(registry.decode("A"), None);
        assert_eq!(registry.decode("A10"), None);
        assert_eq!(registry.decode("A1 "), None);
        assert_eq!(registry.decode("kills"), None);
    }

    #[test]
    fn test_encode() {
        let registry = CodeRegistry::global();
        assert_eq!(registry.encode("kills"), Some("A1"));
        assert_eq!(registry.encode("wood_farmed"), Some("C1"));
        assert_eq!(registry.encode("KILLS"), None);
        assert_eq!(registry.encode("unknown"), None);
    }

    #[test]
    fn test_table_is_a_bijection_of_valid_identifiers() {
        let codes: HashSet<_> = WIRE_CODES.iter().map(|w| w.code).collect();
        let columns: HashSet<_> = WIRE_CODES.iter().map(|w| w.column).collect();
        assert_eq!(codes.len(), WIRE_CODES.len(), "duplicate wire code");
        assert_eq!(columns.len(), WIRE_CODES.len(), "column mapped twice");

        for entry in WIRE_CODES {
            assert_eq!(entry.code.len(), 2);
            assert_eq!(entry.code, entry.code.to_ascii_uppercase());
            let ident = Identifier::parse(entry.column).unwrap();
            assert!(!ident.is_key_column());
        }
    }

    #[test]
    fn test_kdr_inputs_are_pvp() {
        let kills = WIRE_CODES.iter().find(|w| w.column == "kills").unwrap();
        let deaths = WIRE_CODES.iter().find(|w| w.column == "deaths").unwrap();
        assert_eq!(kills.default_category, Category::Pvp);
        assert_eq!(deaths.default_category, Category::Pvp);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_agree(idx in 0..WIRE_CODES.len(), lower in any::<bool>()) {
            let registry = CodeRegistry::global();
            let entry = &WIRE_CODES[idx];
            let code = if lower { entry.code.to_ascii_lowercase() } else { entry.code.to_string() };
            prop_assert_eq!(registry.decode(&code), Some(entry.column));
            prop_assert_eq!(registry.encode(entry.column), Some(entry.code));
        }
    }
}
