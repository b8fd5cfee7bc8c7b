//! Statboard Test Utilities
//!
//! Shared test infrastructure for the Statboard workspace:
//! - Proptest generators for wire payloads and stat keys
//! - Seeded in-memory stores
//! - Custom assertions for counter state

// Re-export the in-memory store from its source crate
pub use statboard_storage::InMemoryStatStore;

// Re-export core types for convenience
pub use statboard_core::{
    Category, CodeRegistry, Identifier, StatKey, StorageError, StorageResult, WireCode,
    WIRE_CODES,
};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Statboard inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};

    /// Any category.
    pub fn arb_category() -> impl Strategy<Value = Category> {
        proptest::sample::select(Category::ALL.to_vec())
    }

    /// A wire code from the embedded table.
    pub fn arb_wire_code() -> impl Strategy<Value = &'static WireCode> {
        proptest::sample::select(WIRE_CODES.iter().collect::<Vec<_>>())
    }

    /// A steam id from a small pool so batches collide on keys.
    pub fn arb_steam_id(pool: usize) -> impl Strategy<Value = String> {
        (0..pool.max(1)).prop_map(|i| format!("7656119800000{:04}", i))
    }

    /// A server id from a small pool.
    pub fn arb_server_id(pool: usize) -> impl Strategy<Value = String> {
        (0..pool.max(1)).prop_map(|i| format!("srv{}", i))
    }

    /// A non-negative increment small enough that sums never overflow.
    pub fn arb_increment() -> impl Strategy<Value = i64> {
        0i64..10_000
    }

    /// One wire entry: a steam id, a server id and a few wire codes.
    pub fn arb_entry(players: usize, servers: usize) -> impl Strategy<Value = Value> {
        (
            arb_steam_id(players),
            arb_server_id(servers),
            prop::collection::vec((arb_wire_code(), arb_increment()), 1..6),
        )
            .prop_map(|(steam_id, server_id, stats)| {
                let mut entry = Map::new();
                entry.insert("steamId".to_string(), json!(steam_id));
                entry.insert("serverId".to_string(), json!(server_id));
                for (code, value) in stats {
                    entry.insert(code.code.to_string(), json!(value));
                }
                Value::Object(entry)
            })
    }

    /// A JSON array batch of entries.
    pub fn arb_batch(players: usize, servers: usize, max_len: usize) -> impl Strategy<Value = Value> {
        prop::collection::vec(arb_entry(players, servers), 0..max_len.max(1)).prop_map(Value::Array)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built stores and payloads.

    use super::*;
    use serde_json::{json, Value};

    /// Default-layout store with `srv0..srv{servers}` registered and
    /// players generated the same way as [`generators::arb_steam_id`].
    pub fn seeded_store(players: usize, servers: usize) -> StorageResult<InMemoryStatStore> {
        let store = InMemoryStatStore::with_default_layout();
        for i in 0..servers {
            store.add_server(&format!("srv{}", i))?;
        }
        for i in 0..players {
            store.add_player(&format!("7656119800000{:04}", i), &format!("player{}", i))?;
        }
        Ok(store)
    }

    /// A single-entry batch.
    pub fn entry(steam_id: &str, server_id: &str, stats: &[(&str, i64)]) -> Value {
        let mut entry = json!({ "steamId": steam_id, "serverId": server_id });
        if let Value::Object(map) = &mut entry {
            for (code, value) in stats {
                map.insert(code.to_string(), json!(value));
            }
        }
        entry
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions against in-memory counter state.

    use super::*;

    /// Assert one counter value.
    #[track_caller]
    pub fn assert_counter(
        store: &InMemoryStatStore,
        category: Category,
        key: &StatKey,
        column: &str,
        expected: i64,
    ) {
        match store.counter(category, key, column) {
            Ok(actual) => assert_eq!(
                actual, expected,
                "{}.{} for {} expected {}, got {}",
                category, column, key, expected, actual
            ),
            Err(e) => panic!("Reading {}.{} for {} failed: {}", category, column, key, e),
        }
    }

    /// Assert that no stat row exists for `key` in any category.
    #[track_caller]
    pub fn assert_no_rows(store: &InMemoryStatStore, key: &StatKey) {
        for category in Category::ALL {
            match store.has_row(category, key) {
                Ok(false) => {}
                Ok(true) => panic!("Unexpected {} row for {}", category, key),
                Err(e) => panic!("Reading {} rows for {} failed: {}", category, key, e),
            }
        }
    }
}
