//! STATBOARD Core - Domain Types
//!
//! Pure data structures and validation shared by the storage and API crates.
//! Nothing in here performs I/O.

pub mod category;
pub mod codes;
pub mod error;
pub mod ident;
pub mod leaderboard;
pub mod registry;
pub mod wire;

pub use category::Category;
pub use codes::{CodeRegistry, WireCode, WIRE_CODES, WIRE_CODE_VERSION};
pub use error::{StatError, StatResult, StorageError, StorageResult};
pub use ident::{Identifier, KEY_COLUMNS, MAX_IDENTIFIER_LEN, RESERVED_ROW_FIELDS};
pub use leaderboard::{
    kill_death_ratio, total_pages, LeaderboardPage, LeaderboardQuery, LeaderboardRequest,
    LeaderboardRow, PageLimits, ServerScope, SortDirection, SortKey, GLOBAL_SERVER,
    KDR_SORT_FIELD,
};
pub use registry::{default_registry_entries, CategorySchema, ColumnRegistryEntry};
pub use wire::{
    BatchError, CounterDeltas, StatBatch, StatEntry, StatKey, DEFAULT_MAX_BATCH_LEN,
    SERVER_ID_KEY, STEAM_ID_KEY,
};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
