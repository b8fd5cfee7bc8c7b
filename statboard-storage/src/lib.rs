//! STATBOARD Storage - Storage Trait, In-Memory Store and Table Router
//!
//! Defines the storage seam used by the API crate. The Postgres
//! implementation lives in statboard-api.

pub mod memory;
pub mod router;
pub mod store;

pub use memory::{InMemoryStatStore, PlayerRecord};
pub use router::{RouterSnapshot, TableRouter};
pub use store::StatStore;
