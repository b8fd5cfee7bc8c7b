//! Ingest batch wire format.
//!
//! A batch is a JSON array of flat objects:
//!
//! ```json
//! [{ "steamId": "7656...", "serverId": "eu-1", "A1": 3, "C1": 1200 }]
//! ```
//!
//! Structural validation happens here and is all-or-nothing: a single
//! malformed entry rejects the batch before anything is written. Only keys
//! that decode as wire codes are type-checked; other keys are set aside for
//! the increment engine to report as unknown. Value range checks (negative,
//! too large) are per-field and belong to the increment engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use crate::{CodeRegistry, Identifier};

/// Entry key holding the player id.
pub const STEAM_ID_KEY: &str = "steamId";

/// Entry key holding the server id.
pub const SERVER_ID_KEY: &str = "serverId";

/// Default upper bound on entries per batch.
pub const DEFAULT_MAX_BATCH_LEN: usize = 1000;

/// Primary key of every category table row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatKey {
    pub steam_id: String,
    pub server_id: String,
}

impl StatKey {
    pub fn new(steam_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            steam_id: steam_id.into(),
            server_id: server_id.into(),
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.steam_id, self.server_id)
    }
}

/// Per-column increments for one row of one category table.
pub type CounterDeltas = BTreeMap<Identifier, i64>;

/// Structural problems that reject a whole batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch must be a JSON array of entries")]
    NotAnArray,

    #[error("Batch has {len} entries, limit is {max}")]
    TooLarge { len: usize, max: usize },

    #[error("Entry {index} is not a JSON object")]
    EntryNotAnObject { index: usize },

    #[error("Entry {index} is missing {field}")]
    MissingField { index: usize, field: &'static str },

    #[error("Entry {index}: {field} must be a non-empty string")]
    InvalidId { index: usize, field: &'static str },

    #[error("Entry {index}: value of '{key}' must be an integer")]
    NonIntegerValue { index: usize, key: String },
}

/// One structurally valid entry. Stat values are kept wide so the engine can
/// report out-of-range values instead of failing the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatEntry {
    /// Position in the submitted array.
    pub index: usize,
    pub key: StatKey,
    /// Raw wire keys and values in submission order.
    pub stats: Vec<(String, i128)>,
    /// Keys that are not wire codes. Their values are never inspected.
    pub unknown_keys: Vec<String>,
}

/// A structurally valid batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatBatch {
    pub entries: Vec<StatEntry>,
}

impl StatBatch {
    /// Validate a decoded JSON body.
    pub fn from_value(body: Value, max_len: usize) -> Result<Self, BatchError> {
        let items = match body {
            Value::Array(items) => items,
            _ => return Err(BatchError::NotAnArray),
        };
        if items.len() > max_len {
            return Err(BatchError::TooLarge {
                len: items.len(),
                max: max_len,
            });
        }

        let entries = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| parse_entry(index, item))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }

    /// Validate a raw request body.
    pub fn parse(bytes: &[u8], max_len: usize) -> Result<Self, BatchError> {
        let body: Value = serde_json::from_slice(bytes).map_err(|_| BatchError::NotAnArray)?;
        Self::from_value(body, max_len)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entry(index: usize, item: Value) -> Result<StatEntry, BatchError> {
    let mut object = match item {
        Value::Object(object) => object,
        _ => return Err(BatchError::EntryNotAnObject { index }),
    };

    let steam_id = take_id(&mut object, index, STEAM_ID_KEY)?;
    let server_id = take_id(&mut object, index, SERVER_ID_KEY)?;

    let codes = CodeRegistry::global();
    let mut stats = Vec::with_capacity(object.len());
    let mut unknown_keys = Vec::new();
    for (key, value) in object {
        if codes.decode(&key).is_none() {
            unknown_keys.push(key);
            continue;
        }
        let amount = integer_value(&value).ok_or_else(|| BatchError::NonIntegerValue {
            index,
            key: key.clone(),
        })?;
        stats.push((key, amount));
    }

    Ok(StatEntry {
        index,
        key: StatKey {
            steam_id,
            server_id,
        },
        stats,
        unknown_keys,
    })
}

fn take_id(
    object: &mut serde_json::Map<String, Value>,
    index: usize,
    field: &'static str,
) -> Result<String, BatchError> {
    match object.remove(field) {
        None | Some(Value::Null) => Err(BatchError::MissingField { index, field }),
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        Some(_) => Err(BatchError::InvalidId { index, field }),
    }
}

fn integer_value(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from)),
        _ => None,
    }
}
