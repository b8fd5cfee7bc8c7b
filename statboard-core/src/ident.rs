//! Validated SQL identifiers.
//!
//! Table and column names cannot go through parameter binding, so every
//! column name that ends up in SQL text is an [`Identifier`]: lowercase ASCII
//! letters, digits and underscores, starting with a letter or underscore,
//! at most 63 bytes (the Postgres `NAMEDATALEN` limit). Such a name can be
//! double-quoted without escaping.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{StatError, StatResult};

/// Longest identifier Postgres keeps without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Key columns of every category table. Never counters.
pub const KEY_COLUMNS: [&str; 2] = ["steam_id", "server_id"];

/// Fixed leaderboard row fields that counters are flattened next to.
pub const RESERVED_ROW_FIELDS: [&str; 2] = ["username", "kdr"];

/// A column name proven safe to interpolate into SQL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate a raw name.
    pub fn parse(raw: &str) -> StatResult<Self> {
        let invalid = |reason| StatError::InvalidIdentifier {
            raw: raw.to_string(),
            reason,
        };

        let mut chars = raw.chars();
        let first = chars.next().ok_or_else(|| invalid("empty"))?;
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(invalid("longer than 63 bytes"));
        }
        if !(first.is_ascii_lowercase() || first == '_') {
            return Err(invalid("must start with a lowercase letter or underscore"));
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(invalid("only lowercase letters, digits and underscores are allowed"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted form for SQL text.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }

    /// Whether this is one of the `(steam_id, server_id)` key columns.
    pub fn is_key_column(&self) -> bool {
        KEY_COLUMNS.contains(&self.0.as_str())
    }

    /// Whether a counter with this name would collide with a fixed
    /// leaderboard row field.
    pub fn is_reserved_row_field(&self) -> bool {
        RESERVED_ROW_FIELDS.contains(&self.0.as_str())
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = StatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.0
    }
}
