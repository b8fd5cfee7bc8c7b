//! Error types for statboard operations

use crate::Category;
use thiserror::Error;

/// Domain errors raised while validating leaderboard requests and identifiers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatError {
    #[error("Unknown leaderboard tab: {tab}")]
    UnknownCategory { tab: String },

    #[error("Invalid identifier '{raw}': {reason}")]
    InvalidIdentifier { raw: String, reason: &'static str },

    #[error("Unknown sort field '{field}' for {category}")]
    UnknownSortField { field: String, category: Category },

    #[error("Invalid sort order '{value}', expected ASC or DESC")]
    InvalidSortOrder { value: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Storage layer errors.
///
/// Messages may contain backend detail and are meant for logs, not callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Storage backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed during {operation}: {reason}")]
    QueryFailed {
        operation: &'static str,
        reason: String,
    },

    #[error("Column {column} is not a counter of {table}")]
    UnknownColumn { table: &'static str, column: String },

    #[error("Counter overflow on {table}.{column}")]
    CounterOverflow { table: &'static str, column: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Result type for domain validation.
pub type StatResult<T> = Result<T, StatError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
