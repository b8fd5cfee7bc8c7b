//! SQL Builders
//!
//! Builds the two dynamic statements of the service: the per-table
//! insert-or-increment and the leaderboard aggregate. Values always travel as
//! bind parameters. The only identifiers written into SQL text are
//! [`statboard_core::Category`] table names and validated
//! [`statboard_core::Identifier`] column names, both double-quoted.

pub mod increment;
pub mod leaderboard;

pub use increment::build_increment;
pub use leaderboard::{build_count, build_page, escape_like};

// ============================================================================
// SQL PARAMETER TYPE
// ============================================================================

/// Type-erased SQL parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Text value
    Text(String),
    /// BIGINT value
    BigInt(i64),
}

impl SqlParam {
    /// Convert this SqlParam to a reference usable with tokio_postgres.
    pub fn as_to_sql(&self) -> &(dyn tokio_postgres::types::ToSql + Sync) {
        match self {
            SqlParam::Text(v) => v,
            SqlParam::BigInt(v) => v,
        }
    }
}

/// A statement and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl BuiltQuery {
    /// Parameters in the form tokio_postgres expects.
    pub fn sql_params(&self) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
        self.params.iter().map(SqlParam::as_to_sql).collect()
    }

    /// Append a parameter and return its `$n` placeholder.
    fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }
}
