//! Leaderboard requests, validated queries and result pages.
//!
//! A [`LeaderboardRequest`] is whatever arrived on the query string. It only
//! becomes a [`LeaderboardQuery`] after every identifier in it has been
//! checked against the live [`CategorySchema`]; the query type has no public
//! constructor, so SQL builders can only ever see validated input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{StatError, StatResult};
use crate::{Category, CategorySchema, Identifier};

/// Sort key name reserved for the kill/death ratio.
pub const KDR_SORT_FIELD: &str = "kdr";

/// Server filter value meaning "all servers".
pub const GLOBAL_SERVER: &str = "global";

/// Longest accepted username/steam id filter.
pub const MAX_FILTER_LEN: usize = 64;

/// Longest accepted server id filter.
pub const MAX_SERVER_ID_LEN: usize = 64;

/// Raw query-string parameters. Every field is optional text; parsing and
/// validation happen in [`LeaderboardQuery::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema, utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRequest {
    /// Category table name or short name (`pvp_stats` or `pvp`)
    pub tab: Option<String>,
    /// 1-based page number
    pub page: Option<String>,
    pub page_size: Option<String>,
    /// Counter column name or `kdr`
    pub sort_field: Option<String>,
    /// `ASC` or `DESC`
    pub sort_order: Option<String>,
    /// Username substring or exact steam id
    pub filter: Option<String>,
    /// Server id or `global`
    pub server: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: &str) -> StatResult<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(StatError::InvalidSortOrder {
                value: raw.to_string(),
            }),
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// What a leaderboard page is ordered by. Ties always fall back to steam id
/// ascending so pages never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Sum of a counter column.
    Column(Identifier),
    /// Derived kill/death ratio.
    KillDeathRatio,
    /// Steam id only; used when the category has no counter columns yet.
    SteamId,
}

/// Which servers contribute to the sums.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerScope {
    Global,
    Server(String),
}

/// Page size bounds applied during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_page_size: 10,
            max_page_size: 100,
        }
    }
}

/// A leaderboard query whose identifiers all come from a trusted schema.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardQuery {
    category: Category,
    columns: Vec<Identifier>,
    include_kdr: bool,
    sort: SortKey,
    direction: SortDirection,
    page: u32,
    page_size: u32,
    filter: Option<String>,
    server: ServerScope,
}

impl LeaderboardQuery {
    /// Validate raw parameters against the live schema of `schema.category()`.
    pub fn validate(
        req: &LeaderboardRequest,
        schema: &CategorySchema,
        limits: PageLimits,
    ) -> StatResult<Self> {
        let category = schema.category();
        let include_kdr = schema.supports_kill_death_ratio();

        let page = match non_empty(&req.page) {
            None => 1,
            Some(raw) => parse_positive(raw, "page")?,
        };
        let page_size = match non_empty(&req.page_size) {
            None => limits.default_page_size,
            Some(raw) => parse_positive(raw, "pageSize")?,
        }
        .clamp(1, limits.max_page_size.max(1));

        let sort = match non_empty(&req.sort_field) {
            None => schema
                .columns()
                .first()
                .cloned()
                .map(SortKey::Column)
                .unwrap_or(SortKey::SteamId),
            Some(raw) => {
                let wanted = raw.to_ascii_lowercase();
                if wanted == KDR_SORT_FIELD && include_kdr {
                    SortKey::KillDeathRatio
                } else if let Some(column) = schema.column(&wanted) {
                    SortKey::Column(column.clone())
                } else {
                    return Err(StatError::UnknownSortField {
                        field: raw.to_string(),
                        category,
                    });
                }
            }
        };

        let direction = match non_empty(&req.sort_order) {
            None => SortDirection::default(),
            Some(raw) => SortDirection::parse(raw)?,
        };

        let filter = match non_empty(&req.filter) {
            None => None,
            Some(raw) if raw.chars().count() > MAX_FILTER_LEN => {
                return Err(StatError::InvalidValue {
                    field: "filter".to_string(),
                    reason: format!("longer than {} characters", MAX_FILTER_LEN),
                })
            }
            Some(raw) => Some(raw.to_string()),
        };

        let server = match non_empty(&req.server) {
            None => ServerScope::Global,
            Some(raw) if raw.eq_ignore_ascii_case(GLOBAL_SERVER) => ServerScope::Global,
            Some(raw) if raw.len() > MAX_SERVER_ID_LEN => {
                return Err(StatError::InvalidValue {
                    field: "server".to_string(),
                    reason: format!("longer than {} bytes", MAX_SERVER_ID_LEN),
                })
            }
            Some(raw) => ServerScope::Server(raw.to_string()),
        };

        Ok(Self {
            category,
            columns: schema.columns().to_vec(),
            include_kdr,
            sort,
            direction,
            page,
            page_size,
            filter,
            server,
        })
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Counter columns to sum, in schema order.
    pub fn columns(&self) -> &[Identifier] {
        &self.columns
    }

    pub fn include_kdr(&self) -> bool {
        self.include_kdr
    }

    pub fn sort(&self) -> &SortKey {
        &self.sort
    }

    pub fn direction(&self) -> SortDirection {
        self.direction
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    pub fn server(&self) -> &ServerScope {
        &self.server
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_positive(raw: &str, field: &str) -> StatResult<u32> {
    match raw.parse::<u32>() {
        Ok(value) if value >= 1 => Ok(value),
        _ => Err(StatError::InvalidValue {
            field: field.to_string(),
            reason: format!("expected a positive integer, got '{}'", raw),
        }),
    }
}

/// One aggregated row: a player's counters summed over the selected servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub steam_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kdr: Option<f64>,
    /// Summed counters keyed by column name
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub stats: BTreeMap<String, u128>,
}

/// One page of a leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPage {
    pub data: Vec<LeaderboardRow>,
    pub total_pages: u64,
    pub total_count: u64,
}

impl LeaderboardPage {
    pub fn new(data: Vec<LeaderboardRow>, total_count: u64, page_size: u32) -> Self {
        Self {
            data,
            total_pages: total_pages(total_count, page_size),
            total_count,
        }
    }
}

/// `ceil(total_count / page_size)`.
pub fn total_pages(total_count: u64, page_size: u32) -> u64 {
    if page_size == 0 {
        return 0;
    }
    total_count.div_ceil(u64::from(page_size))
}

/// Kill/death ratio with the zero-deaths policy: a player who never died
/// ranks by raw kills. Otherwise the ratio is rounded to two decimals, half
/// away from zero, matching `ROUND(numeric, 2)`.
pub fn kill_death_ratio(kills: u128, deaths: u128) -> f64 {
    if deaths == 0 {
        return kills as f64;
    }
    let ratio = kills as f64 / deaths as f64;
    (ratio * 100.0).round() / 100.0
}
