//! Request and response types for the stats endpoints.

use serde::{Deserialize, Serialize};
use statboard_core::{Category, CodeRegistry};

// ============================================================================
// INGEST
// ============================================================================

/// Why an entry was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `serverId` is not in the registered server set
    UnregisteredServer,
    /// `steamId` is not a known player
    UnknownPlayer,
    /// A write failed; tables written before the failure keep their increments
    WriteFailed,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::UnregisteredServer => "unregistered_server",
            SkipReason::UnknownPlayer => "unknown_player",
            SkipReason::WriteFailed => "write_failed",
        }
    }
}

/// Why a single field of an entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Not a wire code
    UnknownCode,
    /// Column has no owning table after a registry reload
    Unroutable,
    /// Counters only increase
    NegativeValue,
    /// Does not fit a BIGINT counter increment
    OutOfRange,
}

impl DropReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DropReason::UnknownCode => "unknown_code",
            DropReason::Unroutable => "unroutable",
            DropReason::NegativeValue => "negative_value",
            DropReason::OutOfRange => "out_of_range",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SkippedEntry {
    /// Position of the entry in the submitted array
    pub index: usize,
    pub steam_id: String,
    pub server_id: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DroppedField {
    /// Position of the entry in the submitted array
    pub index: usize,
    /// Wire key as submitted
    pub key: String,
    pub reason: DropReason,
}

/// Response for `POST /stats`. `success` is true whenever the batch was
/// structurally valid, even if some entries were skipped.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub success: bool,
    /// Entries applied in full
    pub processed: usize,
    pub skipped: Vec<SkippedEntry>,
    pub dropped_fields: Vec<DroppedField>,
}

// ============================================================================
// CODE TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct WireCodeView {
    pub code: String,
    pub column: String,
    pub default_category: Category,
}

/// Response for `GET /stats/codes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CodeTableResponse {
    pub version: u32,
    pub codes: Vec<WireCodeView>,
}

impl CodeTableResponse {
    pub fn from_registry(registry: &CodeRegistry) -> Self {
        Self {
            version: registry.version(),
            codes: registry
                .entries()
                .iter()
                .map(|w| WireCodeView {
                    code: w.code.to_string(),
                    column: w.column.to_string(),
                    default_category: w.default_category,
                })
                .collect(),
        }
    }
}

// ============================================================================
// TABS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TabColumn {
    pub column: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub display_order: i32,
    /// Wire code, when the column has one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TabView {
    pub category: Category,
    /// Value accepted by `tab=`
    pub table: String,
    pub short_name: String,
    /// Whether `sortField=kdr` is available
    pub kdr: bool,
    pub columns: Vec<TabColumn>,
}

/// Response for `GET /stats/tabs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct TabsResponse {
    pub registry_version: u64,
    pub tabs: Vec<TabView>,
}

/// Response for `POST /stats/registry/invalidate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct RegistryReloadResponse {
    pub version: u64,
    pub routes: usize,
    pub loaded_at: String,
}
