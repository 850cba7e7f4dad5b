//! Error types for the tableroll engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`Defect`] - a single import problem, tied to a sheet and optional row
//! - [`ImportError`] - workbook import failures (defect list, codec, storage)
//! - [`RollError`] - roll-time failures (empty table, unresolved range, ...)
//! - [`ServerError`] - top-level HTTP errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::models::GroupKey;

// =============================================================================
// Import Defects
// =============================================================================

/// A single problem found while importing a workbook, with enough context
/// (sheet name, row number) to fix the workbook.
#[derive(Debug, Clone, Serialize)]
pub struct Defect {
    /// Sheet the problem was found on (or the name of a missing sheet).
    pub sheet: String,
    /// 1-based spreadsheet row, where row 1 is the header. Absent for
    /// sheet-level problems such as a missing sheet or column.
    pub row: Option<u32>,
    pub message: String,
}

impl Defect {
    pub fn new(sheet: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sheet: sheet.into(),
            row: None,
            message: message.into(),
        }
    }

    pub fn with_row(mut self, row: u32) -> Self {
        self.row = Some(row);
        self
    }
}

impl std::fmt::Display for Defect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.row {
            Some(row) => write!(f, "{} row {}: {}", self.sheet, row, self.message),
            None => write!(f, "{}: {}", self.sheet, self.message),
        }
    }
}

// =============================================================================
// Import Errors
// =============================================================================

/// Errors from the import pipeline.
///
/// A failed import never leaves partial state behind: either the defect list
/// stopped the workbook before the store was touched, or the storage
/// transaction rolled back.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The workbook document could not be decoded at all.
    #[error("Failed to decode workbook: {0}")]
    Codec(#[from] serde_json::Error),

    /// The workbook decoded but failed validation; all defects are listed.
    #[error("Workbook has {} defect(s)", .0.len())]
    Invalid(Vec<Defect>),

    /// The storage transaction failed; nothing was committed.
    #[error("Import failed during database write: {0}")]
    Store(#[from] sqlx::Error),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors from the export pipeline.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to encode workbook: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

// =============================================================================
// Roll Errors
// =============================================================================

/// Errors from a single roll attempt.
///
/// These indicate authoring defects or bad lookups, not transient faults,
/// and are never retried automatically.
#[derive(Debug, Error)]
pub enum RollError {
    /// The table exists but has no rollable entries.
    #[error("Table has no entries")]
    EmptyTable,

    /// A range-mode draw landed in a gap between entry intervals.
    #[error("No range matched roll {draw} (d{max_roll})")]
    UnresolvedRange { draw: i64, max_roll: i64 },

    /// No table stored under the requested key.
    #[error("Missing table: {group} region={region_id:?} type={type_key:?}")]
    MissingTable {
        group: GroupKey,
        region_id: Option<i64>,
        type_key: Option<String>,
    },

    /// The supplied region id is not one of the tenant's regions.
    #[error("Unknown region {region_id} for this server")]
    UnknownRegion { region_id: i64 },

    /// The tenant has regions configured but no region was selected.
    #[error("A region must be selected for this server")]
    RegionRequired,

    /// Storage read failed.
    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),
}

// =============================================================================
// Server Errors (top-level)
// =============================================================================

/// HTTP server errors wrapping the layers below.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Roll error: {0}")]
    Roll(#[from] RollError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::Import(ImportError::Invalid(defects)) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "Import failed. No changes were made.",
                    "defects": defects,
                }),
            ),
            ServerError::Import(ImportError::Codec(ref e)) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": format!("Failed to decode workbook: {e}") }),
            ),
            ServerError::Import(ImportError::Store(ref e)) => {
                tracing::error!("import transaction failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Import failed during database write. No changes were made." }),
                )
            }
            ServerError::Roll(RollError::Store(ref e)) => {
                tracing::error!("roll query failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            ServerError::Roll(ref e) => {
                let status = match e {
                    RollError::MissingTable { .. } | RollError::EmptyTable => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, json!({ "error": e.to_string() }))
            }
            ServerError::Export(ref e) => {
                tracing::error!("export failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Export failed" }),
                )
            }
            ServerError::Store(ref e) => {
                tracing::error!("database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            ServerError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for roll operations.
pub type RollResult<T> = Result<T, RollError>;

/// Result type for server handlers.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defect_display() {
        let d = Defect::new(
            "Encounter - 1 - Combat",
            "Invalid weight -3. Must be a positive integer.",
        )
        .with_row(5);
        let msg = d.to_string();
        assert!(msg.contains("Encounter - 1 - Combat"));
        assert!(msg.contains("row 5"));
        assert!(msg.contains("positive integer"));
    }

    #[test]
    fn test_defect_without_row() {
        let d = Defect::new("Reward - 1 - Combat", "Missing required tab.");
        assert_eq!(d.to_string(), "Reward - 1 - Combat: Missing required tab.");
    }

    #[test]
    fn test_error_conversion_chain() {
        // ImportError -> ServerError
        let import_err = ImportError::Invalid(vec![Defect::new("Regions", "No valid rows.")]);
        let server_err: ServerError = import_err.into();
        assert!(server_err.to_string().contains("defect"));

        // RollError -> ServerError
        let roll_err = RollError::UnknownRegion { region_id: 7 };
        let server_err: ServerError = roll_err.into();
        assert!(server_err.to_string().contains("7"));
    }

    #[test]
    fn test_unresolved_range_message() {
        let err = RollError::UnresolvedRange {
            draw: 55,
            max_roll: 100,
        };
        let msg = err.to_string();
        assert!(msg.contains("55"));
        assert!(msg.contains("d100"));
    }
}
