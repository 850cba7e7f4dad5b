//! # Tableroll - spreadsheet-defined random encounter tables
//!
//! Tableroll imports an encounter workbook into SQLite and rolls composed
//! random encounters (region → type → encounter → reward) from the stored
//! tables.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Workbook   │────▶│  Normalize   │────▶│   Store     │────▶│    Roll     │
//! │ (sheet grid)│     │ (detect +    │     │ (SQLite,    │     │ (uniform /  │
//! │             │     │  validate)   │     │  atomic)    │     │  weight /   │
//! └─────────────┘     └──────────────┘     └─────────────┘     │  range)     │
//!                                                              └─────────────┘
//! ```
//!
//! Imports are all-or-nothing per guild: either the whole workbook validates
//! and atomically replaces the previous tables, or the complete defect list
//! comes back and nothing changes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tableroll::{pipeline, roll, store, Workbook};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = store::connect("encounters.db").await?;
//!     pipeline::import_workbook(&pool, guild_id, &Workbook::template()).await?;
//!
//!     let result = roll::roll_encounter(&pool, guild_id, None).await?;
//!     println!("{}: {}", result.encounter_type.result, result.encounter.result);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Defects and layered error types
//! - [`models`] - Domain models (RollMode, TableDef, NormalizedBatch)
//! - [`workbook`] - Sheet grid model, naming convention, JSON codec
//! - [`validation`] - Roll-mode detection and per-row checks
//! - [`normalize`] - Whole-workbook normalization
//! - [`store`] - SQLite persistence
//! - [`roll`] - Draw engine and encounter composition
//! - [`pipeline`] - High-level import/export
//! - [`travel`] - Overland/sea travel estimators
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Workbook handling
pub mod normalize;
pub mod validation;
pub mod workbook;

// Storage
pub mod store;

// Rolling
pub mod roll;

// High-level API
pub mod pipeline;

// Travel estimation
pub mod travel;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors
// =============================================================================

pub use error::{Defect, ExportError, ImportError, RollError, ServerError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    GroupKey, ImportCounts, NormalizedBatch, Region, RollMode, TableData, TableDef, TableEntry,
};

// =============================================================================
// Re-exports - Workbook
// =============================================================================

pub use workbook::{Sheet, Workbook};

// =============================================================================
// Re-exports - Engine
// =============================================================================

pub use normalize::normalize_workbook;
pub use pipeline::{export_workbook, export_workbook_bytes, import_workbook, import_workbook_bytes};
pub use roll::{roll_encounter, roll_from_table, EncounterRoll, Rolled};

// =============================================================================
// Re-exports - Config & Server
// =============================================================================

pub use api::{start_server, AppState};
pub use config::Config;
