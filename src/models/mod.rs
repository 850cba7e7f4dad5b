//! Domain models for the tableroll engine.
//!
//! This module contains the core data structures used throughout the engine:
//!
//! - [`RollMode`] - how a table is rolled (uniform, weighted, ranged)
//! - [`GroupKey`] - which role a table plays (types, encounters, rewards)
//! - [`Region`] - one row of the region registry
//! - [`TableDef`] / [`TableEntry`] / [`TableData`] - one normalized sheet
//! - [`NormalizedBatch`] - everything a workbook produced, tenant-unbound
//! - [`ImportCounts`] - what a successful import reports back

use serde::{Deserialize, Serialize};

// =============================================================================
// Roll Mode
// =============================================================================

/// The draw algorithm for a table, detected once at import time from the
/// sheet's column set and stored alongside the table definition.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RollMode {
    /// Every entry is equally likely.
    Uniform,
    /// Entries carry positive integer weights.
    Weight,
    /// Entries carry disjoint `[min, max]` intervals; a d`max_roll` is rolled.
    Range,
}

impl RollMode {
    /// Storage code for this mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::Weight => "weight",
            Self::Range => "range",
        }
    }

    /// Parse a storage code back into a mode.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "uniform" => Some(Self::Uniform),
            "weight" => Some(Self::Weight),
            "range" => Some(Self::Range),
            _ => None,
        }
    }
}

impl std::fmt::Display for RollMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Group Key
// =============================================================================

/// Which of the three table groups a definition belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// The per-region list of encounter types; its entries' `result` values
    /// are the type keys the other two groups are keyed by.
    EncounterType,
    /// One encounter table per declared type.
    Encounter,
    /// One reward table per declared type.
    Reward,
}

impl GroupKey {
    /// Storage code for this group.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EncounterType => "encounter_type",
            Self::Encounter => "encounter",
            Self::Reward => "reward",
        }
    }

    /// Parse a storage code back into a group.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "encounter_type" => Some(Self::EncounterType),
            "encounter" => Some(Self::Encounter),
            "reward" => Some(Self::Reward),
            _ => None,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Region
// =============================================================================

/// One row of the region registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Region {
    /// Positive integer, unique within the tenant.
    pub region_id: i64,
    /// Display name.
    pub region_name: String,
    /// Original sheet order, used for UI listing.
    pub sort_order: i64,
}

// =============================================================================
// Table Definition & Entries
// =============================================================================

/// The normalized identity of one logical sheet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableDef {
    pub group: GroupKey,
    /// None for the non-regional layout.
    pub region_id: Option<i64>,
    /// None only for the `encounter_type` group.
    pub type_key: Option<String>,
    pub roll_mode: RollMode,
    /// Cached upper bound for range mode (max of all `max` cells).
    pub max_roll: Option<i64>,
}

/// One row of a table. Which optional fields are populated is fully
/// determined by the owning table's roll mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableEntry {
    pub min_roll: Option<i64>,
    pub max_roll: Option<i64>,
    pub weight: Option<i64>,
    pub result: String,
}

impl TableEntry {
    pub fn uniform(result: impl Into<String>) -> Self {
        Self {
            min_roll: None,
            max_roll: None,
            weight: None,
            result: result.into(),
        }
    }

    pub fn weighted(weight: i64, result: impl Into<String>) -> Self {
        Self {
            min_roll: None,
            max_roll: None,
            weight: Some(weight),
            result: result.into(),
        }
    }

    pub fn ranged(min_roll: i64, max_roll: i64, result: impl Into<String>) -> Self {
        Self {
            min_roll: Some(min_roll),
            max_roll: Some(max_roll),
            weight: None,
            result: result.into(),
        }
    }
}

/// A table definition together with its entries in sheet order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableData {
    pub def: TableDef,
    pub entries: Vec<TableEntry>,
}

// =============================================================================
// Normalized Batch
// =============================================================================

/// Everything a validated workbook normalizes into. Not yet bound to a
/// tenant; the tenant id is supplied when the batch is committed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedBatch {
    /// Empty for the non-regional layout.
    pub regions: Vec<Region>,
    pub tables: Vec<TableData>,
}

impl NormalizedBatch {
    /// Summary counts for the import report.
    pub fn counts(&self) -> ImportCounts {
        let mut counts = ImportCounts {
            regions: self.regions.len(),
            ..ImportCounts::default()
        };
        for table in &self.tables {
            match table.def.group {
                GroupKey::EncounterType => counts.encounter_types += table.entries.len(),
                GroupKey::Encounter => counts.encounter_entries += table.entries.len(),
                GroupKey::Reward => counts.reward_entries += table.entries.len(),
            }
        }
        counts
    }

    /// Look up a table by its unique key within the batch.
    pub fn table(
        &self,
        group: GroupKey,
        region_id: Option<i64>,
        type_key: Option<&str>,
    ) -> Option<&TableData> {
        self.tables.iter().find(|t| {
            t.def.group == group
                && t.def.region_id == region_id
                && t.def.type_key.as_deref() == type_key
        })
    }
}

/// What a successful import reports back to the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImportCounts {
    pub regions: usize,
    pub encounter_types: usize,
    pub encounter_entries: usize,
    pub reward_entries: usize,
}
