//! In-memory workbook model with header-row-1 semantics.
//!
//! The engine never touches spreadsheet *files*; it consumes and produces
//! this document model, which serializes to JSON bytes at the transport
//! boundary. Cells are [`serde_json::Value`]s so a grid coming off any cell
//! codec (strings, ints, floats, blanks) round-trips unchanged.
//!
//! Also home to the sheet-naming convention shared by import and export:
//!
//! ```text
//! Default layout              Regional layout
//! ---------------             ---------------
//! Encounter Types             Regions
//! Encounter - <Type>          Encounter Types - <region_id>
//! Reward - <Type>             Encounter - <region_id> - <Type>
//!                             Reward - <region_id> - <Type>
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::models::{GroupKey, NormalizedBatch, RollMode, TableEntry};

/// Name of the region registry sheet.
pub const REGIONS_SHEET: &str = "Regions";

// =============================================================================
// Sheet naming convention
// =============================================================================

/// Sheet holding the encounter-type list for a region.
pub fn encounter_types_sheet(region_id: Option<i64>) -> String {
    match region_id {
        None => "Encounter Types".to_string(),
        Some(rid) => format!("Encounter Types - {rid}"),
    }
}

/// Sheet holding the encounter table for a region and type.
pub fn encounter_sheet(region_id: Option<i64>, type_key: &str) -> String {
    match region_id {
        None => format!("Encounter - {type_key}"),
        Some(rid) => format!("Encounter - {rid} - {type_key}"),
    }
}

/// Sheet holding the reward table for a region and type.
pub fn reward_sheet(region_id: Option<i64>, type_key: &str) -> String {
    match region_id {
        None => format!("Reward - {type_key}"),
        Some(rid) => format!("Reward - {rid} - {type_key}"),
    }
}

// =============================================================================
// Cell coercion
// =============================================================================

/// Header cell as the exact lookup key. Header matching is case- and
/// whitespace-sensitive: `Weight` or `result ` do not count as the
/// `weight`/`result` columns.
pub fn header_key(cell: &Value) -> String {
    match cell {
        Value::String(s) => s.clone(),
        other => cell_str(other),
    }
}

/// Cell as a trimmed display string; blanks and nulls become "".
pub fn cell_str(cell: &Value) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.to_string(),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Cell as an integer, if it holds one. Accepts integer numbers, whole
/// floats (spreadsheet codecs often deliver `3.0`), and numeric strings.
pub fn cell_int(cell: &Value) -> Option<i64> {
    match cell {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.fract() == 0.0 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            let f: f64 = s.parse().ok()?;
            if f.fract() == 0.0 {
                Some(f as i64)
            } else {
                None
            }
        }
        _ => None,
    }
}

// =============================================================================
// Sheet
// =============================================================================

/// One sheet: a name and an ordered grid of rows, row 0 being the header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    /// Append a row to the grid.
    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    /// Map header names to column indexes, exactly as written. The first
    /// occurrence of a header wins; empty headers are skipped.
    pub fn header_map(&self) -> HashMap<String, usize> {
        let mut map = HashMap::new();
        if let Some(header) = self.rows.first() {
            for (idx, cell) in header.iter().enumerate() {
                let key = header_key(cell);
                if !key.is_empty() {
                    map.entry(key).or_insert(idx);
                }
            }
        }
        map
    }

    /// Data rows paired with their 1-based spreadsheet row number (the
    /// header is row 1, so data starts at 2). Fully blank rows are skipped.
    pub fn data_rows(&self) -> Vec<(u32, &Vec<Value>)> {
        self.rows
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, row)| !row.iter().all(|c| cell_str(c).is_empty()))
            .map(|(i, row)| (i as u32 + 1, row))
            .collect()
    }
}

static BLANK_CELL: Value = Value::Null;

/// Cell at `idx` in a row, tolerating ragged rows.
pub fn cell_at<'a>(row: &'a [Value], idx: usize) -> &'a Value {
    row.get(idx).unwrap_or(&BLANK_CELL)
}

// =============================================================================
// Workbook
// =============================================================================

/// An ordered collection of named sheets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheet(name).is_some()
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn push_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    /// Decode a workbook from its JSON byte representation.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode the workbook to its JSON byte representation.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Rebuild a workbook from a normalized batch, reproducing the sheet
    /// naming convention and the per-mode column layout, so the result
    /// re-imports to an identical batch.
    pub fn from_batch(batch: &NormalizedBatch) -> Self {
        let mut wb = Workbook::new();

        let region_ids: Vec<Option<i64>> = if batch.regions.is_empty() {
            vec![None]
        } else {
            let mut regions = Sheet::new(REGIONS_SHEET);
            regions.push_row(vec![json!("region_id"), json!("region_name")]);
            for r in &batch.regions {
                regions.push_row(vec![json!(r.region_id), json!(r.region_name)]);
            }
            wb.push_sheet(regions);
            batch.regions.iter().map(|r| Some(r.region_id)).collect()
        };

        for region_id in region_ids {
            let Some(type_table) = batch.table(GroupKey::EncounterType, region_id, None) else {
                continue;
            };
            wb.push_sheet(table_sheet(
                encounter_types_sheet(region_id),
                "type",
                type_table.def.roll_mode,
                &type_table.entries,
            ));

            // Types in stored order, first occurrence wins.
            let mut types: Vec<&str> = Vec::new();
            for entry in &type_table.entries {
                if !entry.result.is_empty() && !types.contains(&entry.result.as_str()) {
                    types.push(&entry.result);
                }
            }

            for type_key in types {
                if let Some(t) = batch.table(GroupKey::Encounter, region_id, Some(type_key)) {
                    wb.push_sheet(table_sheet(
                        encounter_sheet(region_id, type_key),
                        "result",
                        t.def.roll_mode,
                        &t.entries,
                    ));
                }
                if let Some(t) = batch.table(GroupKey::Reward, region_id, Some(type_key)) {
                    wb.push_sheet(table_sheet(
                        reward_sheet(region_id, type_key),
                        "result",
                        t.def.roll_mode,
                        &t.entries,
                    ));
                }
            }
        }

        wb
    }

    /// A small, valid sample workbook showing all three roll modes, served
    /// when a tenant has no data yet.
    pub fn template() -> Self {
        let mut wb = Workbook::new();

        let mut types = Sheet::new(encounter_types_sheet(None));
        types.push_row(vec![json!("type")]);
        types.push_row(vec![json!("Combat")]);
        types.push_row(vec![json!("Exploration")]);
        wb.push_sheet(types);

        let mut combat = Sheet::new(encounter_sheet(None, "Combat"));
        combat.push_row(vec![json!("min"), json!("max"), json!("result")]);
        combat.push_row(vec![json!(1), json!(40), json!("Bandits on the road")]);
        combat.push_row(vec![json!(41), json!(70), json!("A wary merchant caravan")]);
        combat.push_row(vec![json!(71), json!(100), json!("A hungry monster")]);
        wb.push_sheet(combat);

        let mut explore = Sheet::new(encounter_sheet(None, "Exploration"));
        explore.push_row(vec![json!("result")]);
        explore.push_row(vec![json!("An overgrown shrine")]);
        explore.push_row(vec![json!("A collapsed bridge")]);
        wb.push_sheet(explore);

        let mut combat_reward = Sheet::new(reward_sheet(None, "Combat"));
        combat_reward.push_row(vec![json!("weight"), json!("result")]);
        combat_reward.push_row(vec![json!(3), json!("A pouch of coins")]);
        combat_reward.push_row(vec![json!(1), json!("A jeweled dagger")]);
        wb.push_sheet(combat_reward);

        let mut explore_reward = Sheet::new(reward_sheet(None, "Exploration"));
        explore_reward.push_row(vec![json!("result")]);
        explore_reward.push_row(vec![json!("An old map fragment")]);
        explore_reward.push_row(vec![json!("Nothing of value")]);
        wb.push_sheet(explore_reward);

        wb
    }
}

/// Build one export sheet for a table. The column layout depends on the roll
/// mode; `kind` is `type` for type sheets and `result` otherwise.
fn table_sheet(title: String, kind: &str, roll_mode: RollMode, entries: &[TableEntry]) -> Sheet {
    let mut sheet = Sheet::new(title);

    match roll_mode {
        RollMode::Range => {
            sheet.push_row(vec![json!("min"), json!("max"), json!(kind)]);
            for e in entries {
                sheet.push_row(vec![json!(e.min_roll), json!(e.max_roll), json!(e.result)]);
            }
        }
        RollMode::Weight => {
            sheet.push_row(vec![json!("weight"), json!(kind)]);
            for e in entries {
                sheet.push_row(vec![json!(e.weight), json!(e.result)]);
            }
        }
        RollMode::Uniform => {
            sheet.push_row(vec![json!(kind)]);
            for e in entries {
                sheet.push_row(vec![json!(e.result)]);
            }
        }
    }

    sheet
}
