//! Structural validation for a single sheet.
//!
//! Two steps, both pure:
//!
//! 1. **Mode detection** - classify the sheet as uniform, weighted or ranged
//!    from its column set alone. `min`/`max` columns take precedence over
//!    `weight`; unknown columns are ignored so annotated templates keep
//!    importing.
//! 2. **Row validation** - enforce the per-mode invariants top-to-bottom so
//!    every defect can cite its 1-based spreadsheet row, and produce the
//!    normalized entries plus the cached `max_roll` for ranged sheets.
//!
//! Nothing here touches storage; the normalizer aggregates the defects of
//! all sheets before anything is committed.

use std::collections::HashMap;

use crate::error::Defect;
use crate::models::{RollMode, TableEntry};
use crate::workbook::{cell_at, cell_int, cell_str, Sheet};

/// Which column carries a sheet's rollable value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueColumn {
    /// Type sheets: the `type` column, whose values key the other groups.
    Type,
    /// Encounter and reward sheets: the `result` column.
    Result,
}

impl ValueColumn {
    pub fn header(&self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Result => "result",
        }
    }

    fn empty_sheet_message(&self) -> &'static str {
        match self {
            Self::Type => "No types found.",
            Self::Result => "No results found.",
        }
    }
}

/// A fully validated sheet: its detected mode, normalized entries in sheet
/// order, and the cached range-mode upper bound.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub roll_mode: RollMode,
    pub entries: Vec<TableEntry>,
    pub max_roll: Option<i64>,
}

/// Classify a sheet's roll mode from its header map.
///
/// Mode precedence:
/// - if either `min` or `max` exists, the sheet is ranged (missing one of
///   the pair is a defect),
/// - else `weight` makes it weighted,
/// - else uniform.
pub fn detect_mode(sheet_name: &str, headers: &HashMap<String, usize>) -> (RollMode, Vec<Defect>) {
    let has_min = headers.contains_key("min");
    let has_max = headers.contains_key("max");
    let has_weight = headers.contains_key("weight");

    if has_min || has_max {
        let mut defects = Vec::new();
        if !(has_min && has_max) {
            defects.push(Defect::new(
                sheet_name,
                "Range mode requires both 'min' and 'max' columns.",
            ));
        }
        return (RollMode::Range, defects);
    }

    if has_weight {
        return (RollMode::Weight, Vec::new());
    }

    (RollMode::Uniform, Vec::new())
}

/// Validate one sheet and normalize its rows.
///
/// Every non-blank row must carry a non-empty value and numeric fields
/// consistent with the detected mode; the full defect list is returned
/// rather than the first hit.
pub fn validate_sheet(sheet: &Sheet, value_col: ValueColumn) -> Result<SheetTable, Vec<Defect>> {
    let headers = sheet.header_map();

    let Some(&value_idx) = headers.get(value_col.header()) else {
        return Err(vec![Defect::new(
            &sheet.name,
            format!("Missing required column '{}'.", value_col.header()),
        )]);
    };

    let (roll_mode, mode_defects) = detect_mode(&sheet.name, &headers);
    if !mode_defects.is_empty() {
        return Err(mode_defects);
    }

    let mut defects = Vec::new();
    let mut entries = Vec::new();
    // (min, max, row) triples for the overlap check.
    let mut ranges: Vec<(i64, i64, u32)> = Vec::new();

    for (row_no, row) in sheet.data_rows() {
        let value = cell_str(cell_at(row, value_idx));
        if value.is_empty() {
            defects.push(
                Defect::new(
                    &sheet.name,
                    format!("Missing '{}' value.", value_col.header()),
                )
                .with_row(row_no),
            );
            continue;
        }

        match roll_mode {
            RollMode::Uniform => entries.push(TableEntry::uniform(value)),
            RollMode::Weight => {
                let weight_cell = cell_at(row, headers["weight"]);
                match cell_int(weight_cell) {
                    Some(w) if w > 0 => entries.push(TableEntry::weighted(w, value)),
                    Some(w) => defects.push(
                        Defect::new(
                            &sheet.name,
                            format!("Invalid weight {w}. Must be a positive integer."),
                        )
                        .with_row(row_no),
                    ),
                    None => defects.push(
                        Defect::new(
                            &sheet.name,
                            format!(
                                "Weight '{}' is not an integer.",
                                cell_str(weight_cell)
                            ),
                        )
                        .with_row(row_no),
                    ),
                }
            }
            RollMode::Range => {
                let min = cell_int(cell_at(row, headers["min"]));
                let max = cell_int(cell_at(row, headers["max"]));
                match (min, max) {
                    (Some(min), Some(max)) if min <= max => {
                        ranges.push((min, max, row_no));
                        entries.push(TableEntry::ranged(min, max, value));
                    }
                    (Some(min), Some(max)) => defects.push(
                        Defect::new(
                            &sheet.name,
                            format!("Invalid range: min {min} is greater than max {max}."),
                        )
                        .with_row(row_no),
                    ),
                    _ => defects.push(
                        Defect::new(&sheet.name, "'min' and 'max' must be integers.")
                            .with_row(row_no),
                    ),
                }
            }
        }
    }

    // Ranged entries must be pairwise disjoint, regardless of row order.
    ranges.sort_by_key(|&(min, max, _)| (min, max));
    for pair in ranges.windows(2) {
        let (prev_min, prev_max, prev_row) = pair[0];
        let (cur_min, cur_max, cur_row) = pair[1];
        if cur_min <= prev_max {
            defects.push(
                Defect::new(
                    &sheet.name,
                    format!(
                        "Overlapping ranges with row {prev_row}: \
                         {prev_min}-{prev_max} overlaps {cur_min}-{cur_max}."
                    ),
                )
                .with_row(cur_row),
            );
        }
    }

    if entries.is_empty() && defects.is_empty() {
        defects.push(Defect::new(&sheet.name, value_col.empty_sheet_message()));
    }

    if !defects.is_empty() {
        return Err(defects);
    }

    let max_roll = match roll_mode {
        RollMode::Range => {
            let mr = ranges.iter().map(|&(_, max, _)| max).max().unwrap_or(0);
            (mr > 0).then_some(mr)
        }
        _ => None,
    };

    Ok(SheetTable {
        roll_mode,
        entries,
        max_roll,
    })
}
