//! Whole-workbook normalization.
//!
//! Walks the sheet-naming convention (region registry, per-region type
//! sheet, per-type encounter/reward sheets), runs detection + validation on
//! every sheet, and produces a tenant-unbound [`NormalizedBatch`].
//!
//! Failure policy: defects are accumulated across *all* sheets so one import
//! attempt reports the complete list. A defect in one region's type sheet
//! suppresses only that region's dependent sheets; other regions still get
//! parsed. If any defect exists the batch is never produced, so nothing
//! partial can reach the store.

use crate::error::Defect;
use crate::models::{GroupKey, NormalizedBatch, Region, TableData, TableDef};
use crate::validation::{validate_sheet, SheetTable, ValueColumn};
use crate::workbook::{
    cell_at, cell_int, cell_str, encounter_sheet, encounter_types_sheet, reward_sheet, Workbook,
    REGIONS_SHEET,
};

/// Parse the region registry sheet, if present.
///
/// Required columns: `region_id` (positive integer, unique) and
/// `region_name` (non-empty). Rows keep their sheet order via `sort_order`.
/// A workbook without a `Regions` sheet is simply non-regional.
pub fn parse_regions(wb: &Workbook) -> (Vec<Region>, Vec<Defect>) {
    let Some(sheet) = wb.sheet(REGIONS_SHEET) else {
        return (Vec::new(), Vec::new());
    };

    let headers = sheet.header_map();
    let (Some(&id_idx), Some(&name_idx)) = (headers.get("region_id"), headers.get("region_name"))
    else {
        return (
            Vec::new(),
            vec![Defect::new(
                REGIONS_SHEET,
                "Regions tab must have columns: region_id, region_name.",
            )],
        );
    };

    let mut defects = Vec::new();
    let mut regions: Vec<Region> = Vec::new();

    for (row_no, row) in sheet.data_rows() {
        let region_id = cell_int(cell_at(row, id_idx));
        let region_name = cell_str(cell_at(row, name_idx));

        let Some(region_id) = region_id else {
            defects.push(
                Defect::new(REGIONS_SHEET, "region_id must be an integer.").with_row(row_no),
            );
            continue;
        };
        if region_id <= 0 {
            defects.push(
                Defect::new(REGIONS_SHEET, "region_id must be a positive integer.")
                    .with_row(row_no),
            );
            continue;
        }
        if region_name.is_empty() {
            defects.push(Defect::new(REGIONS_SHEET, "region_name is required.").with_row(row_no));
            continue;
        }
        if regions.iter().any(|r| r.region_id == region_id) {
            defects.push(
                Defect::new(REGIONS_SHEET, format!("Duplicate region_id {region_id}."))
                    .with_row(row_no),
            );
            continue;
        }

        regions.push(Region {
            region_id,
            region_name,
            sort_order: regions.len() as i64,
        });
    }

    (regions, defects)
}

/// Normalize a whole workbook into a batch, or the full defect list.
///
/// A `Reward Types` sheet, if present, is ignored; reward tables are keyed
/// off the encounter type.
pub fn normalize_workbook(wb: &Workbook) -> Result<NormalizedBatch, Vec<Defect>> {
    let mut defects = Vec::new();

    let regional = wb.has_sheet(REGIONS_SHEET);
    let (regions, region_defects) = parse_regions(wb);
    defects.extend(region_defects);

    let region_ids: Vec<Option<i64>> = if regional {
        if !defects.is_empty() {
            return Err(defects);
        }
        if regions.is_empty() {
            return Err(vec![Defect::new(
                REGIONS_SHEET,
                "Regions tab is present but has no valid rows.",
            )]);
        }
        regions.iter().map(|r| Some(r.region_id)).collect()
    } else {
        vec![None]
    };

    let mut batch = NormalizedBatch {
        regions,
        tables: Vec::new(),
    };

    for region_id in region_ids {
        match normalize_region(wb, region_id) {
            Ok(tables) => batch.tables.extend(tables),
            Err(region_defects) => defects.extend(region_defects),
        }
    }

    if defects.is_empty() {
        Ok(batch)
    } else {
        Err(defects)
    }
}

/// Parse one region's type sheet and its per-type encounter/reward sheets.
fn normalize_region(wb: &Workbook, region_id: Option<i64>) -> Result<Vec<TableData>, Vec<Defect>> {
    let type_sheet_name = encounter_types_sheet(region_id);
    let Some(type_sheet) = wb.sheet(&type_sheet_name) else {
        return Err(vec![Defect::new(type_sheet_name, "Missing required tab.")]);
    };

    let type_table = validate_sheet(type_sheet, ValueColumn::Type)?;
    let types = declared_types(&type_table);

    // Every declared type needs exactly one encounter and one reward sheet,
    // matched by exact string equality to the type value.
    let mut defects = Vec::new();
    for type_key in &types {
        let enc = encounter_sheet(region_id, type_key);
        if !wb.has_sheet(&enc) {
            defects.push(Defect::new(
                enc,
                format!("Missing tab for encounter type '{type_key}'."),
            ));
        }
        let rew = reward_sheet(region_id, type_key);
        if !wb.has_sheet(&rew) {
            defects.push(Defect::new(
                rew,
                format!("Missing tab for reward type '{type_key}'."),
            ));
        }
    }
    if !defects.is_empty() {
        return Err(defects);
    }

    let mut tables = vec![TableData {
        def: TableDef {
            group: GroupKey::EncounterType,
            region_id,
            type_key: None,
            roll_mode: type_table.roll_mode,
            max_roll: type_table.max_roll,
        },
        entries: type_table.entries,
    }];

    for type_key in &types {
        for (group, name) in [
            (GroupKey::Encounter, encounter_sheet(region_id, type_key)),
            (GroupKey::Reward, reward_sheet(region_id, type_key)),
        ] {
            // Presence was checked above.
            let Some(sheet) = wb.sheet(&name) else {
                continue;
            };
            match validate_sheet(sheet, ValueColumn::Result) {
                Ok(table) => tables.push(TableData {
                    def: TableDef {
                        group,
                        region_id,
                        type_key: Some(type_key.clone()),
                        roll_mode: table.roll_mode,
                        max_roll: table.max_roll,
                    },
                    entries: table.entries,
                }),
                Err(sheet_defects) => defects.extend(sheet_defects),
            }
        }
    }

    if defects.is_empty() {
        Ok(tables)
    } else {
        Err(defects)
    }
}

/// Declared type values in sheet order, duplicates removed (first wins).
fn declared_types(type_table: &SheetTable) -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for entry in &type_table.entries {
        if !types.contains(&entry.result) {
            types.push(entry.result.clone());
        }
    }
    types
}
