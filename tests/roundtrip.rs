//! End-to-end tests over a real SQLite file: import, roll, export,
//! re-import, delete.

use serde_json::json;
use sqlx::sqlite::SqlitePool;
use tableroll::{
    normalize_workbook, pipeline, roll, store, GroupKey, ImportError, RollError, Sheet, Workbook,
};

async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("encounters.db");
    let pool = store::connect(path.to_str().unwrap()).await.unwrap();
    (dir, pool)
}

fn sheet(name: &str, rows: Vec<Vec<serde_json::Value>>) -> Sheet {
    let mut s = Sheet::new(name);
    for row in rows {
        s.push_row(row);
    }
    s
}

/// Two regions; region 1 uses ranged types, region 2 weighted types.
fn regional_workbook() -> Workbook {
    let mut wb = Workbook::new();

    wb.push_sheet(sheet(
        "Regions",
        vec![
            vec![json!("region_id"), json!("region_name")],
            vec![json!(1), json!("Northern Wastes")],
            vec![json!(2), json!("Sunken Coast")],
        ],
    ));

    wb.push_sheet(sheet(
        "Encounter Types - 1",
        vec![
            vec![json!("min"), json!("max"), json!("type")],
            vec![json!(1), json!(60), json!("Combat")],
            vec![json!(61), json!(100), json!("Hazard")],
        ],
    ));
    for type_key in ["Combat", "Hazard"] {
        wb.push_sheet(sheet(
            &format!("Encounter - 1 - {type_key}"),
            vec![
                vec![json!("result")],
                vec![json!(format!("{type_key} in the snow"))],
            ],
        ));
        wb.push_sheet(sheet(
            &format!("Reward - 1 - {type_key}"),
            vec![
                vec![json!("weight"), json!("result")],
                vec![json!(3), json!("Furs")],
                vec![json!(1), json!("Ancient coin")],
            ],
        ));
    }

    wb.push_sheet(sheet(
        "Encounter Types - 2",
        vec![
            vec![json!("weight"), json!("type")],
            vec![json!(2), json!("Storm")],
        ],
    ));
    wb.push_sheet(sheet(
        "Encounter - 2 - Storm",
        vec![vec![json!("result")], vec![json!("A sudden squall")]],
    ));
    wb.push_sheet(sheet(
        "Reward - 2 - Storm",
        vec![vec![json!("result")], vec![json!("Driftwood")]],
    ));

    wb
}

#[tokio::test]
async fn regional_import_roll_export_roundtrip() {
    let (_dir, pool) = test_pool().await;
    let wb = regional_workbook();

    let counts = pipeline::import_workbook(&pool, 99, &wb).await.unwrap();
    assert_eq!(counts.regions, 2);
    assert_eq!(counts.encounter_types, 3);

    // Two regions configured: a roll without a selection must be refused.
    let err = roll::roll_encounter(&pool, 99, None).await.unwrap_err();
    assert!(matches!(err, RollError::RegionRequired));

    // Rolls against region 1 compose type, encounter and reward.
    for _ in 0..20 {
        let result = roll::roll_encounter(&pool, 99, Some(1)).await.unwrap();
        assert_eq!(result.region_name.as_deref(), Some("Northern Wastes"));
        assert!(["Combat", "Hazard"].contains(&result.encounter_type.result.as_str()));
        assert!(result
            .encounter
            .result
            .starts_with(&result.encounter_type.result));
        assert!(["Furs", "Ancient coin"].contains(&result.reward.result.as_str()));
    }

    // Region 2 exists too; region 3 does not.
    let result = roll::roll_encounter(&pool, 99, Some(2)).await.unwrap();
    assert_eq!(result.encounter.result, "A sudden squall");
    assert!(matches!(
        roll::roll_encounter(&pool, 99, Some(3)).await.unwrap_err(),
        RollError::UnknownRegion { region_id: 3 }
    ));

    // Export → re-import is lossless at the normalized level.
    let exported = pipeline::export_workbook(&pool, 99).await.unwrap().unwrap();
    assert_eq!(
        normalize_workbook(&wb).unwrap(),
        normalize_workbook(&exported).unwrap()
    );

    let bytes = exported.to_json_bytes().unwrap();
    pipeline::import_workbook_bytes(&pool, 99, &bytes)
        .await
        .unwrap();
    let again = pipeline::export_workbook(&pool, 99).await.unwrap().unwrap();
    assert_eq!(exported, again);
}

#[tokio::test]
async fn missing_sheet_commits_nothing() {
    let (_dir, pool) = test_pool().await;

    let mut wb = Workbook::new();
    wb.push_sheet(sheet(
        "Regions",
        vec![
            vec![json!("region_id"), json!("region_name")],
            vec![json!(1), json!("North")],
        ],
    ));
    wb.push_sheet(sheet(
        "Encounter Types - 1",
        vec![vec![json!("type")], vec![json!("Combat")]],
    ));
    // No "Encounter - 1 - Combat" and no "Reward - 1 - Combat".

    let err = pipeline::import_workbook(&pool, 5, &wb).await.unwrap_err();
    let ImportError::Invalid(defects) = err else {
        panic!("expected defect list");
    };
    let sheets: Vec<&str> = defects.iter().map(|d| d.sheet.as_str()).collect();
    assert!(sheets.contains(&"Encounter - 1 - Combat"));
    assert!(sheets.contains(&"Reward - 1 - Combat"));

    // Zero rows reached storage.
    assert!(!store::has_any_tables(&pool, 5).await.unwrap());
    assert!(store::fetch_regions(&pool, 5).await.unwrap().is_empty());
    assert!(pipeline::export_workbook(&pool, 5).await.unwrap().is_none());
}

#[tokio::test]
async fn delete_then_export_and_roll() {
    let (_dir, pool) = test_pool().await;

    pipeline::import_workbook(&pool, 7, &Workbook::template())
        .await
        .unwrap();
    roll::roll_encounter(&pool, 7, None).await.unwrap();

    store::delete_guild(&pool, 7).await.unwrap();

    assert!(pipeline::export_workbook(&pool, 7).await.unwrap().is_none());
    assert!(matches!(
        roll::roll_encounter(&pool, 7, None).await.unwrap_err(),
        RollError::MissingTable {
            group: GroupKey::EncounterType,
            ..
        }
    ));
}

#[tokio::test]
async fn single_region_auto_selects() {
    let (_dir, pool) = test_pool().await;

    let mut wb = Workbook::new();
    wb.push_sheet(sheet(
        "Regions",
        vec![
            vec![json!("region_id"), json!("region_name")],
            vec![json!(4), json!("The Only Land")],
        ],
    ));
    wb.push_sheet(sheet(
        "Encounter Types - 4",
        vec![vec![json!("type")], vec![json!("Combat")]],
    ));
    wb.push_sheet(sheet(
        "Encounter - 4 - Combat",
        vec![vec![json!("result")], vec![json!("Wolves")]],
    ));
    wb.push_sheet(sheet(
        "Reward - 4 - Combat",
        vec![vec![json!("result")], vec![json!("Pelts")]],
    ));

    pipeline::import_workbook(&pool, 11, &wb).await.unwrap();

    // No region supplied, but only one exists.
    let result = roll::roll_encounter(&pool, 11, None).await.unwrap();
    assert_eq!(result.region_name.as_deref(), Some("The Only Land"));
    assert_eq!(result.encounter.result, "Wolves");
    assert_eq!(result.reward.result, "Pelts");
}

#[tokio::test]
async fn reimport_replaces_not_merges() {
    let (_dir, pool) = test_pool().await;

    pipeline::import_workbook(&pool, 3, &regional_workbook())
        .await
        .unwrap();
    pipeline::import_workbook(&pool, 3, &Workbook::template())
        .await
        .unwrap();

    // The regional layout is gone; the template layout is live.
    assert!(store::fetch_regions(&pool, 3).await.unwrap().is_empty());
    let result = roll::roll_encounter(&pool, 3, None).await.unwrap();
    assert!(result.region_name.is_none());
    assert!(["Combat", "Exploration"].contains(&result.encounter_type.result.as_str()));
}
