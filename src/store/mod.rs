//! SQLite persistence for normalized tables.
//!
//! Canonical layout: `guild_config` 1:N `region`, 1:N `table_def` 1:N
//! `table_entry`, every child cascading on guild delete. `table_def` is
//! unique on `(guild_id, group_key, region_id, type_key)`; region and type
//! keys are NULL for the non-regional / type-list cases, and lookups use
//! null-safe `IS ?` comparison.
//!
//! `replace_all` and `delete_guild` run as single transactions, so
//! concurrent readers see the fully-old or fully-new table set, never a mix.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::models::{GroupKey, NormalizedBatch, Region, RollMode, TableData, TableDef, TableEntry};

/// Open (or create) the database at `path` and make sure the schema exists.
pub async fn connect(path: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;

    info!("Database ready at {path}");
    Ok(pool)
}

/// Create all tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = [
        r#"
        CREATE TABLE IF NOT EXISTS guild_config (
            guild_id INTEGER PRIMARY KEY,
            updated_at TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS region (
            guild_id INTEGER NOT NULL REFERENCES guild_config(guild_id) ON DELETE CASCADE,
            region_id INTEGER NOT NULL,
            region_name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY (guild_id, region_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS table_def (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guild_id INTEGER NOT NULL REFERENCES guild_config(guild_id) ON DELETE CASCADE,
            group_key TEXT NOT NULL,
            region_id INTEGER,
            type_key TEXT,
            roll_mode TEXT NOT NULL,
            max_roll INTEGER,
            updated_at TEXT NOT NULL,
            UNIQUE (guild_id, group_key, region_id, type_key)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS table_entry (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            table_id INTEGER NOT NULL REFERENCES table_def(id) ON DELETE CASCADE,
            min_roll INTEGER,
            max_roll INTEGER,
            weight INTEGER,
            result TEXT NOT NULL,
            sort_order INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE INDEX IF NOT EXISTS idx_table_entry_table
        ON table_entry(table_id, sort_order)
        "#,
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

// =============================================================================
// Row types
// =============================================================================

/// A stored table definition, as needed by the roll and export paths.
#[derive(Debug, Clone)]
pub struct StoredTableDef {
    pub id: i64,
    pub roll_mode: RollMode,
    pub max_roll: Option<i64>,
}

#[derive(sqlx::FromRow)]
struct TableDefRow {
    id: i64,
    roll_mode: String,
    max_roll: Option<i64>,
}

impl TableDefRow {
    fn into_stored(self) -> Result<StoredTableDef, sqlx::Error> {
        let roll_mode = RollMode::from_key(&self.roll_mode).ok_or_else(|| {
            sqlx::Error::Decode(format!("unknown roll_mode '{}'", self.roll_mode).into())
        })?;
        Ok(StoredTableDef {
            id: self.id,
            roll_mode,
            max_roll: self.max_roll,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    min_roll: Option<i64>,
    max_roll: Option<i64>,
    weight: Option<i64>,
    result: String,
}

impl From<EntryRow> for TableEntry {
    fn from(row: EntryRow) -> Self {
        TableEntry {
            min_roll: row.min_roll,
            max_roll: row.max_roll,
            weight: row.weight,
            result: row.result,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RegionRow {
    region_id: i64,
    region_name: String,
    sort_order: i64,
}

// =============================================================================
// Writes
// =============================================================================

/// Replace everything stored for a guild with the batch, atomically.
///
/// On any failure the transaction rolls back and the previous import stays
/// visible unchanged.
pub async fn replace_all(
    pool: &SqlitePool,
    guild_id: i64,
    batch: &NormalizedBatch,
) -> Result<(), sqlx::Error> {
    let updated_at = chrono::Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO guild_config(guild_id, updated_at) VALUES(?, ?)
        ON CONFLICT(guild_id) DO UPDATE SET updated_at = excluded.updated_at
        "#,
    )
    .bind(guild_id)
    .bind(&updated_at)
    .execute(&mut *tx)
    .await?;

    // Entries cascade with their table_def rows.
    sqlx::query("DELETE FROM table_def WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM region WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;

    for region in &batch.regions {
        sqlx::query(
            r#"
            INSERT INTO region(guild_id, region_id, region_name, sort_order)
            VALUES(?, ?, ?, ?)
            "#,
        )
        .bind(guild_id)
        .bind(region.region_id)
        .bind(&region.region_name)
        .bind(region.sort_order)
        .execute(&mut *tx)
        .await?;
    }

    for table in &batch.tables {
        let def = &table.def;
        let inserted = sqlx::query(
            r#"
            INSERT INTO table_def(guild_id, group_key, region_id, type_key, roll_mode, max_roll, updated_at)
            VALUES(?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(guild_id)
        .bind(def.group.as_str())
        .bind(def.region_id)
        .bind(&def.type_key)
        .bind(def.roll_mode.as_str())
        .bind(def.max_roll)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;
        let table_id = inserted.last_insert_rowid();

        for (i, entry) in table.entries.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO table_entry(table_id, min_roll, max_roll, weight, result, sort_order)
                VALUES(?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(table_id)
            .bind(entry.min_roll)
            .bind(entry.max_roll)
            .bind(entry.weight)
            .bind(&entry.result)
            .bind(i as i64)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    info!(
        guild_id,
        tables = batch.tables.len(),
        regions = batch.regions.len(),
        "Replaced stored tables"
    );
    Ok(())
}

/// Irreversibly delete everything stored for a guild.
pub async fn delete_guild(pool: &SqlitePool, guild_id: i64) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM region WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM table_def WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM guild_config WHERE guild_id = ?")
        .bind(guild_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(guild_id, "Deleted all stored tables");
    Ok(())
}

// =============================================================================
// Reads
// =============================================================================

/// Look up a table definition by its unique key.
pub async fn fetch_table_def(
    pool: &SqlitePool,
    guild_id: i64,
    group: GroupKey,
    region_id: Option<i64>,
    type_key: Option<&str>,
) -> Result<Option<StoredTableDef>, sqlx::Error> {
    let row: Option<TableDefRow> = sqlx::query_as(
        r#"
        SELECT id, roll_mode, max_roll
        FROM table_def
        WHERE guild_id = ?
          AND group_key = ?
          AND region_id IS ?
          AND type_key IS ?
        "#,
    )
    .bind(guild_id)
    .bind(group.as_str())
    .bind(region_id)
    .bind(type_key)
    .fetch_optional(pool)
    .await?;

    row.map(TableDefRow::into_stored).transpose()
}

/// Entries of a table in stored (sheet) order.
pub async fn fetch_entries(pool: &SqlitePool, table_id: i64) -> Result<Vec<TableEntry>, sqlx::Error> {
    let rows: Vec<EntryRow> = sqlx::query_as(
        r#"
        SELECT min_roll, max_roll, weight, result
        FROM table_entry
        WHERE table_id = ?
        ORDER BY sort_order ASC
        "#,
    )
    .bind(table_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TableEntry::from).collect())
}

/// Regions of a guild in configured order.
pub async fn fetch_regions(pool: &SqlitePool, guild_id: i64) -> Result<Vec<Region>, sqlx::Error> {
    let rows: Vec<RegionRow> = sqlx::query_as(
        r#"
        SELECT region_id, region_name, sort_order
        FROM region
        WHERE guild_id = ?
        ORDER BY sort_order ASC, region_id ASC
        "#,
    )
    .bind(guild_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Region {
            region_id: r.region_id,
            region_name: r.region_name,
            sort_order: r.sort_order,
        })
        .collect())
}

/// Display name of one region, if configured.
pub async fn region_name(
    pool: &SqlitePool,
    guild_id: i64,
    region_id: i64,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT region_name FROM region WHERE guild_id = ? AND region_id = ?",
    )
    .bind(guild_id)
    .bind(region_id)
    .fetch_optional(pool)
    .await
}

/// Whether the guild has ever imported anything.
pub async fn has_any_tables(pool: &SqlitePool, guild_id: i64) -> Result<bool, sqlx::Error> {
    let row: Option<i64> = sqlx::query_scalar("SELECT 1 FROM table_def WHERE guild_id = ? LIMIT 1")
        .bind(guild_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Rebuild the full normalized batch for a guild, or `None` if the guild
/// never imported anything. Stored order is preserved throughout so the
/// export round-trips.
pub async fn export_all(
    pool: &SqlitePool,
    guild_id: i64,
) -> Result<Option<NormalizedBatch>, sqlx::Error> {
    if !has_any_tables(pool, guild_id).await? {
        return Ok(None);
    }

    let regions = fetch_regions(pool, guild_id).await?;
    let region_ids: Vec<Option<i64>> = if regions.is_empty() {
        vec![None]
    } else {
        regions.iter().map(|r| Some(r.region_id)).collect()
    };

    let mut batch = NormalizedBatch {
        regions,
        tables: Vec::new(),
    };

    for region_id in region_ids {
        let Some(type_def) =
            fetch_table_def(pool, guild_id, GroupKey::EncounterType, region_id, None).await?
        else {
            continue;
        };
        let type_entries = fetch_entries(pool, type_def.id).await?;

        let mut types: Vec<String> = Vec::new();
        for entry in &type_entries {
            if !entry.result.is_empty() && !types.contains(&entry.result) {
                types.push(entry.result.clone());
            }
        }

        batch.tables.push(TableData {
            def: TableDef {
                group: GroupKey::EncounterType,
                region_id,
                type_key: None,
                roll_mode: type_def.roll_mode,
                max_roll: type_def.max_roll,
            },
            entries: type_entries,
        });

        for type_key in &types {
            for group in [GroupKey::Encounter, GroupKey::Reward] {
                let Some(def) =
                    fetch_table_def(pool, guild_id, group, region_id, Some(type_key)).await?
                else {
                    continue;
                };
                let entries = fetch_entries(pool, def.id).await?;
                batch.tables.push(TableData {
                    def: TableDef {
                        group,
                        region_id,
                        type_key: Some(type_key.clone()),
                        roll_mode: def.roll_mode,
                        max_roll: def.max_roll,
                    },
                    entries,
                });
            }
        }
    }

    Ok(Some(batch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RollMode;

    async fn test_pool() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tables.db");
        let pool = connect(path.to_str().unwrap()).await.unwrap();
        (dir, pool)
    }

    fn sample_batch() -> NormalizedBatch {
        NormalizedBatch {
            regions: vec![Region {
                region_id: 1,
                region_name: "North".into(),
                sort_order: 0,
            }],
            tables: vec![
                TableData {
                    def: TableDef {
                        group: GroupKey::EncounterType,
                        region_id: Some(1),
                        type_key: None,
                        roll_mode: RollMode::Uniform,
                        max_roll: None,
                    },
                    entries: vec![TableEntry::uniform("Combat")],
                },
                TableData {
                    def: TableDef {
                        group: GroupKey::Encounter,
                        region_id: Some(1),
                        type_key: Some("Combat".into()),
                        roll_mode: RollMode::Range,
                        max_roll: Some(20),
                    },
                    entries: vec![
                        TableEntry::ranged(1, 10, "Wolves"),
                        TableEntry::ranged(11, 20, "Bears"),
                    ],
                },
                TableData {
                    def: TableDef {
                        group: GroupKey::Reward,
                        region_id: Some(1),
                        type_key: Some("Combat".into()),
                        roll_mode: RollMode::Weight,
                        max_roll: None,
                    },
                    entries: vec![
                        TableEntry::weighted(3, "Coins"),
                        TableEntry::weighted(1, "Gems"),
                    ],
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_replace_and_fetch() {
        let (_dir, pool) = test_pool().await;
        replace_all(&pool, 42, &sample_batch()).await.unwrap();

        let def = fetch_table_def(&pool, 42, GroupKey::Encounter, Some(1), Some("Combat"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(def.roll_mode, RollMode::Range);
        assert_eq!(def.max_roll, Some(20));

        let entries = fetch_entries(&pool, def.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].result, "Wolves");
        assert_eq!(entries[1].result, "Bears");

        let regions = fetch_regions(&pool, 42).await.unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(region_name(&pool, 42, 1).await.unwrap().as_deref(), Some("North"));
    }

    #[tokio::test]
    async fn test_replace_drops_previous_import() {
        let (_dir, pool) = test_pool().await;
        replace_all(&pool, 42, &sample_batch()).await.unwrap();

        let replacement = NormalizedBatch {
            regions: Vec::new(),
            tables: vec![TableData {
                def: TableDef {
                    group: GroupKey::EncounterType,
                    region_id: None,
                    type_key: None,
                    roll_mode: RollMode::Uniform,
                    max_roll: None,
                },
                entries: vec![TableEntry::uniform("Social")],
            }],
        };
        replace_all(&pool, 42, &replacement).await.unwrap();

        assert!(fetch_table_def(&pool, 42, GroupKey::Encounter, Some(1), Some("Combat"))
            .await
            .unwrap()
            .is_none());
        assert!(fetch_regions(&pool, 42).await.unwrap().is_empty());
        assert!(fetch_table_def(&pool, 42, GroupKey::EncounterType, None, None)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_guilds_are_isolated() {
        let (_dir, pool) = test_pool().await;
        replace_all(&pool, 1, &sample_batch()).await.unwrap();

        assert!(has_any_tables(&pool, 1).await.unwrap());
        assert!(!has_any_tables(&pool, 2).await.unwrap());
        assert!(export_all(&pool, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_cascades() {
        let (_dir, pool) = test_pool().await;
        replace_all(&pool, 42, &sample_batch()).await.unwrap();

        let def = fetch_table_def(&pool, 42, GroupKey::Reward, Some(1), Some("Combat"))
            .await
            .unwrap()
            .unwrap();

        delete_guild(&pool, 42).await.unwrap();

        assert!(!has_any_tables(&pool, 42).await.unwrap());
        assert!(fetch_regions(&pool, 42).await.unwrap().is_empty());
        assert!(export_all(&pool, 42).await.unwrap().is_none());
        // Entries went with their table_def rows.
        assert!(fetch_entries(&pool, def.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_reconstructs_batch() {
        let (_dir, pool) = test_pool().await;
        let batch = sample_batch();
        replace_all(&pool, 42, &batch).await.unwrap();

        let exported = export_all(&pool, 42).await.unwrap().unwrap();
        assert_eq!(exported, batch);
    }
}
