//! SQLite Metadata Store
//!
//! One row per preset. The sample list is a JSON array column, so a preset
//! and its samples are read and written as a single document, and the
//! conditional append is one `UPDATE ... WHERE` evaluated atomically by
//! SQLite.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sampler_common::{Preset, PresetFilter, Sample};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{MetadataStore, StoreError, StoreResult, UpsertOutcome};

const PRESET_COLUMNS: &str =
    "id, name, slug, preset_type, is_factory, description, samples, created_at, updated_at";

/// Compare-and-swap attempts for sample removal before giving up
const CAS_ATTEMPTS: usize = 5;

/// Open (or create) the catalog database
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    debug!("Connecting to database: {}", db_path.display());
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create the presets table if it doesn't exist
pub async fn init_tables(pool: &SqlitePool) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS presets (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL,
            preset_type TEXT NOT NULL DEFAULT '',
            is_factory INTEGER NOT NULL DEFAULT 0,
            description TEXT,
            samples TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Wrap a pool, creating the schema if needed
    pub async fn new(pool: SqlitePool) -> StoreResult<Self> {
        init_tables(&pool).await?;
        Ok(Self { pool })
    }
}

fn row_to_preset(row: &SqliteRow) -> StoreResult<Preset> {
    let id_str: String = row.get("id");
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| StoreError::Backend(format!("bad preset id '{}': {}", id_str, e)))?;

    let samples_json: String = row.get("samples");
    let samples: Vec<Sample> = serde_json::from_str(&samples_json)?;

    Ok(Preset {
        id,
        name: row.get("name"),
        slug: row.get("slug"),
        preset_type: row.get("preset_type"),
        is_factory: row.get::<i64, _>("is_factory") != 0,
        description: row.get("description"),
        samples,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn parse_timestamp(value: String) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(format!("bad timestamp '{}': {}", value, e)))
}

/// Map a unique-constraint violation on `name` to `Duplicate`
fn write_error(err: sqlx::Error, name: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            StoreError::Duplicate(name.to_string())
        }
        _ => StoreError::from(err),
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, name: &str) -> StoreResult<Option<Preset>> {
        let row = sqlx::query(&format!("SELECT {} FROM presets WHERE name = ?", PRESET_COLUMNS))
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(row_to_preset).transpose()
    }

    async fn find(&self, filter: &PresetFilter) -> StoreResult<Vec<Preset>> {
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM presets WHERE 1 = 1", PRESET_COLUMNS));

        if let Some(preset_type) = filter.preset_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            qb.push(" AND lower(preset_type) = lower(")
                .push_bind(preset_type.to_string())
                .push(")");
        }

        if let Some(factory) = filter.factory {
            qb.push(" AND is_factory = ").push_bind(factory as i64);
        }

        if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            qb.push(" AND (instr(lower(name), ")
                .push_bind(needle.clone())
                .push(") > 0 OR EXISTS (SELECT 1 FROM json_each(presets.samples) AS s WHERE instr(lower(json_extract(s.value, '$.name')), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(json_extract(s.value, '$.url')), ")
                .push_bind(needle)
                .push(") > 0))");
        }

        qb.push(" ORDER BY rowid");

        if filter.limit.is_some() || filter.offset.is_some() {
            let limit = filter.limit.map(i64::from).unwrap_or(-1);
            qb.push(" LIMIT ").push_bind(limit);
            qb.push(" OFFSET ").push_bind(i64::from(filter.offset.unwrap_or(0)));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_preset).collect()
    }

    async fn insert(&self, preset: &Preset) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO presets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            PRESET_COLUMNS
        ))
        .bind(preset.id.to_string())
        .bind(&preset.name)
        .bind(&preset.slug)
        .bind(&preset.preset_type)
        .bind(preset.is_factory as i64)
        .bind(&preset.description)
        .bind(serde_json::to_string(&preset.samples)?)
        .bind(preset.created_at.to_rfc3339())
        .bind(preset.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &preset.name))?;

        Ok(())
    }

    async fn append_sample_if(
        &self,
        name: &str,
        sample: &Sample,
        capacity: usize,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE presets
            SET samples = json_insert(samples, '$[#]', json(?)),
                updated_at = ?
            WHERE name = ?
              AND json_array_length(samples) < ?
              AND NOT EXISTS (
                  SELECT 1 FROM json_each(presets.samples) AS s
                  WHERE json_extract(s.value, '$.name') = ?
              )
            "#,
        )
        .bind(serde_json::to_string(sample)?)
        .bind(Utc::now().to_rfc3339())
        .bind(name)
        .bind(capacity as i64)
        .bind(&sample.display_name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn replace(&self, current_name: &str, preset: &Preset) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE presets
            SET name = ?, slug = ?, preset_type = ?, is_factory = ?,
                description = ?, samples = ?, updated_at = ?
            WHERE name = ?
            "#,
        )
        .bind(&preset.name)
        .bind(&preset.slug)
        .bind(&preset.preset_type)
        .bind(preset.is_factory as i64)
        .bind(&preset.description)
        .bind(serde_json::to_string(&preset.samples)?)
        .bind(preset.updated_at.to_rfc3339())
        .bind(current_name)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, &preset.name))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(current_name.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> StoreResult<Option<Preset>> {
        let row = sqlx::query(&format!(
            "DELETE FROM presets WHERE name = ? RETURNING {}",
            PRESET_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_preset).transpose()
    }

    async fn remove_sample(&self, name: &str, filename: &str) -> StoreResult<Option<Preset>> {
        for _ in 0..CAS_ATTEMPTS {
            let Some(row) = sqlx::query(&format!("SELECT {} FROM presets WHERE name = ?", PRESET_COLUMNS))
                .bind(name)
                .fetch_optional(&self.pool)
                .await?
            else {
                return Ok(None);
            };

            let observed: String = row.get("samples");
            let mut preset = row_to_preset(&row)?;
            preset.samples.retain(|s| s.file_name() != filename);
            preset.updated_at = Utc::now();

            // Only swap if nobody rewrote the list since we read it
            let result = sqlx::query(
                "UPDATE presets SET samples = ?, updated_at = ? WHERE name = ? AND samples = ?",
            )
            .bind(serde_json::to_string(&preset.samples)?)
            .bind(preset.updated_at.to_rfc3339())
            .bind(name)
            .bind(&observed)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(Some(preset));
            }
            debug!("Sample list of '{}' changed during removal, retrying", name);
        }

        Err(StoreError::Backend(format!(
            "sample list of '{}' kept changing during removal",
            name
        )))
    }

    async fn upsert(&self, preset: &Preset) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        let existed: Option<i64> = sqlx::query_scalar("SELECT 1 FROM presets WHERE name = ?")
            .bind(&preset.name)
            .fetch_optional(&mut *tx)
            .await?;

        sqlx::query(&format!(
            r#"
            INSERT INTO presets ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                slug = excluded.slug,
                preset_type = excluded.preset_type,
                is_factory = excluded.is_factory,
                description = excluded.description,
                samples = excluded.samples,
                updated_at = excluded.updated_at
            "#,
            PRESET_COLUMNS
        ))
        .bind(preset.id.to_string())
        .bind(&preset.name)
        .bind(&preset.slug)
        .bind(&preset.preset_type)
        .bind(preset.is_factory as i64)
        .bind(&preset.description)
        .bind(serde_json::to_string(&preset.samples)?)
        .bind(preset.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(if existed.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        })
    }
}
