//! Project catalog database operations
//!
//! Tracks are stored as a JSON array; timestamps as RFC 3339 text.
//! `notes` and `status` are owned by the application shell and survive
//! upserts untouched.

use super::ProjectStore;
use crate::models::{ExtractedMetadata, ProjectRecord, TrackInfo};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use setlist_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};

const SELECT_COLUMNS: &str = r#"
    SELECT project_name, project_path, als_file_path, creation_date, bpm, musical_key,
           version, tracks, sample_count, set_length, file_size, last_modified
    FROM projects
"#;

/// SQLite-backed catalog
#[derive(Debug, Clone)]
pub struct SqliteProjectStore {
    pool: SqlitePool,
}

impl SqliteProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Count catalog entries
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn get_by_payload_path(&self, payload_path: &Path) -> Result<Option<ProjectRecord>> {
        let query = format!("{SELECT_COLUMNS} WHERE als_file_path = ?");
        let row = sqlx::query(&query)
            .bind(payload_path.to_string_lossy().into_owned())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &ProjectRecord) -> Result<()> {
        let metadata = &record.metadata;
        let tracks = serde_json::to_string(&metadata.tracks)
            .map_err(|e| Error::Internal(format!("Failed to encode tracks: {}", e)))?;
        let file_size = i64::try_from(metadata.file_size_bytes)
            .map_err(|_| Error::InvalidInput(format!("File size out of range: {}", metadata.file_size_bytes)))?;

        sqlx::query(
            r#"
            INSERT INTO projects (
                project_name, project_path, als_file_path, creation_date, bpm, musical_key,
                version, tracks, sample_count, set_length, file_size, last_modified, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(als_file_path) DO UPDATE SET
                project_name = excluded.project_name,
                project_path = excluded.project_path,
                creation_date = excluded.creation_date,
                bpm = excluded.bpm,
                musical_key = excluded.musical_key,
                version = excluded.version,
                tracks = excluded.tracks,
                sample_count = excluded.sample_count,
                set_length = excluded.set_length,
                file_size = excluded.file_size,
                last_modified = excluded.last_modified,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.project_name)
        .bind(record.directory_path.to_string_lossy().into_owned())
        .bind(record.payload_path.to_string_lossy().into_owned())
        .bind(record.created_at.to_rfc3339())
        .bind(metadata.tempo_bpm)
        .bind(&metadata.musical_key)
        .bind(&metadata.format_version)
        .bind(tracks)
        .bind(i64::from(metadata.sample_reference_count))
        .bind(&metadata.estimated_set_length)
        .bind(file_size)
        .bind(metadata.last_modified.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::debug!(project = %record.project_name, "Upserted project");

        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let query = format!("{SELECT_COLUMNS} ORDER BY project_name, als_file_path");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &SqliteRow) -> Result<ProjectRecord> {
    let tracks_json: String = row.get("tracks");
    let tracks: Vec<TrackInfo> = serde_json::from_str(&tracks_json)
        .map_err(|e| Error::Internal(format!("Invalid tracks JSON in database: {}", e)))?;

    let sample_count: i64 = row.get("sample_count");
    let sample_count = u32::try_from(sample_count)
        .map_err(|_| Error::Internal(format!("Invalid sample count in database: {}", sample_count)))?;
    let file_size: i64 = row.get("file_size");
    let file_size = u64::try_from(file_size)
        .map_err(|_| Error::Internal(format!("Invalid file size in database: {}", file_size)))?;

    Ok(ProjectRecord {
        project_name: row.get("project_name"),
        directory_path: PathBuf::from(row.get::<String, _>("project_path")),
        payload_path: PathBuf::from(row.get::<String, _>("als_file_path")),
        created_at: parse_timestamp(&row.get::<String, _>("creation_date"))?,
        metadata: ExtractedMetadata {
            tempo_bpm: row.get("bpm"),
            musical_key: row.get("musical_key"),
            format_version: row.get("version"),
            tracks,
            sample_reference_count: sample_count,
            estimated_set_length: row.get("set_length"),
            file_size_bytes: file_size,
            last_modified: parse_timestamp(&row.get::<String, _>("last_modified"))?,
        },
    })
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database '{}': {}", value, e)))
}
