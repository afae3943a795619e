//! Catalog storage for setlist-ingest
//!
//! Discovery only needs two things from the catalog: look up a project by its
//! set file path (idempotent re-discovery) and upsert finished records. Tag,
//! note and filter queries belong to the application shell.

pub mod memory;
pub mod projects;

pub use memory::MemoryProjectStore;
pub use projects::SqliteProjectStore;

use crate::models::ProjectRecord;
use async_trait::async_trait;
use setlist_common::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Storage collaborator seen by discovery
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Existing catalog entry for a set file, if any
    async fn get_by_payload_path(&self, payload_path: &Path) -> Result<Option<ProjectRecord>>;

    /// Insert or replace the entry keyed by the record's set file path
    async fn upsert(&self, record: &ProjectRecord) -> Result<()>;

    /// Every entry, ordered by project name
    async fn list(&self) -> Result<Vec<ProjectRecord>>;
}

/// Open (creating if needed) the catalog database
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create the catalog tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_name TEXT NOT NULL,
            project_path TEXT NOT NULL,
            als_file_path TEXT NOT NULL UNIQUE,
            creation_date TEXT NOT NULL,
            bpm REAL,
            musical_key TEXT,
            version TEXT,
            tracks TEXT NOT NULL DEFAULT '[]',
            sample_count INTEGER NOT NULL DEFAULT 0,
            set_length TEXT,
            file_size INTEGER NOT NULL DEFAULT 0,
            last_modified TEXT NOT NULL,
            notes TEXT,
            status TEXT,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_name ON projects(project_name)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (projects)");

    Ok(())
}
