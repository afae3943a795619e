//! In-memory catalog for embedding and tests

use super::ProjectStore;
use crate::models::ProjectRecord;
use async_trait::async_trait;
use setlist_common::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Catalog held in a map keyed by set file path
#[derive(Debug, Default)]
pub struct MemoryProjectStore {
    records: RwLock<HashMap<PathBuf, ProjectRecord>>,
}

impl MemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ProjectStore for MemoryProjectStore {
    async fn get_by_payload_path(&self, payload_path: &Path) -> Result<Option<ProjectRecord>> {
        Ok(self.records.read().await.get(payload_path).cloned())
    }

    async fn upsert(&self, record: &ProjectRecord) -> Result<()> {
        self.records
            .write()
            .await
            .insert(record.payload_path.clone(), record.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            a.project_name
                .cmp(&b.project_name)
                .then_with(|| a.payload_path.cmp(&b.payload_path))
        });
        Ok(records)
    }
}
