//! In-memory vector store implementation.
//!
//! Useful for testing, small datasets, and running without a remote index.

use super::{scan, validate_top_k, MetadataFilter, ScoredRecord, VectorRecord, VectorStore};
use crate::error::{DocqaError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store.
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, VectorRecord>>> {
        self.records
            .read()
            .map_err(|e| DocqaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, VectorRecord>>> {
        self.records
            .write()
            .map_err(|e| DocqaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        // One write lock for the whole batch: readers see all of it or none.
        let mut store = self.write()?;
        for record in records {
            store.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        validate_top_k(top_k)?;
        let records = self.read()?;
        Ok(scan(records.values(), embedding, top_k, filter))
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let mut records = self.write()?;
        let initial_len = records.len();
        records.retain(|_, r| r.document_id != document_id);
        Ok(initial_len - records.len())
    }

    async fn delete_stale(&self, document_id: &str, keep: usize) -> Result<usize> {
        let mut records = self.write()?;
        let initial_len = records.len();
        records.retain(|_, r| r.document_id != document_id || r.chunk_index < keep);
        Ok(initial_len - records.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    async fn reset(&self) -> Result<()> {
        self.write()?.clear();
        Ok(())
    }
}
