//! SQLite-based vector store implementation.
//!
//! Uses SQLite for persistence with cosine similarity computed in Rust.
//! Fine for personal corpora; large collections belong in a dedicated
//! vector database such as the remote Endee store.

use super::{scan, validate_top_k, MetadataFilter, ScoredRecord, VectorRecord, VectorStore};
use crate::error::{DocqaError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS records (
        id TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        metadata_json TEXT NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_records_document_id ON records(document_id);
"#;

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Open (or create) a SQLite vector store at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DocqaError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn load_records(conn: &Connection) -> Result<Vec<VectorRecord>> {
        let mut stmt = conn.prepare(
            "SELECT id, document_id, chunk_index, text, embedding, metadata_json, indexed_at \
             FROM records",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Vec<u8>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, document_id, chunk_index, text, embedding, metadata_json, indexed_at) = row?;
            let indexed_at = DateTime::parse_from_rfc3339(&indexed_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            records.push(VectorRecord {
                id,
                document_id,
                chunk_index: chunk_index.max(0) as usize,
                text,
                embedding: Self::bytes_to_embedding(&embedding),
                metadata: serde_json::from_str(&metadata_json)?,
                indexed_at,
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.lock()?;

        // Single transaction: the batch lands completely or not at all.
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO records
                    (id, document_id, chunk_index, text, embedding, metadata_json, indexed_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;

            for record in records {
                stmt.execute(params![
                    record.id,
                    record.document_id,
                    record.chunk_index as i64,
                    record.text,
                    Self::embedding_to_bytes(&record.embedding),
                    serde_json::to_string(&record.metadata)?,
                    record.indexed_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        debug!("Upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, embedding, filter))]
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<ScoredRecord>> {
        validate_top_k(top_k)?;

        let conn = self.lock()?;
        let records = Self::load_records(&conn)?;
        Ok(scan(records.iter(), embedding, top_k, filter))
    }

    async fn delete_document(&self, document_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(deleted)
    }

    async fn delete_stale(&self, document_id: &str, keep: usize) -> Result<usize> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM records WHERE document_id = ?1 AND chunk_index >= ?2",
            params![document_id, keep as i64],
        )?;
        Ok(deleted)
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count.max(0) as usize)
    }

    async fn reset(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM records", [])?;
        info!("Cleared SQLite vector store");
        Ok(())
    }
}
