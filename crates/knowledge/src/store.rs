//! SQLite-backed segment metadata store.
//!
//! One collection (table) holds every tenant's segment records. A companion
//! `<collection>_journal` table records indexing operations in flight.

use crate::types::{PendingOperation, SegmentRecord};
use chrono::{DateTime, Utc};
use policy_core::{AppConfig, AppError, AppResult};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Segment metadata store.
pub struct MetadataStore {
    conn: Mutex<Connection>,
    collection: String,
    journal: String,
}

impl std::fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataStore")
            .field("collection", &self.collection)
            .finish()
    }
}

impl MetadataStore {
    /// Open the store described by the configuration.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        Self::open(&config.database_path(), &config.collection)
    }

    /// Open (creating if needed) the database at `db_path`.
    pub fn open(db_path: &Path, collection: &str) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Store(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Store(format!("Failed to open database {:?}: {}", db_path, e)))?;

        tracing::debug!("Opened metadata store at {:?}", db_path);
        Self::with_connection(conn, collection)
    }

    /// Open a throwaway in-memory store.
    pub fn open_in_memory(collection: &str) -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Store(format!("Failed to open in-memory database: {}", e)))?;
        Self::with_connection(conn, collection)
    }

    fn with_connection(conn: Connection, collection: &str) -> AppResult<Self> {
        // Table names cannot be bound as parameters
        if collection.is_empty()
            || !collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Config(format!(
                "Invalid collection name: {:?}",
                collection
            )));
        }

        let journal = format!("{}_journal", collection);

        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {collection} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                vector_id INTEGER NOT NULL,
                company_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                text TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{collection}_tenant_vector
                ON {collection}(company_id, vector_id);

            CREATE TABLE IF NOT EXISTS {journal} (
                op_id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                filename TEXT NOT NULL,
                start_id INTEGER NOT NULL,
                count INTEGER NOT NULL,
                started_at TEXT NOT NULL
            );
            "#,
        ))
        .map_err(|e| AppError::Store(format!("Failed to create tables: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            collection: collection.to_string(),
            journal,
        })
    }

    fn conn(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("Metadata store lock poisoned".to_string()))
    }

    /// Insert records in one transaction. Returns the number inserted.
    pub fn insert_many(&self, records: &[SegmentRecord]) -> AppResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Store(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO {} (vector_id, company_id, filename, text) VALUES (?1, ?2, ?3, ?4)",
                    self.collection
                ))
                .map_err(|e| AppError::Store(format!("Failed to prepare insert: {}", e)))?;

            for record in records {
                stmt.execute(params![
                    record.vector_id,
                    record.tenant_id,
                    record.filename,
                    record.text,
                ])
                .map_err(|e| AppError::Store(format!("Failed to insert segment: {}", e)))?;
            }
        }

        tx.commit()
            .map_err(|e| AppError::Store(format!("Failed to commit segments: {}", e)))?;

        Ok(records.len())
    }

    /// Find the record for `vector_id` within `tenant_id`.
    pub fn find_one(&self, vector_id: i64, tenant_id: &str) -> AppResult<Option<SegmentRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT vector_id, company_id, filename, text FROM {}
                 WHERE vector_id = ?1 AND company_id = ?2
                 ORDER BY id LIMIT 1",
                self.collection
            ))
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let mut rows = stmt
            .query_map(params![vector_id, tenant_id], |row| {
                Ok(SegmentRecord {
                    vector_id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    filename: row.get(2)?,
                    text: row.get(3)?,
                })
            })
            .map_err(|e| AppError::Store(format!("Failed to query segment: {}", e)))?;

        rows.next()
            .transpose()
            .map_err(|e| AppError::Store(format!("Failed to read segment: {}", e)))
    }

    /// Number of records stored for the tenant.
    pub fn count(&self, tenant_id: &str) -> AppResult<usize> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE company_id = ?1", self.collection),
            params![tenant_id],
            |row| row.get::<_, i64>(0).map(|v| v as usize),
        )
        .map_err(|e| AppError::Store(format!("Failed to count segments: {}", e)))
    }

    /// Distinct filenames for the tenant, in first-indexed order.
    pub fn filenames(&self, tenant_id: &str) -> AppResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT filename FROM {} WHERE company_id = ?1
                 GROUP BY filename ORDER BY MIN(id)",
                self.collection
            ))
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![tenant_id], |row| row.get::<_, String>(0))
            .map_err(|e| AppError::Store(format!("Failed to list filenames: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to read filenames: {}", e)))
    }

    /// Every vector id referenced by the tenant's records.
    pub fn vector_ids(&self, tenant_id: &str) -> AppResult<Vec<i64>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT DISTINCT vector_id FROM {} WHERE company_id = ?1 ORDER BY vector_id",
                self.collection
            ))
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![tenant_id], |row| row.get::<_, i64>(0))
            .map_err(|e| AppError::Store(format!("Failed to list vector ids: {}", e)))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to read vector ids: {}", e)))
    }

    /// Delete the tenant's records with `vector_id >= min_vector_id`.
    pub fn delete_from(&self, tenant_id: &str, min_vector_id: i64) -> AppResult<usize> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "DELETE FROM {} WHERE company_id = ?1 AND vector_id >= ?2",
                self.collection
            ),
            params![tenant_id, min_vector_id],
        )
        .map_err(|e| AppError::Store(format!("Failed to delete segments: {}", e)))
    }

    /// Record an indexing operation before its writes begin.
    pub fn begin_operation(
        &self,
        tenant_id: &str,
        filename: &str,
        start_id: i64,
        count: i64,
    ) -> AppResult<PendingOperation> {
        let op = PendingOperation {
            op_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            filename: filename.to_string(),
            start_id,
            count,
            started_at: Utc::now(),
        };

        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (op_id, company_id, filename, start_id, count, started_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                self.journal
            ),
            params![
                op.op_id,
                op.tenant_id,
                op.filename,
                op.start_id,
                op.count,
                op.started_at.to_rfc3339(),
            ],
        )
        .map_err(|e| AppError::Store(format!("Failed to journal operation: {}", e)))?;

        Ok(op)
    }

    /// Clear a journal entry once both writes have landed.
    pub fn complete_operation(&self, op_id: &str) -> AppResult<()> {
        let conn = self.conn()?;
        conn.execute(
            &format!("DELETE FROM {} WHERE op_id = ?1", self.journal),
            params![op_id],
        )
        .map_err(|e| AppError::Store(format!("Failed to clear journal entry: {}", e)))?;
        Ok(())
    }

    /// Journal entries still open for the tenant, oldest first.
    pub fn pending_operations(&self, tenant_id: &str) -> AppResult<Vec<PendingOperation>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT op_id, company_id, filename, start_id, count, started_at FROM {}
                 WHERE company_id = ?1 ORDER BY start_id",
                self.journal
            ))
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map(params![tenant_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(|e| AppError::Store(format!("Failed to list journal: {}", e)))?;

        let mut ops = Vec::new();
        for row in rows {
            let (op_id, tenant_id, filename, start_id, count, started_at) =
                row.map_err(|e| AppError::Store(format!("Failed to read journal: {}", e)))?;

            let started_at = DateTime::parse_from_rfc3339(&started_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| AppError::Store(format!("Bad journal timestamp: {}", e)))?;

            ops.push(PendingOperation {
                op_id,
                tenant_id,
                filename,
                start_id,
                count,
                started_at,
            });
        }

        Ok(ops)
    }
}
