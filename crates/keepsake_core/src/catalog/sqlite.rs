//! SQLite-backed catalog implementation.
//!
//! This module provides the persistent [`CatalogStore`] backend used by the
//! shipped application. Records live in a single `media_records` table keyed
//! by id; creation timestamps are stored as integer unix milliseconds so the
//! display ordering query stays an index scan.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row, params};

use super::CatalogStore;
use crate::BoxFuture;
use crate::error::Result;
use crate::record::MediaRecord;

/// SQLite-backed catalog.
///
/// # Thread Safety
///
/// The connection is wrapped in a `Mutex` for thread-safe access.
/// SQLite itself is used in serialized threading mode.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open or create a SQLite database at the given path.
    ///
    /// This will create the necessary tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or if schema
    /// initialization fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Create an in-memory SQLite database for testing.
    ///
    /// Data is lost when the catalog is dropped.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.init_schema()?;
        Ok(catalog)
    }

    /// Initialize the database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media_records (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                audio_url TEXT NOT NULL DEFAULT '',
                local_image_path TEXT NOT NULL DEFAULT '',
                local_audio_path TEXT NOT NULL DEFAULT ''
            );

            -- Display ordering: newest entries first
            CREATE INDEX IF NOT EXISTS idx_media_records_created_at
                ON media_records(created_at DESC);
            "#,
        )?;
        Ok(())
    }

    fn all_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT id FROM media_records")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn by_id(&self, id: &str) -> Result<Option<MediaRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at, image_url, audio_url,
                    local_image_path, local_audio_path
             FROM media_records WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_record)?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    fn insert_all(&self, records: &[MediaRecord]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO media_records
                     (id, title, created_at, image_url, audio_url,
                      local_image_path, local_audio_path)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for record in records {
                stmt.execute(params![
                    record.id,
                    record.title,
                    record.created_at.timestamp_millis(),
                    record.image_url,
                    record.audio_url,
                    record.local_image_path,
                    record.local_audio_path,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn update_one(&self, record: &MediaRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE media_records
             SET title = ?2, created_at = ?3, image_url = ?4, audio_url = ?5,
                 local_image_path = ?6, local_audio_path = ?7
             WHERE id = ?1",
            params![
                record.id,
                record.title,
                record.created_at.timestamp_millis(),
                record.image_url,
                record.audio_url,
                record.local_image_path,
                record.local_audio_path,
            ],
        )?;
        Ok(())
    }

    fn all_records(&self) -> Result<Vec<MediaRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, title, created_at, image_url, audio_url,
                    local_image_path, local_audio_path
             FROM media_records ORDER BY created_at DESC",
        )?;
        let records = stmt
            .query_map([], row_to_record)?
            .collect::<rusqlite::Result<Vec<MediaRecord>>>()?;
        Ok(records)
    }

    fn record_count(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM media_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let created_millis: i64 = row.get(2)?;
    Ok(MediaRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: DateTime::<Utc>::from_timestamp_millis(created_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        image_url: row.get(3)?,
        audio_url: row.get(4)?,
        local_image_path: row.get(5)?,
        local_audio_path: row.get(6)?,
    })
}

impl CatalogStore for SqliteCatalog {
    fn get_all_ids(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move { self.all_ids() })
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<MediaRecord>>> {
        Box::pin(async move { self.by_id(id) })
    }

    fn insert_batch<'a>(&'a self, records: &'a [MediaRecord]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.insert_all(records) })
    }

    fn update<'a>(&'a self, record: &'a MediaRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.update_one(record) })
    }

    fn get_all(&self) -> BoxFuture<'_, Result<Vec<MediaRecord>>> {
        Box::pin(async move { self.all_records() })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move { self.record_count() })
    }
}
