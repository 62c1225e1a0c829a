//! In-memory catalog implementation for testing.
//!
//! This provides a simple in-memory implementation of [`CatalogStore`]
//! for use in unit tests and development.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::CatalogStore;
use crate::BoxFuture;
use crate::error::Result;
use crate::record::MediaRecord;

/// In-memory catalog for testing.
///
/// Stores all records in a `HashMap` behind an `RwLock`. Thread-safe, but
/// data is lost when dropped.
#[derive(Debug, Default, Clone)]
pub struct MemoryCatalog {
    records: Arc<RwLock<HashMap<String, MediaRecord>>>,
}

impl MemoryCatalog {
    /// Create a new empty in-memory catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the catalog with existing records (test setup helper).
    pub fn with_records(records: impl IntoIterator<Item = MediaRecord>) -> Self {
        let map = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }
}

impl CatalogStore for MemoryCatalog {
    fn get_all_ids(&self) -> BoxFuture<'_, Result<Vec<String>>> {
        Box::pin(async move {
            let records = self.records.read().unwrap();
            Ok(records.keys().cloned().collect())
        })
    }

    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<MediaRecord>>> {
        Box::pin(async move {
            let records = self.records.read().unwrap();
            Ok(records.get(id).cloned())
        })
    }

    fn insert_batch<'a>(&'a self, batch: &'a [MediaRecord]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut records = self.records.write().unwrap();
            for record in batch {
                records.insert(record.id.clone(), record.clone());
            }
            Ok(())
        })
    }

    fn update<'a>(&'a self, record: &'a MediaRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut records = self.records.write().unwrap();
            records.insert(record.id.clone(), record.clone());
            Ok(())
        })
    }

    fn get_all(&self) -> BoxFuture<'_, Result<Vec<MediaRecord>>> {
        Box::pin(async move {
            let records = self.records.read().unwrap();
            let mut all: Vec<MediaRecord> = records.values().cloned().collect();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(all)
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64>> {
        Box::pin(async move {
            let records = self.records.read().unwrap();
            Ok(records.len() as u64)
        })
    }
}
