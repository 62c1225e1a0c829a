//! Local catalog store abstraction.
//!
//! This module defines the [`CatalogStore`] trait which abstracts over the
//! persisted local catalog (SQLite in the shipped app, in-memory for tests).
//! The reconciler only ever talks to this trait; it is injected at
//! construction rather than reached through a process-wide handle.
//!
//! # Contract with the reconciler
//!
//! The reconciler treats the store as a single-writer local catalog. It
//! reads the full id set once per pass, inserts new records as one batch and
//! applies fill-missing-media updates individually. Nothing in this
//! subsystem ever deletes a record: local-only data is sacrosanct.

mod memory;
mod sqlite;

pub use memory::MemoryCatalog;
pub use sqlite::SqliteCatalog;

use crate::BoxFuture;
use crate::error::Result;
use crate::record::MediaRecord;

/// Trait for local catalog storage backends.
///
/// All methods return boxed futures so the trait is object-safe and can be
/// used behind `dyn CatalogStore`.
pub trait CatalogStore: Send + Sync {
    /// List the ids of every record in the catalog.
    fn get_all_ids(&self) -> BoxFuture<'_, Result<Vec<String>>>;

    /// Load a single record by id.
    ///
    /// Returns `None` if the record doesn't exist.
    fn get_by_id<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<MediaRecord>>>;

    /// Insert a batch of new records.
    fn insert_batch<'a>(&'a self, records: &'a [MediaRecord]) -> BoxFuture<'a, Result<()>>;

    /// Update a single existing record.
    fn update<'a>(&'a self, record: &'a MediaRecord) -> BoxFuture<'a, Result<()>>;

    /// List every record, newest first (by creation timestamp).
    ///
    /// The reconciler doesn't need this; host applications use it to render
    /// the catalog.
    fn get_all(&self) -> BoxFuture<'_, Result<Vec<MediaRecord>>>;

    /// Total number of records in the catalog.
    fn count(&self) -> BoxFuture<'_, Result<u64>>;
}
