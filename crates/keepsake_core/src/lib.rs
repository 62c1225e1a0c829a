#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

use std::future::Future;
use std::pin::Pin;

/// Authentication bootstrap (ambient identity before remote reads)
pub mod auth;

/// Local catalog store contract and implementations
pub mod catalog;

/// Configuration options
pub mod config;

/// Connectivity gate (precondition of a sync pass)
pub mod connectivity;

/// Error (common error types)
pub mod error;

/// Media file fetcher
pub mod fetch;

/// The media record data model
pub mod record;

/// Remote catalog source contract
pub mod remote;

/// The reconciler: one synchronization pass and its report
pub mod sync;

/// A boxed future for object-safe async trait methods.
///
/// Collaborator traits ([`catalog::CatalogStore`], [`remote::RemoteCatalog`],
/// [`fetch::FileFetcher`], ...) return boxed futures so they can be used
/// behind `dyn` and swapped for in-memory fakes in tests. Futures are `Send`
/// for compatibility with multi-threaded runtimes.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
