//! The reconciler.
//!
//! One synchronization pass compares the remote and local id sets, downloads
//! media referenced only remotely, and merges the results into the local
//! catalog. The reconciliation is deliberately asymmetric: remote records
//! missing locally are inserted, locally known records get missing media
//! filled in, and records that exist only locally are never touched.
//!
//! # Failure policy
//!
//! Only source-level failures abort a pass (remote or local catalog
//! unreachable, authentication bootstrap failed). A media download failure
//! leaves that one field unset and is re-attempted on the next pass; the
//! pass itself still completes and reports the failure count. Because
//! inserts and updates are applied incrementally, an abandoned pass leaves
//! the catalog in a valid, partially-synced state.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use futures_util::stream;

use crate::auth::{AuthProvider, HttpAuthProvider, StaticIdentity};
use crate::catalog::CatalogStore;
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityGate, TcpProbe};
use crate::error::{KeepsakeError, Result};
use crate::fetch::{FileFetcher, HttpFetcher, MediaKind};
use crate::record::MediaRecord;
use crate::remote::{HttpRemoteCatalog, RemoteCatalog};

/// How a synchronization attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A full pass ran to completion.
    Completed,
    /// No network path was available; nothing was attempted.
    SkippedOffline,
    /// Another pass was already in flight; this trigger was a no-op.
    SkippedInFlight,
}

/// Summary of one synchronization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// How the attempt ended.
    pub outcome: SyncOutcome,
    /// Number of documents the remote collection returned.
    pub remote_total: usize,
    /// Size of the remote id set after dropping malformed documents.
    pub remote_ids: usize,
    /// Size of the local id set at the start of the pass.
    pub local_ids: usize,
    /// New records inserted into the local catalog.
    pub inserted: usize,
    /// Existing records that received fill-missing-media updates.
    pub updated: usize,
    /// Media downloads that failed (non-fatal, retried next pass).
    pub fetch_failures: usize,
    /// Remote documents skipped because their id was empty.
    pub malformed: usize,
    /// Remote documents whose id collided with an earlier one (anomaly;
    /// last occurrence wins).
    pub duplicates: usize,
    /// Local store writes that failed (best-effort, not rolled back).
    pub store_failures: usize,
}

impl SyncReport {
    fn skipped(outcome: SyncOutcome) -> Self {
        Self {
            outcome,
            remote_total: 0,
            remote_ids: 0,
            local_ids: 0,
            inserted: 0,
            updated: 0,
            fetch_failures: 0,
            malformed: 0,
            duplicates: 0,
            store_failures: 0,
        }
    }
}

/// The reconciler.
///
/// All collaborators are injected at construction; there is no process-wide
/// store or fetcher handle. At most one pass runs at a time: a second
/// trigger while one is active returns [`SyncOutcome::SkippedInFlight`]
/// without queueing or cancelling anything.
pub struct Synchronizer {
    remote: Arc<dyn RemoteCatalog>,
    local: Arc<dyn CatalogStore>,
    fetcher: Arc<dyn FileFetcher>,
    gate: Arc<dyn ConnectivityGate>,
    auth: Arc<dyn AuthProvider>,
    max_concurrent_fetches: usize,
    in_flight: AtomicBool,
}

impl Synchronizer {
    /// Create a synchronizer from explicit collaborators.
    pub fn new(
        remote: Arc<dyn RemoteCatalog>,
        local: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn FileFetcher>,
        gate: Arc<dyn ConnectivityGate>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            remote,
            local,
            fetcher,
            gate,
            auth,
            max_concurrent_fetches: 4,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Wire up the shipped HTTP collaborators from a [`SyncConfig`].
    ///
    /// The local catalog store is still injected by the host (it owns the
    /// database). Without an `auth_url` the remote collection is read
    /// unauthenticated under a fixed anonymous identity.
    pub fn from_config(config: &SyncConfig, local: Arc<dyn CatalogStore>) -> Result<Self> {
        let remote = Arc::new(HttpRemoteCatalog::new(&config.remote_base_url)?);
        let fetcher = Arc::new(HttpFetcher::with_timeouts(
            &config.storage_root,
            config.connect_timeout(),
            config.read_timeout(),
        )?);
        let gate: Arc<dyn ConnectivityGate> = if config.probe_endpoints.is_empty() {
            Arc::new(TcpProbe::default())
        } else {
            Arc::new(TcpProbe::new(
                config.probe_endpoints.clone(),
                std::time::Duration::from_secs(3),
            ))
        };
        let auth: Arc<dyn AuthProvider> = match &config.auth_url {
            Some(url) => Arc::new(HttpAuthProvider::new(url)?),
            None => Arc::new(StaticIdentity::anonymous("local")),
        };

        Ok(Self::new(remote, local, fetcher, gate, auth)
            .with_max_concurrent_fetches(config.max_concurrent_fetches))
    }

    /// Bound on parallel media downloads within a pass (minimum 1).
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max.max(1);
        self
    }

    /// Run one synchronization pass.
    ///
    /// Returns the pass report, or an error when a source-level failure
    /// aborted the pass ([`KeepsakeError::RemoteUnavailable`],
    /// [`KeepsakeError::LocalUnavailable`], [`KeepsakeError::AuthFailure`]).
    /// If another pass is already in flight this is a no-op and reports
    /// [`SyncOutcome::SkippedInFlight`].
    pub async fn synchronize(&self) -> Result<SyncReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::debug!("Synchronization already in flight, skipping trigger");
            return Ok(SyncReport::skipped(SyncOutcome::SkippedInFlight));
        }

        let result = self.run_pass().await;
        self.in_flight.store(false, Ordering::Release);
        result
    }

    /// Run a pass on the background runtime and report completion through
    /// the returned handle, keeping the caller's thread free.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<Result<SyncReport>> {
        tokio::spawn(async move { self.synchronize().await })
    }

    async fn run_pass(&self) -> Result<SyncReport> {
        if !self.gate.is_reachable().await {
            log::info!("No network connection, skipping synchronization");
            return Ok(SyncReport::skipped(SyncOutcome::SkippedOffline));
        }

        let identity = self.auth.ensure_identity().await.map_err(|e| match e {
            e @ KeepsakeError::AuthFailure(_) => e,
            other => KeepsakeError::AuthFailure(other.to_string()),
        })?;
        log::debug!("Synchronizing as user {}", identity.user_id);

        let remote_docs = self
            .remote
            .list_all(identity.token.as_deref())
            .await
            .map_err(|e| match e {
                e @ KeepsakeError::RemoteUnavailable(_) => e,
                other => KeepsakeError::RemoteUnavailable(other.to_string()),
            })?;
        let remote_total = remote_docs.len();

        // Drop malformed documents and collapse duplicate ids before any
        // set math. Duplicates violate the remote source's own uniqueness
        // contract; keep the last occurrence and flag the anomaly.
        let mut malformed = 0;
        let mut duplicates = 0;
        let mut documents: Vec<MediaRecord> = Vec::with_capacity(remote_total);
        let mut position: HashMap<String, usize> = HashMap::with_capacity(remote_total);
        for doc in remote_docs {
            if doc.id.is_empty() {
                malformed += 1;
                log::warn!("Skipping remote document with empty id");
                continue;
            }
            if let Some(&at) = position.get(&doc.id) {
                duplicates += 1;
                debug_assert!(false, "duplicate id {} in remote collection", doc.id);
                log::warn!(
                    "Duplicate id {} in remote collection, keeping last occurrence",
                    doc.id
                );
                documents[at] = doc;
                continue;
            }
            position.insert(doc.id.clone(), documents.len());
            documents.push(doc);
        }
        let remote_id_count = documents.len();

        let local_ids: HashSet<String> = self
            .local
            .get_all_ids()
            .await
            .map_err(|e| KeepsakeError::LocalUnavailable(e.to_string()))?
            .into_iter()
            .collect();
        let local_id_count = local_ids.len();

        // Only the remote-minus-local difference matters. Records in the
        // local-minus-remote difference are intentionally left untouched.
        let (new_docs, existing_docs): (Vec<MediaRecord>, Vec<MediaRecord>) = documents
            .into_iter()
            .partition(|doc| !local_ids.contains(&doc.id));
        log::debug!(
            "Remote ids: {}, local ids: {}, new: {}",
            remote_id_count,
            local_id_count,
            new_docs.len()
        );

        let mut fetch_failures = 0;

        // Stage inserts: download media for new records with bounded
        // concurrency. Partial success still inserts the record.
        let hydrated: Vec<(MediaRecord, usize)> =
            stream::iter(new_docs.into_iter().map(|doc| self.hydrate_new(doc)))
                .buffer_unordered(self.max_concurrent_fetches)
                .collect()
                .await;
        let mut inserts = Vec::with_capacity(hydrated.len());
        for (record, failures) in hydrated {
            fetch_failures += failures;
            inserts.push(record);
        }

        // Stage updates: fill in missing media on records already known
        // locally. Populated local paths are never re-fetched.
        let mut staged_updates = Vec::new();
        for doc in existing_docs {
            let existing = match self.local.get_by_id(&doc.id).await {
                Ok(Some(record)) => record,
                Ok(None) => {
                    log::warn!("Record {} vanished from the local catalog, skipping", doc.id);
                    continue;
                }
                Err(e) => return Err(KeepsakeError::LocalUnavailable(e.to_string())),
            };
            let (update, failures) = self.fill_missing(existing, &doc).await;
            fetch_failures += failures;
            if let Some(record) = update {
                staged_updates.push(record);
            }
        }

        // Apply. Bulk insert and individual updates are independent failure
        // domains; a failure in one is logged and counted, never rolled
        // back into the other.
        let mut inserted = 0;
        let mut updated = 0;
        let mut store_failures = 0;

        if !inserts.is_empty() {
            match self.local.insert_batch(&inserts).await {
                Ok(()) => {
                    inserted = inserts.len();
                    log::debug!("Inserted {} new records", inserted);
                }
                Err(e) => {
                    store_failures += 1;
                    log::error!("Bulk insert of {} records failed: {}", inserts.len(), e);
                }
            }
        }

        for record in &staged_updates {
            match self.local.update(record).await {
                Ok(()) => {
                    updated += 1;
                    log::debug!("Updated record {}", record.id);
                }
                Err(e) => {
                    store_failures += 1;
                    log::error!("Update of record {} failed: {}", record.id, e);
                }
            }
        }

        log::debug!(
            "Synchronization completed: inserted {}, updated {}, fetch failures {}",
            inserted,
            updated,
            fetch_failures
        );

        Ok(SyncReport {
            outcome: SyncOutcome::Completed,
            remote_total,
            remote_ids: remote_id_count,
            local_ids: local_id_count,
            inserted,
            updated,
            fetch_failures,
            malformed,
            duplicates,
            store_failures,
        })
    }

    /// Download the media of a record seen for the first time. Whatever
    /// succeeded populates the local path fields; the record is staged for
    /// insertion either way.
    async fn hydrate_new(&self, mut record: MediaRecord) -> (MediaRecord, usize) {
        let mut failures = 0;

        if record.wants_image() {
            match self.fetcher.fetch(&record.image_url, MediaKind::Image).await {
                Ok(path) => record.local_image_path = path.to_string_lossy().into_owned(),
                Err(e) => {
                    failures += 1;
                    log::warn!("Image download failed for {}: {}", record.id, e);
                }
            }
        }

        if record.wants_audio() {
            match self.fetcher.fetch(&record.audio_url, MediaKind::Audio).await {
                Ok(path) => record.local_audio_path = path.to_string_lossy().into_owned(),
                Err(e) => {
                    failures += 1;
                    log::warn!("Audio download failed for {}: {}", record.id, e);
                }
            }
        }

        (record, failures)
    }

    /// Fill in media the local record is missing, guided by the remote
    /// document's references. Only the local path fields of the existing
    /// record are touched; a populated path is never re-fetched, even if
    /// the remote reference has changed since.
    async fn fill_missing(
        &self,
        existing: MediaRecord,
        remote: &MediaRecord,
    ) -> (Option<MediaRecord>, usize) {
        let mut record = existing;
        let mut changed = false;
        let mut failures = 0;

        if record.local_image_path.is_empty() && !remote.image_url.is_empty() {
            match self.fetcher.fetch(&remote.image_url, MediaKind::Image).await {
                Ok(path) => {
                    record.local_image_path = path.to_string_lossy().into_owned();
                    changed = true;
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("Image download failed for {}: {}", record.id, e);
                }
            }
        }

        if record.local_audio_path.is_empty() && !remote.audio_url.is_empty() {
            match self.fetcher.fetch(&remote.audio_url, MediaKind::Audio).await {
                Ok(path) => {
                    record.local_audio_path = path.to_string_lossy().into_owned();
                    changed = true;
                }
                Err(e) => {
                    failures += 1;
                    log::warn!("Audio download failed for {}: {}", record.id, e);
                }
            }
        }

        (changed.then_some(record), failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MemoryCatalog;
    use crate::connectivity::AlwaysOnline;
    use crate::fetch::{FetchError, FetchResult};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use crate::BoxFuture;

    struct MockRemote {
        docs: Mutex<Vec<MediaRecord>>,
        fail: AtomicBool,
        calls: AtomicUsize,
        tokens: Mutex<Vec<Option<String>>>,
    }

    impl MockRemote {
        fn new(docs: Vec<MediaRecord>) -> Arc<Self> {
            Arc::new(Self {
                docs: Mutex::new(docs),
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                tokens: Mutex::new(Vec::new()),
            })
        }

        fn set_docs(&self, docs: Vec<MediaRecord>) {
            *self.docs.lock().unwrap() = docs;
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn last_token(&self) -> Option<String> {
            self.tokens.lock().unwrap().last().cloned().flatten()
        }
    }

    impl RemoteCatalog for MockRemote {
        fn list_all<'a>(
            &'a self,
            token: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Vec<MediaRecord>>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.tokens.lock().unwrap().push(token.map(str::to_string));
                if self.fail.load(Ordering::SeqCst) {
                    return Err(KeepsakeError::RemoteUnavailable("mock outage".into()));
                }
                Ok(self.docs.lock().unwrap().clone())
            })
        }
    }

    struct MockFetcher {
        fail_images: AtomicBool,
        fail_audio: AtomicBool,
        counter: AtomicUsize,
        calls: Mutex<Vec<(String, MediaKind)>>,
    }

    impl MockFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                fail_images: AtomicBool::new(false),
                fail_audio: AtomicBool::new(false),
                counter: AtomicUsize::new(0),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl FileFetcher for MockFetcher {
        fn fetch<'a>(
            &'a self,
            remote_ref: &'a str,
            kind: MediaKind,
        ) -> BoxFuture<'a, FetchResult<PathBuf>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((remote_ref.to_string(), kind));
                let failing = match kind {
                    MediaKind::Image => self.fail_images.load(Ordering::SeqCst),
                    MediaKind::Audio => self.fail_audio.load(Ordering::SeqCst),
                };
                if failing {
                    return Err(FetchError::ServerError(500));
                }
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                Ok(PathBuf::from(format!(
                    "/media/{}{}{}",
                    kind.file_prefix(),
                    n,
                    kind.file_extension()
                )))
            })
        }
    }

    struct FailingAuth;

    impl AuthProvider for FailingAuth {
        fn ensure_identity(&self) -> BoxFuture<'_, Result<crate::auth::Identity>> {
            Box::pin(async { Err(KeepsakeError::AuthFailure("mock auth outage".into())) })
        }
    }

    struct OfflineGate;

    impl ConnectivityGate for OfflineGate {
        fn is_reachable(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { false })
        }
    }

    /// Gate that parks until released, to hold a pass open.
    struct BlockingGate {
        entered: Arc<tokio::sync::Notify>,
        release: Arc<tokio::sync::Notify>,
    }

    impl ConnectivityGate for BlockingGate {
        fn is_reachable(&self) -> BoxFuture<'_, bool> {
            Box::pin(async move {
                self.entered.notify_one();
                self.release.notified().await;
                true
            })
        }
    }

    fn doc(id: &str, image_url: &str, audio_url: &str) -> MediaRecord {
        MediaRecord {
            image_url: image_url.to_string(),
            audio_url: audio_url.to_string(),
            ..MediaRecord::new(id, id.to_uppercase())
        }
    }

    fn synchronizer(
        remote: Arc<MockRemote>,
        local: MemoryCatalog,
        fetcher: Arc<MockFetcher>,
    ) -> Synchronizer {
        Synchronizer::new(
            remote,
            Arc::new(local),
            fetcher,
            Arc::new(AlwaysOnline),
            Arc::new(StaticIdentity::anonymous("tester")),
        )
    }

    #[tokio::test]
    async fn new_remote_record_is_inserted_with_both_media() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "https://r/v1.mp3")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::Completed);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 0);
        assert_eq!(report.fetch_failures, 0);
        assert_eq!(fetcher.call_count(), 2);

        let stored = local.get_by_id("a").await.unwrap().unwrap();
        assert!(!stored.local_image_path.is_empty());
        assert!(!stored.local_audio_path.is_empty());
    }

    #[tokio::test]
    async fn fill_missing_audio_preserves_existing_image() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "https://r/v1.mp3")]);
        let existing = MediaRecord {
            local_image_path: "/media/p1.jpg".to_string(),
            ..doc("a", "https://r/u1.jpg", "https://r/v1.mp3")
        };
        let local = MemoryCatalog::with_records([existing]);
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 1);

        // Only the audio was fetched; the populated image path is untouched.
        assert_eq!(fetcher.call_count(), 1);
        let stored = local.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.local_image_path, "/media/p1.jpg");
        assert!(!stored.local_audio_path.is_empty());
    }

    #[tokio::test]
    async fn local_only_records_are_never_touched() {
        let remote = MockRemote::new(vec![]);
        let local_only = MediaRecord {
            local_image_path: "/media/mine.jpg".to_string(),
            ..doc("b", "", "")
        };
        let local = MemoryCatalog::with_records([local_only.clone()]);
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.inserted, 0);
        assert_eq!(report.updated, 0);
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(local.get_by_id("b").await.unwrap().unwrap(), local_only);
    }

    #[tokio::test]
    async fn second_pass_with_no_changes_is_idempotent() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "https://r/v1.mp3")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let first = sync.synchronize().await.unwrap();
        assert_eq!(first.inserted, 1);
        let fetches_after_first = fetcher.call_count();

        let second = sync.synchronize().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(fetcher.call_count(), fetches_after_first);
    }

    #[tokio::test]
    async fn populated_path_is_never_refetched_even_if_remote_ref_changes() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote.clone(), local.clone(), fetcher.clone());

        sync.synchronize().await.unwrap();
        let stored = local.get_by_id("a").await.unwrap().unwrap();
        let original_path = stored.local_image_path.clone();
        assert!(!original_path.is_empty());

        // Remote reference changes; the local path must not.
        remote.set_docs(vec![doc("a", "https://r/u2.jpg", "")]);
        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.updated, 0);
        assert_eq!(fetcher.call_count(), 1);

        let stored = local.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.local_image_path, original_path);
    }

    #[tokio::test]
    async fn partial_fetch_failure_still_inserts_and_next_pass_fills_in() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "https://r/v1.mp3")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        fetcher.fail_audio.store(true, Ordering::SeqCst);
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let first = sync.synchronize().await.unwrap();
        assert_eq!(first.inserted, 1);
        assert_eq!(first.fetch_failures, 1);

        let stored = local.get_by_id("a").await.unwrap().unwrap();
        let image_path = stored.local_image_path.clone();
        assert!(!image_path.is_empty());
        assert!(stored.local_audio_path.is_empty());

        // Audio becomes fetchable; the next pass fills it in without
        // altering the image.
        fetcher.fail_audio.store(false, Ordering::SeqCst);
        let second = sync.synchronize().await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 1);
        assert_eq!(second.fetch_failures, 0);

        let stored = local.get_by_id("a").await.unwrap().unwrap();
        assert_eq!(stored.local_image_path, image_path);
        assert!(!stored.local_audio_path.is_empty());
    }

    #[tokio::test]
    async fn offline_gate_short_circuits_the_whole_pass() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = Synchronizer::new(
            remote.clone(),
            Arc::new(local.clone()),
            fetcher.clone(),
            Arc::new(OfflineGate),
            Arc::new(StaticIdentity::anonymous("tester")),
        );

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.outcome, SyncOutcome::SkippedOffline);
        assert_eq!(remote.call_count(), 0);
        assert_eq!(fetcher.call_count(), 0);
        assert_eq!(local.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn session_token_reaches_the_remote_read() {
        let remote = MockRemote::new(vec![doc("a", "", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let auth = StaticIdentity(crate::auth::Identity {
            user_id: "anon-7".to_string(),
            token: Some("tok-7".to_string()),
            anonymous: true,
        });
        let sync = Synchronizer::new(
            remote.clone(),
            Arc::new(local),
            fetcher,
            Arc::new(AlwaysOnline),
            Arc::new(auth),
        );

        sync.synchronize().await.unwrap();
        assert_eq!(remote.last_token().as_deref(), Some("tok-7"));
    }

    #[tokio::test]
    async fn tokenless_identity_reads_without_a_session_token() {
        let remote = MockRemote::new(vec![]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote.clone(), local, fetcher);

        sync.synchronize().await.unwrap();
        assert_eq!(remote.call_count(), 1);
        assert_eq!(remote.last_token(), None);
    }

    #[tokio::test]
    async fn auth_failure_aborts_before_any_remote_read() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = Synchronizer::new(
            remote.clone(),
            Arc::new(local),
            fetcher,
            Arc::new(AlwaysOnline),
            Arc::new(FailingAuth),
        );

        match sync.synchronize().await {
            Err(KeepsakeError::AuthFailure(_)) => {}
            other => panic!("expected AuthFailure, got {:?}", other),
        }
        assert_eq!(remote.call_count(), 0);
    }

    #[tokio::test]
    async fn remote_outage_aborts_the_pass_and_leaves_local_untouched() {
        let remote = MockRemote::new(vec![doc("a", "https://r/u1.jpg", "")]);
        remote.fail.store(true, Ordering::SeqCst);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher);

        match sync.synchronize().await {
            Err(KeepsakeError::RemoteUnavailable(_)) => {}
            other => panic!("expected RemoteUnavailable, got {:?}", other),
        }
        assert_eq!(local.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_documents_are_counted_not_inserted() {
        let remote = MockRemote::new(vec![
            doc("", "https://r/ghost.jpg", ""),
            doc("a", "https://r/u1.jpg", ""),
        ]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher);

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.remote_total, 2);
        assert_eq!(report.remote_ids, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.inserted, 1);
        assert_eq!(local.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_with_no_remote_media_is_inserted_without_fetching() {
        let remote = MockRemote::new(vec![doc("a", "", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = synchronizer(remote, local.clone(), fetcher.clone());

        let report = sync.synchronize().await.unwrap();
        assert_eq!(report.inserted, 1);
        assert_eq!(fetcher.call_count(), 0);

        let stored = local.get_by_id("a").await.unwrap().unwrap();
        assert!(stored.local_image_path.is_empty());
        assert!(stored.local_audio_path.is_empty());
    }

    #[tokio::test]
    async fn concurrent_trigger_is_a_noop_skip() {
        let entered = Arc::new(tokio::sync::Notify::new());
        let release = Arc::new(tokio::sync::Notify::new());
        let gate = BlockingGate {
            entered: entered.clone(),
            release: release.clone(),
        };

        let remote = MockRemote::new(vec![doc("a", "", "")]);
        let local = MemoryCatalog::new();
        let fetcher = MockFetcher::new();
        let sync = Arc::new(Synchronizer::new(
            remote,
            Arc::new(local),
            fetcher,
            Arc::new(gate),
            Arc::new(StaticIdentity::anonymous("tester")),
        ));

        // First pass parks inside the gate.
        let first = sync.clone().spawn();
        entered.notified().await;

        // Second trigger while the first is in flight: skip, don't queue.
        let second = sync.synchronize().await.unwrap();
        assert_eq!(second.outcome, SyncOutcome::SkippedInFlight);

        release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.outcome, SyncOutcome::Completed);

        // With the first pass done, a new trigger runs normally again.
        let third = sync.clone().spawn();
        entered.notified().await;
        release.notify_one();
        let third = third.await.unwrap().unwrap();
        assert_eq!(third.outcome, SyncOutcome::Completed);
    }
}
