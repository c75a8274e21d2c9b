//! Logo cache controller
//!
//! Keeps the published [`LogoState`] consistent with the persistent record and
//! the remote settings. Each operation that changes the published value takes
//! a new generation number; results of an older generation are dropped, so
//! the most recently started operation always wins, regardless of which
//! network call resolves last. Store mutations are serialized behind a commit
//! lock and re-check the generation once the lock is held.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::cache_config::{CacheConfig, EncodingStrategy};
use super::reencoder::ImageReencoder;
use crate::client::{LogoBlob, LogoBlobFetcher, LogoFetch, SettingsClient};
use crate::errors::{LogoCacheError, LogoCacheResult};
use crate::models::{CachedLogoRecord, EmbeddedImage, LogoSettings, LogoState, fingerprint};
use crate::storage::PersistentLogoStore;
use crate::utils::time::{Clock, SystemClock};

/// Result of the network half of a refresh
#[derive(Debug)]
enum RemoteLogo {
    Absent(LogoSettings),
    Present {
        image: EmbeddedImage,
        settings: LogoSettings,
    },
}

/// What a background verification ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Server fingerprint matches the cached record
    Unchanged,
    /// Fingerprint changed and a refresh was run
    Refreshed,
    /// A refresh was in flight (or started meanwhile), nothing was checked
    Skipped,
    /// Settings could not be fetched; logged only
    Failed,
}

/// Pending change to the persisted record
enum StoreChange {
    Write(CachedLogoRecord),
    Delete,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Inner {
    settings_client: Arc<dyn SettingsClient>,
    fetcher: Arc<dyn LogoBlobFetcher>,
    store: PersistentLogoStore,
    reencoder: ImageReencoder,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
    state_tx: watch::Sender<LogoState>,
    /// Current generation; held while publishing so check-and-send is atomic
    generation: Mutex<u64>,
    commit_lock: tokio::sync::Mutex<()>,
    snapshot: RwLock<Option<LogoSettings>>,
    refreshes_in_flight: AtomicUsize,
    cancel: CancellationToken,
    background: Mutex<Vec<JoinHandle<()>>>,
}

/// Builder for [`LogoCacheController`]
pub struct LogoCacheControllerBuilder {
    settings_client: Arc<dyn SettingsClient>,
    fetcher: Arc<dyn LogoBlobFetcher>,
    store: PersistentLogoStore,
    reencoder: ImageReencoder,
    clock: Arc<dyn Clock>,
    config: CacheConfig,
}

impl LogoCacheControllerBuilder {
    pub fn reencoder(mut self, reencoder: ImageReencoder) -> Self {
        self.reencoder = reencoder;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> LogoCacheController {
        let (state_tx, _) = watch::channel(LogoState::empty());
        LogoCacheController {
            inner: Arc::new(Inner {
                settings_client: self.settings_client,
                fetcher: self.fetcher,
                store: self.store,
                reencoder: self.reencoder,
                clock: self.clock,
                config: self.config,
                state_tx,
                generation: Mutex::new(0),
                commit_lock: tokio::sync::Mutex::new(()),
                snapshot: RwLock::new(None),
                refreshes_in_flight: AtomicUsize::new(0),
                cancel: CancellationToken::new(),
                background: Mutex::new(Vec::new()),
            }),
        }
    }
}

/// Cheaply clonable handle; clones share state, store and cancellation
#[derive(Clone)]
pub struct LogoCacheController {
    inner: Arc<Inner>,
}

impl LogoCacheController {
    pub fn builder(
        settings_client: Arc<dyn SettingsClient>,
        fetcher: Arc<dyn LogoBlobFetcher>,
        store: PersistentLogoStore,
    ) -> LogoCacheControllerBuilder {
        LogoCacheControllerBuilder {
            settings_client,
            fetcher,
            store,
            reencoder: ImageReencoder::default(),
            clock: Arc::new(SystemClock),
            config: CacheConfig::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Current published value
    pub fn state(&self) -> LogoState {
        self.inner.state_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LogoState> {
        self.inner.state_tx.subscribe()
    }

    /// Last settings snapshot seen from the server or passed in by a collaborator
    pub fn settings_snapshot(&self) -> Option<LogoSettings> {
        self.inner
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The persisted record as currently stored
    pub async fn stored_record(&self) -> Option<CachedLogoRecord> {
        self.inner.store.read().await
    }

    /// Serve a valid cached record immediately and verify it in the
    /// background; otherwise refresh from the network
    pub async fn initialize(&self) -> LogoState {
        let generation = self.begin(|previous| Some(LogoState::loading_from(previous)));

        let now = self.inner.clock.now_millis();
        let cached = self
            .inner
            .store
            .read()
            .await
            .filter(|record| record.is_valid_for_use(now, self.inner.config.ttl));

        let Some(record) = cached else {
            debug!("No usable cached logo, refreshing from server");
            return self.refresh().await;
        };

        let Some(image) = record.encoded_image.clone() else {
            return self.refresh().await;
        };

        trace!(
            "Serving cached logo '{}' ({} bytes, age {:?})",
            record.content_fingerprint,
            image.encoded_len(),
            record.age(now)
        );
        self.set_snapshot(record.settings_snapshot.clone());
        if self.publish(generation, LogoState::ready(image)) {
            self.spawn_verify(record);
        }
        self.state()
    }

    /// Fetch settings and logo from the server, re-encode, persist and publish
    ///
    /// Any failure publishes the error with no logo and deletes the stored
    /// record. Returns the published value after this call settles.
    pub async fn refresh(&self) -> LogoState {
        if self.is_disposed() {
            return self.state();
        }

        let _in_flight = InFlightGuard::enter(&self.inner.refreshes_in_flight);
        let generation = self.begin(|previous| Some(LogoState::loading_from(previous)));

        let outcome = tokio::select! {
            _ = self.inner.cancel.cancelled() => {
                debug!("Logo refresh abandoned, controller disposed");
                return self.state();
            }
            outcome = self.load_remote_logo() => outcome,
        };

        match outcome {
            Ok(RemoteLogo::Present { image, settings }) => {
                let record = CachedLogoRecord::new(
                    Some(image.clone()),
                    settings.clone(),
                    self.inner.clock.now_millis(),
                );
                info!(
                    "Company logo refreshed: {} ({} bytes)",
                    record.content_fingerprint,
                    image.encoded_len()
                );
                self.commit(
                    generation,
                    StoreChange::Write(record),
                    Some(settings),
                    LogoState::ready(image),
                )
                .await;
            }
            Ok(RemoteLogo::Absent(settings)) => {
                debug!("Server reports no company logo");
                self.commit(generation, StoreChange::Delete, Some(settings), LogoState::empty())
                    .await;
            }
            Err(e) => {
                warn!("Logo refresh failed ({}): {}", e.kind(), e);
                self.commit(
                    generation,
                    StoreChange::Delete,
                    None,
                    LogoState::failed(e.to_string()),
                )
                .await;
            }
        }

        self.state()
    }

    /// Compare the server fingerprint against `record`, refreshing on mismatch
    ///
    /// Never publishes an error of its own.
    pub async fn verify(&self, record: &CachedLogoRecord) -> VerifyOutcome {
        if self.refresh_in_flight() {
            debug!("Skipping logo verification, refresh in flight");
            return VerifyOutcome::Skipped;
        }
        let started_at = self.current_generation();

        let settings = match self.inner.settings_client.get_company_settings().await {
            Ok(settings) => settings.logo_settings,
            Err(e) => {
                warn!("Background logo verification failed ({}): {}", e.kind(), e);
                return VerifyOutcome::Failed;
            }
        };

        if self.refresh_in_flight() || self.current_generation() != started_at {
            debug!("Logo state changed during verification, dropping result");
            return VerifyOutcome::Skipped;
        }

        let server_fingerprint = fingerprint(&settings);
        if server_fingerprint == record.content_fingerprint {
            trace!("Cached logo still current: {}", server_fingerprint);
            return VerifyOutcome::Unchanged;
        }

        info!(
            "Company logo changed on server ({} -> {}), refreshing",
            record.content_fingerprint, server_fingerprint
        );
        self.refresh().await;
        VerifyOutcome::Refreshed
    }

    /// Publish the empty state and delete the stored record; idempotent
    ///
    /// The empty state is published before the first await point, and any
    /// refresh still in flight is superseded.
    pub async fn clear(&self) -> LogoState {
        let generation = self.begin(|_| Some(LogoState::empty()));
        self.commit_store(generation, StoreChange::Delete).await;
        debug!("Logo cache cleared");
        self.state()
    }

    /// React to an upload or deletion performed by another component
    pub async fn update_after_external_change(&self, settings: LogoSettings) -> LogoState {
        let generation = self.begin(|_| None);
        self.set_snapshot(settings.clone());
        self.commit_store(generation, StoreChange::Delete).await;

        if settings.has_logo {
            self.refresh().await
        } else {
            self.publish(generation, LogoState::empty());
            self.state()
        }
    }

    /// Alias of [`Self::refresh`] matching the published contract
    pub async fn refetch_logo(&self) -> LogoState {
        self.refresh().await
    }

    /// Alias of [`Self::clear`] matching the published contract
    pub async fn clear_cache(&self) -> LogoState {
        self.clear().await
    }

    /// Alias of [`Self::update_after_external_change`]
    pub async fn update_logo(&self, settings: LogoSettings) -> LogoState {
        self.update_after_external_change(settings).await
    }

    /// Stop publishing and persisting; in-flight work is abandoned
    pub fn dispose(&self) {
        self.inner.cancel.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Wait for background verifications spawned so far
    pub async fn join_background_tasks(&self) {
        let handles: Vec<_> = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                debug!("Background logo task ended abnormally: {}", e);
            }
        }
    }

    async fn load_remote_logo(&self) -> LogoCacheResult<RemoteLogo> {
        let settings = self
            .inner
            .settings_client
            .get_company_settings()
            .await?
            .logo_settings;

        if !settings.has_logo || !references_a_file(&settings) {
            return Ok(RemoteLogo::Absent(settings));
        }
        let file_id = settings.file_id().ok_or(LogoCacheError::MissingIdentifier)?;

        debug!("Fetching company logo '{}'", file_id);
        let blob = match self.inner.fetcher.fetch_logo(&file_id).await? {
            LogoFetch::Found(blob) => blob,
            LogoFetch::NotFound => {
                debug!("Logo file '{}' not found on server", file_id);
                return Ok(RemoteLogo::Absent(settings));
            }
        };

        let image = self.encode(blob).await?;
        Ok(RemoteLogo::Present { image, settings })
    }

    async fn encode(&self, blob: LogoBlob) -> LogoCacheResult<EmbeddedImage> {
        let reencoder = self.inner.reencoder.clone();
        let strategy = self.inner.config.strategy;
        reencoder.validate(&blob.bytes, &blob.content_type)?;

        // Both strategies decode the image
        let image = tokio::task::spawn_blocking(move || match strategy {
            EncodingStrategy::Original => reencoder.wrap_original(&blob.bytes, &blob.content_type),
            EncodingStrategy::Reencode => reencoder.reencode(&blob.bytes, &blob.content_type),
        })
        .await
        .map_err(|e| LogoCacheError::Encode {
            message: e.to_string(),
        })??;
        Ok(image)
    }

    /// Start a new generation, optionally publishing a state derived from
    /// the current one in the same critical section
    fn begin<F>(&self, next_state: F) -> u64
    where
        F: FnOnce(&LogoState) -> Option<LogoState>,
    {
        let mut generation = self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *generation += 1;

        if !self.is_disposed() {
            let next = next_state(&self.inner.state_tx.borrow());
            if let Some(next) = next {
                self.inner.state_tx.send_replace(next);
            }
        }
        *generation
    }

    /// Publish `state` if `generation` is still current and not disposed
    fn publish(&self, generation: u64, state: LogoState) -> bool {
        let current = self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *current != generation || self.is_disposed() {
            trace!("Dropping superseded logo state (generation {})", generation);
            return false;
        }
        self.inner.state_tx.send_replace(state);
        true
    }

    fn current_generation(&self) -> u64 {
        *self
            .inner
            .generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn refresh_in_flight(&self) -> bool {
        self.inner.refreshes_in_flight.load(Ordering::SeqCst) > 0
    }

    fn set_snapshot(&self, settings: LogoSettings) {
        *self
            .inner
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(settings);
    }

    /// Apply the store change and publish, unless superseded
    async fn commit(
        &self,
        generation: u64,
        change: StoreChange,
        snapshot: Option<LogoSettings>,
        state: LogoState,
    ) -> bool {
        let _commit = self.inner.commit_lock.lock().await;
        if self.current_generation() != generation || self.is_disposed() {
            debug!("Logo refresh superseded (generation {})", generation);
            return false;
        }

        self.apply(change).await;
        if let Some(snapshot) = snapshot {
            self.set_snapshot(snapshot);
        }
        self.publish(generation, state)
    }

    /// Apply a store change without publishing, unless superseded
    async fn commit_store(&self, generation: u64, change: StoreChange) {
        let _commit = self.inner.commit_lock.lock().await;
        if self.current_generation() != generation || self.is_disposed() {
            return;
        }
        self.apply(change).await;
    }

    /// Storage failures are logged and dropped: the published value stays
    /// authoritative for this session
    async fn apply(&self, change: StoreChange) {
        let result = match &change {
            StoreChange::Write(record) => self.inner.store.write(record).await,
            StoreChange::Delete => self.inner.store.delete().await,
        };
        if let Err(e) = result.map_err(LogoCacheError::from) {
            warn!(
                "Logo cache persistence failed for '{}' ({}, ignored): {}",
                self.inner.store.key(),
                e.kind(),
                e
            );
        }
    }

    fn spawn_verify(&self, record: CachedLogoRecord) {
        let controller = self.clone();
        let cancel = self.inner.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                outcome = controller.verify(&record) => {
                    trace!("Background logo verification: {:?}", outcome);
                }
            }
        });
        self.inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }
}

/// A logo flag without any file name or URL is treated as "no logo"; a URL
/// that yields no identifier is an error instead
fn references_a_file(settings: &LogoSettings) -> bool {
    let non_blank = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
    non_blank(&settings.logo_file_name) || non_blank(&settings.logo_url)
}

impl std::fmt::Debug for LogoCacheController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogoCacheController")
            .field("config", &self.inner.config)
            .field("store", &self.inner.store)
            .field("state", &*self.inner.state_tx.borrow())
            .finish_non_exhaustive()
    }
}
