//! Per-identity-provider metadata cache
//!
//! One slot per metadata address. Readers load the current entry through an
//! `ArcSwapOption` without locking; population and refresh of a slot are
//! serialized by that slot's own mutex, so unrelated providers never wait on
//! each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::discovery::{DiscoveredMetadata, DiscoveryClient};
use super::error::MetadataError;
use super::jwks::SigningKey;
use super::options::AuthenticationConfig;

/// Discovery result for one metadata address; replaced whole on refresh
#[derive(Debug)]
pub struct CachedMetadata {
    address: String,
    issuer: String,
    signing_keys: Vec<SigningKey>,
    fetched_at: Instant,
}

impl CachedMetadata {
    fn new(address: &str, discovered: DiscoveredMetadata) -> Self {
        Self {
            address: address.to_string(),
            issuer: discovered.issuer,
            signing_keys: discovered.signing_keys,
            fetched_at: Instant::now(),
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn signing_keys(&self) -> &[SigningKey] {
        &self.signing_keys
    }

    #[must_use]
    pub fn has_key(&self, kid: &str) -> bool {
        self.signing_keys.iter().any(|k| k.kid() == Some(kid))
    }

    #[must_use]
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

#[derive(Debug, Default)]
struct FetchState {
    require_https: bool,
    last_attempt: Option<Instant>,
    last_failure: Option<(Instant, MetadataError)>,
}

#[derive(Debug, Default)]
struct Slot {
    entry: ArcSwapOption<CachedMetadata>,
    fetch: tokio::sync::Mutex<FetchState>,
}

/// Timing knobs of the cache
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    pub refresh_interval: Duration,
    pub refresh_cooldown: Duration,
    pub max_stale: Duration,
}

impl From<&AuthenticationConfig> for CacheSettings {
    fn from(config: &AuthenticationConfig) -> Self {
        Self {
            refresh_interval: config.metadata_refresh_interval(),
            refresh_cooldown: config.metadata_refresh_cooldown(),
            max_stale: config.metadata_max_stale(),
        }
    }
}

/// Concurrent cache of discovery metadata keyed by metadata address
pub struct MetadataCache {
    client: Arc<dyn DiscoveryClient>,
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    settings: CacheSettings,
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("settings", &self.settings)
            .field("entries", &self.slots.read().len())
            .finish_non_exhaustive()
    }
}

impl MetadataCache {
    #[must_use]
    pub fn new(client: Arc<dyn DiscoveryClient>, settings: CacheSettings) -> Self {
        Self {
            client,
            slots: RwLock::new(HashMap::new()),
            settings,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Current entry for `address`, populating or refreshing it as needed.
    ///
    /// Concurrent first accesses share one fetch. A failed refresh keeps
    /// serving the previous entry until it is older than the max-stale window.
    pub async fn get_configuration(
        &self,
        address: &str,
        require_https: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<CachedMetadata>, MetadataError> {
        let slot = self.slot(address);

        if let Some(entry) = slot.entry.load_full() {
            if entry.age() < self.settings.refresh_interval {
                record_lookup(true);
                return Ok(entry);
            }
            return self.refresh_stale(&slot, entry, cancel).await;
        }

        record_lookup(false);
        self.populate(&slot, address, require_https, cancel).await
    }

    /// Force an out-of-band refresh of an existing entry.
    ///
    /// Returns `Ok(false)` without fetching when the address has no entry or
    /// the last attempt is within the cooldown.
    pub async fn refresh_configuration(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, MetadataError> {
        let Some(slot) = self.slots.read().get(address).cloned() else {
            return Ok(false);
        };
        if slot.entry.load().is_none() {
            return Ok(false);
        }

        let mut state = lock_cancellable(&slot, cancel).await?;
        if self.in_cooldown(&state) {
            tracing::debug!(address, "Metadata refresh skipped, cooldown active");
            return Ok(false);
        }

        let require_https = state.require_https;
        self.fetch_into(&slot, &mut state, address, require_https, cancel)
            .await
            .map(|_| true)
    }

    /// Addresses that currently hold an entry
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.entry.load().is_some())
            .map(|(address, _)| address.clone())
            .collect()
    }

    fn slot(&self, address: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(address) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(address.to_string()).or_default())
    }

    fn in_cooldown(&self, state: &FetchState) -> bool {
        state
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.settings.refresh_cooldown)
    }

    async fn populate(
        &self,
        slot: &Slot,
        address: &str,
        require_https: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<CachedMetadata>, MetadataError> {
        let queued_at = Instant::now();
        let mut state = lock_cancellable(slot, cancel).await?;

        if let Some(entry) = slot.entry.load_full() {
            return Ok(entry);
        }
        if let Some((failed_at, err)) = &state.last_failure
            && *failed_at >= queued_at
        {
            return Err(err.clone());
        }

        self.fetch_into(slot, &mut state, address, require_https, cancel)
            .await
    }

    async fn refresh_stale(
        &self,
        slot: &Slot,
        stale: Arc<CachedMetadata>,
        cancel: &CancellationToken,
    ) -> Result<Arc<CachedMetadata>, MetadataError> {
        // Another caller is already refreshing this slot
        let Ok(mut state) = slot.fetch.try_lock() else {
            return self.serve_stale(stale, None);
        };

        // Replaced while we were checking
        if let Some(current) = slot.entry.load_full()
            && !Arc::ptr_eq(&current, &stale)
        {
            return Ok(current);
        }

        if self.in_cooldown(&state) {
            let last_failure = state.last_failure.as_ref().map(|(_, e)| e.clone());
            return self.serve_stale(stale, last_failure);
        }

        let require_https = state.require_https;
        match self
            .fetch_into(slot, &mut state, stale.address(), require_https, cancel)
            .await
        {
            Ok(fresh) => Ok(fresh),
            Err(MetadataError::Cancelled) => Err(MetadataError::Cancelled),
            Err(err) => self.serve_stale(stale, Some(err)),
        }
    }

    fn serve_stale(
        &self,
        stale: Arc<CachedMetadata>,
        failure: Option<MetadataError>,
    ) -> Result<Arc<CachedMetadata>, MetadataError> {
        if stale.age() <= self.settings.max_stale {
            if let Some(err) = &failure {
                tracing::warn!(
                    address = stale.address(),
                    age_secs = stale.age().as_secs(),
                    error = %err,
                    "Serving stale metadata after refresh failure"
                );
            }
            return Ok(stale);
        }

        let err = failure.unwrap_or_else(|| MetadataError::Fetch {
            url: stale.address().to_string(),
            reason: "cached metadata expired and refresh is pending".to_string(),
        });
        tracing::error!(
            address = stale.address(),
            error = %err,
            "Cached metadata exceeded the max-stale window"
        );
        Err(err)
    }

    async fn fetch_into(
        &self,
        slot: &Slot,
        state: &mut FetchState,
        address: &str,
        require_https: bool,
        cancel: &CancellationToken,
    ) -> Result<Arc<CachedMetadata>, MetadataError> {
        let started = Instant::now();
        let result = tokio::select! {
            result = self.client.fetch(address, require_https) => result,
            () = cancel.cancelled() => return Err(MetadataError::Cancelled),
        };
        state.last_attempt = Some(Instant::now());
        record_fetch(result.is_ok(), started.elapsed());

        match result {
            Ok(discovered) => {
                let entry = Arc::new(CachedMetadata::new(address, discovered));
                slot.entry.store(Some(Arc::clone(&entry)));
                state.require_https = require_https;
                state.last_failure = None;
                Ok(entry)
            }
            Err(err) => {
                tracing::error!(address, error = %err, "Metadata retrieval failed");
                state.last_failure = Some((Instant::now(), err.clone()));
                Err(err)
            }
        }
    }
}

async fn lock_cancellable<'a>(
    slot: &'a Slot,
    cancel: &CancellationToken,
) -> Result<tokio::sync::MutexGuard<'a, FetchState>, MetadataError> {
    tokio::select! {
        guard = slot.fetch.lock() => Ok(guard),
        () = cancel.cancelled() => Err(MetadataError::Cancelled),
    }
}

#[cfg(feature = "metrics")]
fn record_lookup(hit: bool) {
    crate::observability::record_metadata_lookup(hit);
}

#[cfg(not(feature = "metrics"))]
const fn record_lookup(_hit: bool) {}

#[cfg(feature = "metrics")]
fn record_fetch(success: bool, elapsed: Duration) {
    crate::observability::record_discovery_fetch(success, elapsed);
}

#[cfg(not(feature = "metrics"))]
const fn record_fetch(_success: bool, _elapsed: Duration) {}

/// Background refresh of every cached entry
pub struct MetadataRefreshTask {
    cache: Arc<MetadataCache>,
    interval: Duration,
}

impl std::fmt::Debug for MetadataRefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRefreshTask")
            .field("cache", &self.cache)
            .field("interval", &self.interval)
            .finish()
    }
}

impl MetadataRefreshTask {
    #[must_use]
    pub const fn new(cache: Arc<MetadataCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.refresh_all(&shutdown).await,
                    () = shutdown.cancelled() => {
                        tracing::debug!("Metadata refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }

    async fn refresh_all(&self, shutdown: &CancellationToken) {
        for address in self.cache.addresses() {
            match self.cache.refresh_configuration(&address, shutdown).await {
                Ok(true) => tracing::debug!(address = %address, "Metadata refreshed"),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Background metadata refresh failed");
                }
            }
        }
    }
}
