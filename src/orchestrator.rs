//! Request-time orchestration: cache, coalesce, attest, sign.

use std::fmt;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::cache::TokenCache;
use crate::coalescer::{Acquired, FetchResult, Leadership, RequestCoalescer};
use crate::config::AttestationConfig;
use crate::device::DeviceIdentity;
use crate::error::AttestationError;
use crate::headers::AttestationHeaders;
use crate::metrics::{AttestationMetrics, MetricsSnapshot};
use crate::payload::AttestationPayloadBuilder;
use crate::request::{AttestationMode, CacheKey, RequestDescriptor};
use crate::signature::SignatureEngine;
use crate::token::{RefreshReason, TokenAndPolicy};
use crate::traits::{AttestationProvider, GetTokensRequest, NoPrewarm, PrewarmSource, TokenIssuer};

/// Produces attestation headers for outbound requests.
///
/// Each `(method, url, mode)` key moves through
/// `ABSENT -> FETCHING -> CACHED`, and back to `ABSENT` once its token
/// expires or is evicted. Concurrent callers on a cold key share one
/// provider/issuer round trip.
///
/// The orchestrator is an owned value; share it between threads with
/// `Arc`. The async and callback entry points take `&Arc<Self>`.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use attested_headers::prelude::*;
///
/// struct Provider;
/// impl AttestationProvider for Provider {
///     fn attest(&self, _: &AttestationPayload) -> Result<AttestationBlob, AttestationError> {
///         Ok(AttestationBlob::new(b"evidence".to_vec(), SecurityLevel::Software))
///     }
/// }
///
/// struct Issuer;
/// impl TokenIssuer for Issuer {
///     fn get_tokens(&self, _: &GetTokensRequest) -> Result<GetTokensResponse, AttestationError> {
///         let record = TokenRecord::with_ttl("T1", Duration::from_secs(3600), TokenKind::Argos)?;
///         Ok(GetTokensResponse {
///             tokens: vec![TokenAndPolicy::new(record, TokenPolicy::default())],
///             cache_ttl: Duration::from_secs(3600),
///             refresh_strategy: RefreshReason::PreemptiveRefresh,
///         })
///     }
/// }
///
/// let device = DeviceIdentity::new("dev-1", Platform::Android, "14", "12.1.0", "Pixel 8", "Google");
/// let orchestrator = AttestationOrchestrator::new(
///     AttestationConfig::default(),
///     device,
///     Arc::new(Provider),
///     Arc::new(Issuer),
///     SignatureEngine::new(b"shared-secret".to_vec()),
/// )
/// .unwrap();
///
/// let request = RequestDescriptor::new("GET", "https://api.example.com/feed");
/// let headers = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
///
/// assert_eq!(headers.token(), "T1");
/// assert_eq!(headers.tracking_id().len(), 32);
/// ```
pub struct AttestationOrchestrator {
    config: AttestationConfig,
    payloads: AttestationPayloadBuilder,
    provider: Arc<dyn AttestationProvider>,
    issuer: Arc<dyn TokenIssuer>,
    signer: SignatureEngine,
    cache: TokenCache,
    coalescer: RequestCoalescer,
    metrics: AttestationMetrics,
    prewarm: Arc<dyn PrewarmSource>,
}

impl fmt::Debug for AttestationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttestationOrchestrator")
            .field("config", &self.config)
            .field("device", self.payloads.device())
            .field("signer", &self.signer)
            .field("cached", &self.cache.len())
            .field("in_flight", &self.coalescer.in_flight())
            .finish_non_exhaustive()
    }
}

impl AttestationOrchestrator {
    /// Creates an orchestrator with an empty cache and no prewarming.
    ///
    /// # Errors
    ///
    /// Returns `AttestationError::InvalidConfiguration` if the config or
    /// the device identity is incomplete.
    pub fn new(
        config: AttestationConfig,
        identity: DeviceIdentity,
        provider: Arc<dyn AttestationProvider>,
        issuer: Arc<dyn TokenIssuer>,
        signer: SignatureEngine,
    ) -> Result<Self, AttestationError> {
        config.validate()?;
        identity.validate()?;

        Ok(Self {
            config,
            payloads: AttestationPayloadBuilder::new(identity),
            provider,
            issuer,
            signer,
            cache: TokenCache::new(),
            coalescer: RequestCoalescer::new(),
            metrics: AttestationMetrics::new(),
            prewarm: Arc::new(NoPrewarm),
        })
    }

    /// Replaces the source consulted by a `Prewarming` refresh.
    #[must_use]
    pub fn with_prewarm_source(mut self, source: Arc<dyn PrewarmSource>) -> Self {
        self.prewarm = source;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &AttestationConfig {
        &self.config
    }

    /// Returns the attesting device.
    #[must_use]
    pub const fn identity(&self) -> &DeviceIdentity {
        self.payloads.device()
    }

    /// Returns the token cache.
    #[must_use]
    pub const fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Returns a copy of the current metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Returns attestation headers for `request`, blocking the caller.
    ///
    /// An unexpired cached token is reused without contacting the provider
    /// or the issuer. Otherwise the caller either fetches a token or waits
    /// for the fetch already in flight for the same key.
    ///
    /// # Errors
    ///
    /// Returns `AttestationFailure` or `TokenIssuanceFailure` when the
    /// fetch for this key fails, and `Internal` if the fetching thread
    /// exits without a result.
    pub fn get_headers(
        &self,
        request: &RequestDescriptor,
        mode: AttestationMode,
    ) -> Result<AttestationHeaders, AttestationError> {
        let started = Instant::now();
        let key = request.cache_key(mode);

        let token = match self.cached(&key) {
            Some(token) => {
                self.metrics.record_hit();
                if self.config.logging_enabled {
                    debug!(key = %key, "token cache hit");
                }
                token
            }
            None => {
                self.metrics.record_miss();
                if self.config.logging_enabled {
                    debug!(key = %key, "token cache miss");
                }
                self.obtain(&key, request, mode)?
            }
        };

        let signing = Instant::now();
        let signature = self.signer.sign(
            request.method(),
            request.url(),
            token.token_value(),
            Utc::now().timestamp_millis(),
            request.body_digest().as_deref(),
        );
        self.metrics.record_signature(signing.elapsed());

        let headers = AttestationHeaders::new(
            token.token_value(),
            signature,
            AttestationHeaders::new_tracking_id(),
        );
        self.metrics.record_total(started.elapsed());
        Ok(headers)
    }

    /// Async form of [`get_headers`](Self::get_headers).
    ///
    /// The work runs on the tokio blocking pool, so the calling task never
    /// blocks on a fetch. Resolves exactly once. There is no cancellation;
    /// wrap the future in `tokio::time::timeout` to bound the wait.
    ///
    /// # Errors
    ///
    /// Returns the same errors as `get_headers`, plus `Internal` if the
    /// blocking task panics or is cancelled by runtime shutdown.
    ///
    /// # Panics
    ///
    /// Panics if polled outside a tokio runtime. Any flavor works,
    /// including `current_thread`.
    pub async fn get_headers_async(
        self: &Arc<Self>,
        request: RequestDescriptor,
        mode: AttestationMode,
    ) -> Result<AttestationHeaders, AttestationError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.get_headers(&request, mode))
            .await
            .map_err(|e| AttestationError::internal(format!("header task failed: {e}")))?
    }

    /// Callback form of [`get_headers`](Self::get_headers).
    ///
    /// The work runs on a new thread and `callback` is invoked exactly
    /// once on that thread. The returned handle may be joined or dropped.
    pub fn get_headers_with_callback<F>(
        self: &Arc<Self>,
        request: RequestDescriptor,
        mode: AttestationMode,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<AttestationHeaders, AttestationError>) + Send + 'static,
    {
        let this = Arc::clone(self);
        std::thread::spawn(move || callback(this.get_headers(&request, mode)))
    }

    /// Applies a refresh strategy and returns how many keys it touched.
    ///
    /// - `BlockingRefresh` empties the cache and detaches every in-flight
    ///   fetch before returning, so no later call observes a token issued
    ///   before the refresh. Returns the number of records removed.
    /// - `PreemptiveRefresh` removes records with less than
    ///   `preemptive_low_water` lifetime left. Returns the number removed.
    /// - `Prewarming` fetches every hot endpoint that is not cached.
    ///   Failures are logged and skipped. Returns the number fetched.
    pub fn refresh(&self, reason: RefreshReason) -> usize {
        self.metrics.record_refresh();
        let touched = match reason {
            RefreshReason::BlockingRefresh => {
                let removed = self.cache.clear();
                let detached = self.coalescer.detach_all();
                if self.config.logging_enabled && detached > 0 {
                    debug!(detached, "detached in-flight fetches");
                }
                removed
            }
            RefreshReason::PreemptiveRefresh => self
                .cache
                .evict_expiring(Utc::now(), self.config.preemptive_low_water),
            RefreshReason::Prewarming => self.prewarm(),
        };
        if self.config.logging_enabled {
            info!(reason = %reason, touched, "token refresh");
        }
        touched
    }

    fn prewarm(&self) -> usize {
        let mut fetched = 0;
        for (request, mode) in self.prewarm.hot_endpoints() {
            let key = request.cache_key(mode);
            if self.cached(&key).is_some() {
                continue;
            }
            match self.obtain(&key, &request, mode) {
                Ok(_) => fetched += 1,
                Err(e) => {
                    if self.config.logging_enabled {
                        warn!(key = %key, error = %e, "prewarm fetch failed");
                    }
                }
            }
        }
        fetched
    }

    /// Returns the cached record for `key` if it has not expired.
    fn cached(&self, key: &CacheKey) -> Option<TokenAndPolicy> {
        self.cache.lookup(key).filter(|entry| !entry.is_expired())
    }

    /// Fetches a token for `key` as leader, or waits for the current leader.
    fn obtain(
        &self,
        key: &CacheKey,
        request: &RequestDescriptor,
        mode: AttestationMode,
    ) -> FetchResult {
        match self.coalescer.acquire(key) {
            Acquired::Leader(leadership) => self.lead(leadership, request, mode),
            Acquired::Follower(waiter) => {
                self.metrics.record_coalesced();
                if self.config.logging_enabled {
                    debug!(key = %key, "waiting on in-flight fetch");
                }
                waiter.wait()
            }
        }
    }

    fn lead(
        &self,
        leadership: Leadership<'_>,
        request: &RequestDescriptor,
        mode: AttestationMode,
    ) -> FetchResult {
        // A previous leader may have stored between our lookup and acquire.
        if let Some(entry) = self.cached(leadership.key()) {
            leadership.complete(Ok(entry.clone()));
            return Ok(entry);
        }

        let generation = self.cache.generation();
        let result = self.fetch(request, mode);

        match &result {
            Ok(entry) => {
                let stored = self.cache.store_if_generation(
                    leadership.key().clone(),
                    entry.clone(),
                    generation,
                );
                if !stored && self.config.logging_enabled {
                    debug!(key = %leadership.key(), "cache cleared during fetch; token not stored");
                }
            }
            Err(e) => {
                if self.config.logging_enabled {
                    warn!(key = %leadership.key(), error = %e, "token fetch failed");
                }
            }
        }

        let released = leadership.complete(result.clone());
        if self.config.logging_enabled && released > 0 {
            debug!(released, "released coalesced waiters");
        }
        result
    }

    /// One provider/issuer round trip. Never touches the cache.
    fn fetch(&self, request: &RequestDescriptor, mode: AttestationMode) -> FetchResult {
        let building = Instant::now();
        let timestamp = Utc::now();
        let payload = self.payloads.build(request, mode, timestamp);
        let canonical = payload.canonical_bytes();
        let payload_latency = building.elapsed();

        let attesting = Instant::now();
        let result = canonical.and_then(|canonical| {
            let attestation = self.provider.attest(&payload)?;
            let response = self.issuer.get_tokens(&GetTokensRequest {
                url: request.url().to_string(),
                method: request.method().to_string(),
                body_hash: request.body_digest(),
                timestamp,
                device: self.payloads.device().clone(),
                mode,
                attestation,
                payload: canonical,
                endpoint: self.config.endpoint.clone(),
                timeout: self.config.timeout,
            })?;
            let entry = response
                .tokens
                .into_iter()
                .next()
                .ok_or_else(|| AttestationError::issuance("issuer returned no tokens"))?;
            if entry.is_expired() {
                return Err(AttestationError::issuance("issuer returned an expired token"));
            }
            Ok(entry)
        });

        self.metrics
            .record_fetch(payload_latency, attesting.elapsed(), result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::device::Platform;
    use crate::payload::AttestationPayload;
    use crate::token::{TokenKind, TokenPolicy, TokenRecord};
    use crate::traits::{AttestationBlob, GetTokensResponse, HotEndpoints, SecurityLevel};

    struct Provider;

    impl AttestationProvider for Provider {
        fn attest(&self, _: &AttestationPayload) -> Result<AttestationBlob, AttestationError> {
            Ok(AttestationBlob::new(b"ok".to_vec(), SecurityLevel::Software))
        }
    }

    #[derive(Default)]
    struct Issuer {
        calls: AtomicUsize,
        ttl_secs: u64,
        empty: bool,
    }

    impl TokenIssuer for Issuer {
        fn get_tokens(
            &self,
            request: &GetTokensRequest,
        ) -> Result<GetTokensResponse, AttestationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert!(!request.payload.is_empty());
            let tokens = if self.empty {
                Vec::new()
            } else {
                let record = TokenRecord::with_ttl(
                    format!("T{n}"),
                    Duration::from_secs(self.ttl_secs),
                    TokenKind::Argos,
                )?;
                vec![TokenAndPolicy::new(record, TokenPolicy::default())]
            };
            Ok(GetTokensResponse {
                tokens,
                cache_ttl: Duration::from_secs(self.ttl_secs),
                refresh_strategy: RefreshReason::PreemptiveRefresh,
            })
        }
    }

    fn device() -> DeviceIdentity {
        DeviceIdentity::new("dev-1", Platform::Ios, "17.4", "12.1.0", "iPhone15,2", "Apple")
    }

    fn orchestrator(issuer: Arc<Issuer>) -> AttestationOrchestrator {
        AttestationOrchestrator::new(
            AttestationConfig::default().with_logging_enabled(false),
            device(),
            Arc::new(Provider),
            issuer,
            SignatureEngine::new(b"k".to_vec()),
        )
        .unwrap()
    }

    fn issuer(ttl_secs: u64) -> Arc<Issuer> {
        Arc::new(Issuer {
            ttl_secs,
            ..Issuer::default()
        })
    }

    #[test]
    fn rejects_incomplete_identity() {
        let err = AttestationOrchestrator::new(
            AttestationConfig::default(),
            DeviceIdentity::new("", Platform::Android, "14", "1.0", "Pixel", "Google"),
            Arc::new(Provider),
            issuer(3600),
            SignatureEngine::new(b"k".to_vec()),
        )
        .unwrap_err();
        assert_eq!(err, AttestationError::invalid_configuration("device_id"));
    }

    #[test]
    fn modes_are_cached_separately() {
        let issuer = issuer(3600);
        let orchestrator = orchestrator(Arc::clone(&issuer));
        let request = RequestDescriptor::new("GET", "https://api.example.com/a");

        let standard = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
        let enhanced = orchestrator.get_headers(&request, AttestationMode::Enhanced).unwrap();

        assert_ne!(standard.token(), enhanced.token());
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.cache().len(), 2);
    }

    #[test]
    fn empty_issuer_response_is_an_issuance_failure() {
        let issuer = Arc::new(Issuer {
            ttl_secs: 3600,
            empty: true,
            ..Issuer::default()
        });
        let orchestrator = orchestrator(issuer);
        let request = RequestDescriptor::new("GET", "https://api.example.com/a");

        let err = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap_err();

        assert!(err.is_issuance_failure());
        assert!(orchestrator.cache().is_empty());
        assert_eq!(orchestrator.metrics().fetch_failures, 1);
    }

    #[test]
    fn preemptive_refresh_refetches_short_lived_tokens() {
        let issuer = issuer(60);
        let orchestrator = orchestrator(Arc::clone(&issuer));
        let request = RequestDescriptor::new("GET", "https://api.example.com/a");

        let first = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
        assert_eq!(orchestrator.refresh(RefreshReason::PreemptiveRefresh), 1);
        let second = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();

        assert_eq!(first.token(), "T1");
        assert_eq!(second.token(), "T2");
    }

    #[test]
    fn prewarming_skips_cached_endpoints() {
        let issuer = issuer(3600);
        let feed = RequestDescriptor::new("GET", "https://api.example.com/feed");
        let chat = RequestDescriptor::new("POST", "https://api.example.com/chat");
        let orchestrator = orchestrator(Arc::clone(&issuer)).with_prewarm_source(Arc::new(
            HotEndpoints::new()
                .with(feed.clone(), AttestationMode::Standard)
                .with(chat, AttestationMode::Standard),
        ));

        orchestrator.get_headers(&feed, AttestationMode::Standard).unwrap();
        assert_eq!(orchestrator.refresh(RefreshReason::Prewarming), 1);
        assert_eq!(issuer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.refresh(RefreshReason::Prewarming), 0);
    }

    #[test]
    fn metrics_track_hits_and_misses() {
        let orchestrator = orchestrator(issuer(3600));
        let request = RequestDescriptor::new("GET", "https://api.example.com/a");

        for _ in 0..4 {
            orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
        }

        let metrics = orchestrator.metrics();
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.cache_hits, 3);
        assert_eq!(metrics.fetches, 1);
    }
}
