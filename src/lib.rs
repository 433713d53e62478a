//! Client-side attestation headers for outbound API requests.
//!
//! Every protected request carries three headers:
//!
//! | Header | Value |
//! |--------|-------|
//! | `x-snapchat-att-token` | attestation token issued for the request key |
//! | `x-snapchat-att-sign` | base64 HMAC-SHA256 over the request and token |
//! | `x-request-consistent-tracking-id` | fresh random hex, one per call |
//!
//! Tokens are fetched by attesting a payload that binds the device to the
//! request, then exchanging the evidence with a token issuer. Both
//! collaborators sit behind traits ([`AttestationProvider`],
//! [`TokenIssuer`]); the crate owns the caching, coalescing and signing
//! around them.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use attested_headers::prelude::*;
//!
//! struct Provider;
//! impl AttestationProvider for Provider {
//!     fn attest(&self, _: &AttestationPayload) -> Result<AttestationBlob, AttestationError> {
//!         Ok(AttestationBlob::new(b"evidence".to_vec(), SecurityLevel::Software))
//!     }
//! }
//!
//! struct Issuer;
//! impl TokenIssuer for Issuer {
//!     fn get_tokens(&self, _: &GetTokensRequest) -> Result<GetTokensResponse, AttestationError> {
//!         let record = TokenRecord::with_ttl("T1", Duration::from_secs(3600), TokenKind::Argos)?;
//!         Ok(GetTokensResponse {
//!             tokens: vec![TokenAndPolicy::new(record, TokenPolicy::default())],
//!             cache_ttl: Duration::from_secs(3600),
//!             refresh_strategy: RefreshReason::PreemptiveRefresh,
//!         })
//!     }
//! }
//!
//! let orchestrator = AttestationOrchestrator::new(
//!     AttestationConfig::default(),
//!     DeviceIdentity::new("dev-1", Platform::Ios, "17.4", "12.1.0", "iPhone15,2", "Apple"),
//!     Arc::new(Provider),
//!     Arc::new(Issuer),
//!     SignatureEngine::generate(),
//! )
//! .unwrap();
//!
//! let request = RequestDescriptor::new("POST", "https://api.example.com/v1/x")
//!     .with_body(br#"{"a":1}"#.to_vec());
//! let headers = orchestrator.get_headers(&request, AttestationMode::Standard).unwrap();
//!
//! for (name, value) in headers.iter() {
//!     println!("{name}: {value}");
//! }
//! ```
//!
//! # Refresh Strategies
//!
//! | Reason | Effect |
//! |--------|--------|
//! | `BlockingRefresh` | drop every cached token and in-flight fetch |
//! | `PreemptiveRefresh` | drop tokens close to expiry |
//! | `Prewarming` | fetch tokens for hot endpoints not yet cached |
//!
//! # Logging
//!
//! The crate emits `tracing` events when `logging_enabled` is set and never
//! installs a subscriber.

#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

mod cache;
mod coalescer;
mod config;
mod constants;
mod device;
mod error;
mod headers;
mod metrics;
mod orchestrator;
mod payload;
pub mod prelude;
mod request;
mod signature;
mod token;
mod traits;

pub use cache::TokenCache;
pub use coalescer::{Acquired, FetchResult, Leadership, RequestCoalescer, Waiter};
pub use config::AttestationConfig;
pub use constants::{
    DEFAULT_ENDPOINT, DEFAULT_PREEMPTIVE_LOW_WATER, DEFAULT_RATE_LIMIT_PER_MINUTE,
    DEFAULT_RETRY_COUNT, DEFAULT_TIMEOUT, HEADER_SIGNATURE, HEADER_TOKEN, HEADER_TRACKING_ID,
    NONCE_LENGTH, TRACKING_ID_LENGTH,
};
pub use device::{DeviceIdentity, Platform};
pub use error::AttestationError;
pub use headers::AttestationHeaders;
pub use metrics::MetricsSnapshot;
pub use orchestrator::AttestationOrchestrator;
pub use payload::{AttestationPayload, AttestationPayloadBuilder, RequestMetadata};
pub use request::{AttestationMode, CacheKey, RequestDescriptor, body_digest};
pub use signature::SignatureEngine;
pub use token::{RefreshReason, TokenAndPolicy, TokenKind, TokenPolicy, TokenRecord};
pub use traits::{
    AttestationBlob, AttestationProvider, GetTokensRequest, GetTokensResponse, HotEndpoints,
    NoPrewarm, PrewarmSource, SecurityLevel, TokenIssuer,
};
