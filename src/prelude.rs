//! Convenient re-exports for glob imports.
//!
//! ```rust
//! use attested_headers::prelude::*;
//!
//! let request = RequestDescriptor::new("GET", "https://api.example.com/feed");
//! let key = request.cache_key(AttestationMode::Standard);
//! assert_eq!(key.as_str(), "3:GET:https://api.example.com/feed:STANDARD");
//! ```
//!
//! The coalescer role types (`Acquired`, `Leadership`, `Waiter`) are left
//! out; only code driving a `RequestCoalescer` directly needs them.

pub use crate::{
    // Orchestration
    AttestationHeaders, AttestationOrchestrator, RefreshReason,
    // Request model
    AttestationMode, CacheKey, DeviceIdentity, Platform, RequestDescriptor, body_digest,
    // Payload and signing
    AttestationPayload, AttestationPayloadBuilder, RequestMetadata, SignatureEngine,
    // Tokens and storage
    RequestCoalescer, TokenAndPolicy, TokenCache, TokenKind, TokenPolicy, TokenRecord,
    // Collaborators
    AttestationBlob, AttestationProvider, GetTokensRequest, GetTokensResponse, HotEndpoints,
    NoPrewarm, PrewarmSource, SecurityLevel, TokenIssuer,
    // Configuration, errors, metrics
    AttestationConfig, AttestationError, MetricsSnapshot,
};
