//! Wire names and default values.

use std::time::Duration;

/// Header carrying the opaque attestation token.
pub const HEADER_TOKEN: &str = "x-snapchat-att-token";

/// Header carrying the base64 request signature.
pub const HEADER_SIGNATURE: &str = "x-snapchat-att-sign";

/// Header carrying the per-call tracking identifier.
pub const HEADER_TRACKING_ID: &str = "x-request-consistent-tracking-id";

/// Default token-issuing endpoint.
pub const DEFAULT_ENDPOINT: &str =
    "https://gcp.api.snapchat.com/snap.security.ArgosService/GetTokens";

/// Default round-trip timeout handed to collaborators.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default retry budget handed to collaborators.
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Remaining lifetime below which a preemptive refresh evicts an entry.
pub const DEFAULT_PREEMPTIVE_LOW_WATER: Duration = Duration::from_secs(300);

/// Default per-minute rate limit attached to issued token policies.
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

/// Nonce length in bytes (128 bits).
pub const NONCE_LENGTH: usize = 16;

/// Tracking identifier length in bytes before hex encoding.
pub const TRACKING_ID_LENGTH: usize = 16;
