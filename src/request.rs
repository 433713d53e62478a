//! Request descriptors, attestation modes and cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Attestation mode requested for a call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttestationMode {
    /// Regular attestation.
    #[default]
    Standard,
    /// Attestation with additional device checks.
    Enhanced,
    /// Attestation compatible with legacy token consumers.
    Legacy,
}

impl AttestationMode {
    /// Returns the mode name as it appears in cache keys and payloads.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::Enhanced => "ENHANCED",
            Self::Legacy => "LEGACY",
        }
    }
}

impl fmt::Display for AttestationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound HTTP request that needs attestation headers.
///
/// # Examples
///
/// ```
/// use attested_headers::RequestDescriptor;
///
/// let request = RequestDescriptor::new("post", "https://api.example.com/v1/x")
///     .with_body(br#"{"a":1}"#.to_vec());
///
/// assert_eq!(request.method(), "POST");
/// assert!(request.body_digest().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    url: String,
    method: String,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    /// Creates a descriptor without a body. The method is upper-cased.
    #[must_use]
    pub fn new(method: impl AsRef<str>, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.as_ref().to_ascii_uppercase(),
            body: None,
        }
    }

    /// Attaches a request body.
    ///
    /// An empty body is still a body: its digest (of zero bytes) enters the
    /// payload and the signature, so `with_body("")` signs differently from
    /// a request with no body at all.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the upper-cased HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the raw body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Returns true if the request carries a body.
    #[must_use]
    pub const fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Returns the SHA-256 digest of the body as lowercase hex.
    #[must_use]
    pub fn body_digest(&self) -> Option<String> {
        self.body.as_deref().map(body_digest)
    }

    /// Derives the cache key for this request under `mode`.
    #[must_use]
    pub fn cache_key(&self, mode: AttestationMode) -> CacheKey {
        CacheKey::derive(&self.method, &self.url, mode)
    }
}

/// Returns the SHA-256 digest of `body` as lowercase hex.
///
/// The raw body never enters a signature base or payload; only this digest
/// does.
#[must_use]
pub fn body_digest(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Cache key identifying one (method, url, mode) triple.
///
/// ```text
/// key = len(METHOD) ":" METHOD ":" url ":" MODE
/// ```
///
/// The method length prefix keeps the encoding injective: a method that
/// itself contains `:` cannot collide with a different (method, url) pair.
/// Mode names never contain `:`, so the mode is always the last segment.
///
/// # Examples
///
/// ```
/// use attested_headers::{AttestationMode, CacheKey};
///
/// let key = CacheKey::derive("get", "https://api.example.com/a", AttestationMode::Standard);
/// assert_eq!(key.as_str(), "3:GET:https://api.example.com/a:STANDARD");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives a key from its three components.
    #[must_use]
    pub fn derive(method: &str, url: &str, mode: AttestationMode) -> Self {
        let method = method.to_ascii_uppercase();
        Self(format!("{}:{method}:{url}:{}", method.len(), mode.as_str()))
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_is_upper_cased() {
        let request = RequestDescriptor::new("patch", "https://api.example.com");
        assert_eq!(request.method(), "PATCH");
    }

    #[test]
    fn request_without_body() {
        let request = RequestDescriptor::new("GET", "https://api.example.com");
        assert!(!request.has_body());
        assert!(request.body().is_none());
        assert!(request.body_digest().is_none());
    }

    #[test]
    fn body_digest_is_sha256_hex() {
        let request = RequestDescriptor::new("POST", "https://api.example.com").with_body("abc");
        assert_eq!(
            request.body_digest().as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn empty_body_still_has_digest() {
        let request = RequestDescriptor::new("POST", "https://api.example.com").with_body("");
        assert!(request.has_body());
        assert_eq!(
            request.body_digest().as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn cache_key_ignores_body() {
        let plain = RequestDescriptor::new("POST", "https://api.example.com/x");
        let with_body = plain.clone().with_body("{}");
        assert_eq!(
            plain.cache_key(AttestationMode::Standard),
            with_body.cache_key(AttestationMode::Standard)
        );
    }

    #[test]
    fn cache_key_distinguishes_mode() {
        let request = RequestDescriptor::new("GET", "https://api.example.com/x");
        assert_ne!(
            request.cache_key(AttestationMode::Standard),
            request.cache_key(AttestationMode::Enhanced)
        );
    }

    #[test]
    fn cache_key_display() {
        let key = CacheKey::derive("delete", "https://a/b", AttestationMode::Legacy);
        assert_eq!(key.to_string(), "6:DELETE:https://a/b:LEGACY");
    }

    #[test]
    fn colon_in_method_does_not_collide() {
        let odd = RequestDescriptor::new("POST:https", "//x");
        let plain = RequestDescriptor::new("POST", "HTTPS://x");
        assert_ne!(
            odd.cache_key(AttestationMode::Standard),
            plain.cache_key(AttestationMode::Standard)
        );
    }

    #[test]
    fn default_mode_is_standard() {
        assert_eq!(AttestationMode::default(), AttestationMode::Standard);
    }
}
