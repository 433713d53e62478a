//! Request signatures.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Keyed request signer.
///
/// Signs the canonical string
///
/// ```text
/// METHOD "\n" URL "\n" TOKEN "\n" TIMESTAMP [ "\n" BODY_DIGEST ]
/// ```
///
/// with HMAC-SHA256 and encodes the MAC as standard base64. Changing any
/// one field changes the signature.
///
/// # Examples
///
/// ```
/// use attested_headers::SignatureEngine;
///
/// let engine = SignatureEngine::new(b"client-signing-key".to_vec());
/// let a = engine.sign("GET", "https://api.example.com/a", "token", 1_700_000_000_000, None);
/// let b = engine.sign("GET", "https://api.example.com/a", "token", 1_700_000_000_000, None);
/// assert_eq!(a, b);
///
/// let c = engine.sign("GET", "https://api.example.com/a", "token", 1_700_000_000_001, None);
/// assert_ne!(a, c);
/// ```
#[derive(Clone)]
pub struct SignatureEngine {
    key: Vec<u8>,
}

impl SignatureEngine {
    /// Creates an engine keyed with `key`.
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    /// Creates an engine with a random 32-byte key.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = vec![0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    /// Builds the newline-joined string that gets signed.
    #[must_use]
    pub fn canonical_string(
        method: &str,
        url: &str,
        token: &str,
        timestamp_ms: i64,
        body_digest: Option<&str>,
    ) -> String {
        let method = method.to_ascii_uppercase();
        match body_digest {
            Some(digest) => format!("{method}\n{url}\n{token}\n{timestamp_ms}\n{digest}"),
            None => format!("{method}\n{url}\n{token}\n{timestamp_ms}"),
        }
    }

    /// Signs a request and returns the base64-encoded MAC.
    ///
    /// `body_digest` must be a digest of the body (see
    /// [`body_digest`](crate::body_digest)), never the raw body.
    ///
    /// # Panics
    ///
    /// Does not panic; HMAC accepts keys of any length.
    #[must_use]
    pub fn sign(
        &self,
        method: &str,
        url: &str,
        token: &str,
        timestamp_ms: i64,
        body_digest: Option<&str>,
    ) -> String {
        let canonical = Self::canonical_string(method, url, token, timestamp_ms, body_digest);
        let mut mac = HmacSha256::new_from_slice(&self.key).expect("HMAC accepts any key length");
        mac.update(canonical.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }
}

impl std::fmt::Debug for SignatureEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureEngine")
            .field("key_len", &self.key.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://api.example.com/v1/x";

    #[test]
    fn canonical_string_without_body() {
        let s = SignatureEngine::canonical_string("post", URL, "T1", 42, None);
        assert_eq!(s, "POST\nhttps://api.example.com/v1/x\nT1\n42");
    }

    #[test]
    fn canonical_string_with_body_digest() {
        let s = SignatureEngine::canonical_string("POST", URL, "T1", 42, Some("abcd"));
        assert_eq!(s, "POST\nhttps://api.example.com/v1/x\nT1\n42\nabcd");
    }

    #[test]
    fn signature_is_base64_of_32_bytes() {
        let engine = SignatureEngine::new(b"k".to_vec());
        let sig = engine.sign("GET", URL, "T1", 1, None);
        let raw = STANDARD.decode(sig).unwrap();
        assert_eq!(raw.len(), 32);
    }

    #[test]
    fn method_case_does_not_matter() {
        let engine = SignatureEngine::new(b"k".to_vec());
        assert_eq!(
            engine.sign("get", URL, "T1", 1, None),
            engine.sign("GET", URL, "T1", 1, None)
        );
    }

    #[test]
    fn each_field_changes_signature() {
        let engine = SignatureEngine::new(b"k".to_vec());
        let base = engine.sign("POST", URL, "T1", 1, Some("d1"));

        assert_ne!(base, engine.sign("PUT", URL, "T1", 1, Some("d1")));
        assert_ne!(base, engine.sign("POST", "https://api.example.com/v1/y", "T1", 1, Some("d1")));
        assert_ne!(base, engine.sign("POST", URL, "T2", 1, Some("d1")));
        assert_ne!(base, engine.sign("POST", URL, "T1", 2, Some("d1")));
        assert_ne!(base, engine.sign("POST", URL, "T1", 1, Some("d2")));
        assert_ne!(base, engine.sign("POST", URL, "T1", 1, None));
    }

    #[test]
    fn different_keys_produce_different_signatures() {
        let a = SignatureEngine::new(b"key-a".to_vec());
        let b = SignatureEngine::new(b"key-b".to_vec());
        assert_ne!(a.sign("GET", URL, "T", 1, None), b.sign("GET", URL, "T", 1, None));
    }

    #[test]
    fn generated_engines_have_distinct_keys() {
        let a = SignatureEngine::generate();
        let b = SignatureEngine::generate();
        assert_ne!(a.sign("GET", URL, "T", 1, None), b.sign("GET", URL, "T", 1, None));
    }

    #[test]
    fn debug_hides_key_material() {
        let engine = SignatureEngine::new(b"super-secret".to_vec());
        let debug_output = format!("{engine:?}");
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("key_len"));
    }
}
