//! The header set attached to an outbound request.

use rand::RngCore;
use rand::rngs::OsRng;

use crate::constants::{HEADER_SIGNATURE, HEADER_TOKEN, HEADER_TRACKING_ID, TRACKING_ID_LENGTH};

/// Attestation headers for one outbound request.
///
/// The token may be shared with earlier calls through the cache; the
/// signature and tracking identifier are computed per call.
///
/// # Examples
///
/// ```
/// use attested_headers::AttestationHeaders;
///
/// let headers = AttestationHeaders::new("T1", "c2ln", AttestationHeaders::new_tracking_id());
/// let names: Vec<&str> = headers.iter().map(|(name, _)| name).collect();
///
/// assert_eq!(
///     names,
///     ["x-snapchat-att-token", "x-snapchat-att-sign", "x-request-consistent-tracking-id"]
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationHeaders {
    token: String,
    signature: String,
    tracking_id: String,
}

impl AttestationHeaders {
    /// Assembles a header set.
    #[must_use]
    pub fn new(
        token: impl Into<String>,
        signature: impl Into<String>,
        tracking_id: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            signature: signature.into(),
            tracking_id: tracking_id.into(),
        }
    }

    /// Generates a fresh 128-bit tracking identifier as lowercase hex.
    #[must_use]
    pub fn new_tracking_id() -> String {
        let mut bytes = [0u8; TRACKING_ID_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    /// Returns the `x-snapchat-att-token` value.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns the `x-snapchat-att-sign` value.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Returns the `x-request-consistent-tracking-id` value.
    #[must_use]
    pub fn tracking_id(&self) -> &str {
        &self.tracking_id
    }

    /// Returns the value for a header name, matched case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(header, _)| header.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Iterates `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            (HEADER_TOKEN, self.token.as_str()),
            (HEADER_SIGNATURE, self.signature.as_str()),
            (HEADER_TRACKING_ID, self.tracking_id.as_str()),
        ]
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn tracking_ids_are_hex_and_unique() {
        let ids: HashSet<String> = (0..256).map(|_| AttestationHeaders::new_tracking_id()).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(|id| id.len() == 32));
        assert!(ids
            .iter()
            .all(|id| id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())));
    }

    #[test]
    fn get_is_case_insensitive() {
        let headers = AttestationHeaders::new("T1", "SIG", "abc");
        assert_eq!(headers.get("X-Snapchat-Att-Token"), Some("T1"));
        assert_eq!(headers.get(HEADER_SIGNATURE), Some("SIG"));
        assert_eq!(headers.get(HEADER_TRACKING_ID), Some("abc"));
        assert_eq!(headers.get("authorization"), None);
    }

    #[test]
    fn accessors() {
        let headers = AttestationHeaders::new("T1", "SIG", "abc");
        assert_eq!(headers.token(), "T1");
        assert_eq!(headers.signature(), "SIG");
        assert_eq!(headers.tracking_id(), "abc");
    }
}
