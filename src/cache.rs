//! Token cache keyed by request fingerprint.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::request::CacheKey;
use crate::token::TokenAndPolicy;

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<CacheKey, TokenAndPolicy>,
    /// Incremented by every `clear`.
    generation: u64,
}

/// In-memory store of token+policy records.
///
/// # Thread Safety
///
/// Every lookup and mutation runs under one mutex owned by the cache
/// instance. Lookups never delete: a record whose expiry has passed is
/// returned as-is and the caller must treat it as a miss. Records leave the
/// cache only through `evict`, `evict_expiring` or `clear`.
///
/// # Examples
///
/// ```
/// use attested_headers::{
///     AttestationMode, CacheKey, TokenAndPolicy, TokenCache, TokenKind, TokenPolicy, TokenRecord,
/// };
/// use std::time::Duration;
///
/// let cache = TokenCache::new();
/// let key = CacheKey::derive("GET", "https://api.example.com/a", AttestationMode::Standard);
/// let record = TokenRecord::with_ttl("T1", Duration::from_secs(3600), TokenKind::Argos).unwrap();
///
/// cache.store(key.clone(), TokenAndPolicy::new(record, TokenPolicy::default()));
///
/// assert_eq!(cache.lookup(&key).unwrap().token_value(), "T1");
/// ```
#[derive(Debug, Default)]
pub struct TokenCache {
    state: Mutex<CacheState>,
}

impl TokenCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record stored under `key`, expired or not.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<TokenAndPolicy> {
        let state = self.state.lock().expect("lock poisoned");
        state.entries.get(key).cloned()
    }

    /// Stores `value` under `key`, replacing any previous record.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    pub fn store(&self, key: CacheKey, value: TokenAndPolicy) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.entries.insert(key, value);
    }

    /// Stores `value` only if no `clear` happened since `generation` was read.
    ///
    /// Returns true if the record was stored.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    pub fn store_if_generation(&self, key: CacheKey, value: TokenAndPolicy, generation: u64) -> bool {
        let mut state = self.state.lock().expect("lock poisoned");
        if state.generation != generation {
            return false;
        }
        state.entries.insert(key, value);
        true
    }

    /// Removes the given keys and returns how many were present.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    pub fn evict<'a>(&self, keys: impl IntoIterator<Item = &'a CacheKey>) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        keys.into_iter()
            .filter(|key| state.entries.remove(*key).is_some())
            .count()
    }

    /// Removes every record with less than `low_water` lifetime left at `now`.
    ///
    /// Records with at least `low_water` remaining are left untouched.
    /// Returns the number of records removed.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    pub fn evict_expiring(&self, now: DateTime<Utc>, low_water: Duration) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        let before = state.entries.len();
        state
            .entries
            .retain(|_, entry| entry.record.remaining_at(now) >= low_water);
        before - state.entries.len()
    }

    /// Removes every record and starts a new generation.
    ///
    /// Returns the number of records removed.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock().expect("lock poisoned");
        let removed = state.entries.len();
        state.entries.clear();
        state.generation += 1;
        removed
    }

    /// Returns the current generation.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.lock().expect("lock poisoned").generation
    }

    /// Returns the number of stored records, including expired ones.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("lock poisoned").entries.len()
    }

    /// Returns true if nothing is stored.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the stored keys in sorted order.
    ///
    /// # Panics
    ///
    /// Panics if the cache lock is poisoned.
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        let state = self.state.lock().expect("lock poisoned");
        let mut keys: Vec<CacheKey> = state.entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}
