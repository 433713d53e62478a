//! Collapses concurrent fetches for the same cache key into one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::error::AttestationError;
use crate::request::CacheKey;
use crate::token::TokenAndPolicy;

/// Outcome of a fetch, delivered to the leader and every follower.
pub type FetchResult = Result<TokenAndPolicy, AttestationError>;

/// One in-flight fetch.
#[derive(Debug, Default)]
struct Flight {
    slot: Mutex<Option<FetchResult>>,
    ready: Condvar,
    /// Followers registered so far; incremented under the pending lock.
    followers: AtomicUsize,
}

impl Flight {
    /// Stores the result once and wakes every waiter. Later calls are ignored.
    fn fulfil(&self, result: FetchResult) -> bool {
        let mut slot = self.slot.lock().expect("lock poisoned");
        if slot.is_some() {
            return false;
        }
        *slot = Some(result);
        self.ready.notify_all();
        true
    }

    fn follower_count(&self) -> usize {
        self.followers.load(Ordering::SeqCst)
    }
}

/// Role handed out by [`RequestCoalescer::acquire`].
#[derive(Debug)]
pub enum Acquired<'a> {
    /// No fetch was in flight; the caller must fetch and complete.
    Leader(Leadership<'a>),
    /// A fetch is in flight; the caller must wait for its result.
    Follower(Waiter),
}

impl Acquired<'_> {
    /// Returns true for the leader role.
    #[must_use]
    pub const fn is_leader(&self) -> bool {
        matches!(self, Self::Leader(_))
    }
}

/// The right, and the obligation, to complete one in-flight fetch.
///
/// Dropping a `Leadership` without calling [`complete`](Self::complete)
/// releases every follower with an `Internal` error, so no follower can be
/// stranded by a leader that unwinds.
#[derive(Debug)]
pub struct Leadership<'a> {
    coalescer: &'a RequestCoalescer,
    key: CacheKey,
    flight: Arc<Flight>,
    completed: bool,
}

impl Leadership<'_> {
    /// Returns the key this leader fetches for.
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Publishes `result` to every follower and clears the in-flight marker.
    ///
    /// Returns the number of followers released.
    pub fn complete(mut self, result: FetchResult) -> usize {
        self.completed = true;
        self.coalescer.finish(&self.key, &self.flight, result)
    }
}

impl Drop for Leadership<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.coalescer.finish(
                &self.key,
                &self.flight,
                Err(AttestationError::internal(format!(
                    "fetch leader for '{}' exited without a result",
                    self.key
                ))),
            );
        }
    }
}

/// A follower waiting for its leader's result.
#[derive(Debug)]
pub struct Waiter {
    key: CacheKey,
    flight: Arc<Flight>,
}

impl Waiter {
    /// Returns the key being waited on.
    #[must_use]
    pub const fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Blocks until the leader completes and returns its result.
    ///
    /// # Panics
    ///
    /// Panics if the flight lock is poisoned.
    #[must_use]
    pub fn wait(self) -> FetchResult {
        let mut slot = self.flight.slot.lock().expect("lock poisoned");
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self.flight.ready.wait(slot).expect("lock poisoned");
        }
    }
}

/// Deduplicates concurrent token fetches per cache key.
///
/// At most one fetch per key is outstanding at any instant. The first
/// caller for a key becomes the leader; later callers become followers and
/// receive a clone of the leader's result, success or error.
///
/// # Examples
///
/// ```
/// use attested_headers::{Acquired, AttestationError, AttestationMode, CacheKey, RequestCoalescer};
///
/// let coalescer = RequestCoalescer::new();
/// let key = CacheKey::derive("GET", "https://api.example.com/a", AttestationMode::Standard);
///
/// let leader = coalescer.acquire(&key);
/// assert!(leader.is_leader());
///
/// let follower = coalescer.acquire(&key);
/// assert!(!follower.is_leader());
///
/// if let Acquired::Leader(leadership) = leader {
///     leadership.complete(Err(AttestationError::attestation("offline")));
/// }
/// if let Acquired::Follower(waiter) = follower {
///     assert!(waiter.wait().is_err());
/// }
/// ```
#[derive(Debug, Default)]
pub struct RequestCoalescer {
    pending: Mutex<HashMap<CacheKey, Arc<Flight>>>,
}

impl RequestCoalescer {
    /// Creates a coalescer with nothing in flight.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the fetch for `key`, or joins the one already in flight.
    ///
    /// # Panics
    ///
    /// Panics if the pending-set lock is poisoned.
    #[must_use]
    pub fn acquire(&self, key: &CacheKey) -> Acquired<'_> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        if let Some(flight) = pending.get(key) {
            flight.followers.fetch_add(1, Ordering::SeqCst);
            return Acquired::Follower(Waiter {
                key: key.clone(),
                flight: Arc::clone(flight),
            });
        }

        let flight = Arc::new(Flight::default());
        pending.insert(key.clone(), Arc::clone(&flight));
        Acquired::Leader(Leadership {
            coalescer: self,
            key: key.clone(),
            flight,
            completed: false,
        })
    }

    /// Completes whatever fetch is in flight for `key` with `result`.
    ///
    /// Returns the number of followers released; zero if nothing was in
    /// flight. A leader that later completes the same fetch is ignored.
    ///
    /// # Panics
    ///
    /// Panics if the pending-set lock is poisoned.
    pub fn complete(&self, key: &CacheKey, result: FetchResult) -> usize {
        let mut pending = self.pending.lock().expect("lock poisoned");
        let Some(flight) = pending.remove(key) else {
            return 0;
        };
        let released = flight.follower_count();
        flight.fulfil(result);
        released
    }

    /// Forgets every in-flight marker.
    ///
    /// Callers arriving afterwards start fresh fetches. Followers that
    /// already joined a detached fetch still receive its result.
    /// Returns the number of markers dropped.
    ///
    /// # Panics
    ///
    /// Panics if the pending-set lock is poisoned.
    pub fn detach_all(&self) -> usize {
        let mut pending = self.pending.lock().expect("lock poisoned");
        let detached = pending.len();
        pending.clear();
        detached
    }

    /// Returns true if a fetch for `key` is in flight.
    ///
    /// # Panics
    ///
    /// Panics if the pending-set lock is poisoned.
    #[must_use]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.pending.lock().expect("lock poisoned").contains_key(key)
    }

    /// Returns the number of fetches in flight.
    ///
    /// # Panics
    ///
    /// Panics if the pending-set lock is poisoned.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.pending.lock().expect("lock poisoned").len()
    }

    /// Removes the marker if it still belongs to `flight`, then publishes.
    fn finish(&self, key: &CacheKey, flight: &Arc<Flight>, result: FetchResult) -> usize {
        let mut pending = self.pending.lock().expect("lock poisoned");
        if pending
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, flight))
        {
            pending.remove(key);
        }
        let released = flight.follower_count();
        flight.fulfil(result);
        released
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::request::AttestationMode;
    use crate::token::{TokenKind, TokenPolicy, TokenRecord};

    fn key() -> CacheKey {
        CacheKey::derive("GET", "https://api.example.com/a", AttestationMode::Standard)
    }

    fn token(value: &str) -> TokenAndPolicy {
        let record =
            TokenRecord::with_ttl(value, Duration::from_secs(3600), TokenKind::Argos).unwrap();
        TokenAndPolicy::new(record, TokenPolicy::default())
    }

    #[test]
    fn first_caller_leads() {
        let coalescer = RequestCoalescer::new();
        let role = coalescer.acquire(&key());
        assert!(role.is_leader());
        assert!(coalescer.is_in_flight(&key()));
    }

    #[test]
    fn complete_clears_marker() {
        let coalescer = RequestCoalescer::new();
        let Acquired::Leader(leader) = coalescer.acquire(&key()) else {
            panic!("expected leader");
        };
        assert_eq!(leader.key(), &key());

        assert_eq!(leader.complete(Ok(token("T1"))), 0);
        assert!(!coalescer.is_in_flight(&key()));
        assert!(coalescer.acquire(&key()).is_leader());
    }

    #[test]
    fn followers_receive_leader_result() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let Acquired::Leader(leader) = coalescer.acquire(&key()) else {
            panic!("expected leader");
        };

        let followers = 4;
        let barrier = Arc::new(Barrier::new(followers + 1));
        let handles: Vec<_> = (0..followers)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let role = coalescer.acquire(&key());
                    barrier.wait();
                    match role {
                        Acquired::Follower(waiter) => waiter.wait(),
                        Acquired::Leader(_) => panic!("only one leader per key"),
                    }
                })
            })
            .collect();

        barrier.wait();
        assert_eq!(leader.complete(Ok(token("T1"))), followers);

        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.unwrap().token_value(), "T1");
        }
    }

    #[test]
    fn errors_fan_out_to_followers() {
        let coalescer = RequestCoalescer::new();
        let leader = coalescer.acquire(&key());
        let Acquired::Follower(waiter) = coalescer.acquire(&key()) else {
            panic!("expected follower");
        };

        let Acquired::Leader(leader) = leader else {
            panic!("expected leader");
        };
        leader.complete(Err(AttestationError::issuance("no tokens")));

        assert_eq!(waiter.wait(), Err(AttestationError::issuance("no tokens")));
    }

    #[test]
    fn dropped_leader_releases_followers() {
        let coalescer = RequestCoalescer::new();
        let leader = coalescer.acquire(&key());
        let Acquired::Follower(waiter) = coalescer.acquire(&key()) else {
            panic!("expected follower");
        };

        drop(leader);

        assert!(matches!(waiter.wait(), Err(AttestationError::Internal { .. })));
        assert!(!coalescer.is_in_flight(&key()));
    }

    #[test]
    fn complete_by_key_releases_followers() {
        let coalescer = RequestCoalescer::new();
        let leader = coalescer.acquire(&key());
        let Acquired::Follower(waiter) = coalescer.acquire(&key()) else {
            panic!("expected follower");
        };

        assert_eq!(coalescer.complete(&key(), Ok(token("T9"))), 1);
        assert_eq!(waiter.wait().unwrap().token_value(), "T9");

        // The leader's own completion arrives late and changes nothing.
        drop(leader);
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[test]
    fn complete_without_flight_is_noop() {
        let coalescer = RequestCoalescer::new();
        assert_eq!(coalescer.complete(&key(), Ok(token("T1"))), 0);
    }

    #[test]
    fn detached_flight_does_not_remove_new_marker() {
        let coalescer = RequestCoalescer::new();
        let Acquired::Leader(old_leader) = coalescer.acquire(&key()) else {
            panic!("expected leader");
        };
        let Acquired::Follower(old_waiter) = coalescer.acquire(&key()) else {
            panic!("expected follower");
        };

        assert_eq!(coalescer.detach_all(), 1);
        let new_role = coalescer.acquire(&key());
        assert!(new_role.is_leader());

        old_leader.complete(Ok(token("OLD")));
        assert_eq!(old_waiter.wait().unwrap().token_value(), "OLD");
        assert!(coalescer.is_in_flight(&key()));

        drop(new_role);
        assert!(!coalescer.is_in_flight(&key()));
    }
}
