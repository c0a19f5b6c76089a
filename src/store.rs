//! Pending-attempt storage
//!
//! The store is an injected object rather than a process-wide singleton so a
//! multi-process deployment can back it with a shared cache. The in-memory
//! implementation is the default.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use log::debug;

use crate::models::PendingAttempt;

/// Storage for outstanding login attempts
///
/// Implementations must make [`AttemptStore::take_once`] a single atomic
/// check-and-remove: two concurrent callers presenting the same token must
/// never both receive the attempt.
pub trait AttemptStore: Send + Sync {
    /// Insert an attempt keyed by its correlation token, replacing any entry
    /// with the same key
    fn put(&self, attempt: PendingAttempt);

    /// Remove and return the attempt for `correlation_token`, if present
    fn take_once(&self, correlation_token: &str) -> Option<PendingAttempt>;
}

/// Concurrent in-memory attempt store
///
/// Entries are not evicted on their own; unconsumed attempts stay until
/// [`InMemoryAttemptStore::purge_expired`] is called or the process exits.
#[derive(Debug, Default)]
pub struct InMemoryAttemptStore {
    attempts: DashMap<String, PendingAttempt>,
}

impl InMemoryAttemptStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of outstanding attempts
    #[must_use]
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Whether an attempt with this token is still outstanding
    #[must_use]
    pub fn contains(&self, correlation_token: &str) -> bool {
        self.attempts.contains_key(correlation_token)
    }

    /// Drop attempts older than `max_age` at `now`, returning how many were removed
    pub fn purge_expired(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        self.attempts.retain(|_, attempt| {
            let expired = attempt.is_expired(max_age, now);
            if expired {
                removed += 1;
            }
            !expired
        });

        if removed > 0 {
            debug!("🧹 Purged {removed} expired login attempts");
        }
        removed
    }
}

impl AttemptStore for InMemoryAttemptStore {
    fn put(&self, attempt: PendingAttempt) {
        self.attempts
            .insert(attempt.correlation_token.clone(), attempt);
    }

    fn take_once(&self, correlation_token: &str) -> Option<PendingAttempt> {
        // Removal under the shard write lock is the single check-and-take
        self.attempts
            .remove(correlation_token)
            .map(|(_, attempt)| attempt)
    }
}
