//! Compute-if-stale cache for one topic.
//!
//! Refreshes are single-flight: the slot lock is held while the refresh runs,
//! so concurrent readers of a stale topic wait for that one refresh and share
//! its outcome instead of calling upstream themselves.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub captured_at: Instant,
}

/// Outcome of a successful cache read.
#[derive(Debug)]
pub enum CacheRead<T, E> {
    /// Served from cache, still inside the freshness window
    Hit(T),
    /// Freshly recomputed
    Refreshed(T),
    /// The refresh failed; the previous value is served unchanged
    Stale { value: T, error: Arc<E> },
}

impl<T, E> CacheRead<T, E> {
    pub fn value(&self) -> &T {
        match self {
            CacheRead::Hit(value) | CacheRead::Refreshed(value) => value,
            CacheRead::Stale { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            CacheRead::Hit(value) | CacheRead::Refreshed(value) => value,
            CacheRead::Stale { value, .. } => value,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CacheRead::Hit(_) => "hit",
            CacheRead::Refreshed(_) => "refreshed",
            CacheRead::Stale { .. } => "stale",
        }
    }
}

struct Slot<T, E> {
    entry: Option<CacheEntry<T>>,
    last_failure: Option<Arc<E>>,
}

pub struct TtlCache<T, E> {
    topic: &'static str,
    ttl: Duration,
    slot: Mutex<Slot<T, E>>,
    /// Completed refresh attempts, bumped while the slot lock is held
    attempts: AtomicU64,
}

impl<T: Clone, E> TtlCache<T, E> {
    pub fn new(topic: &'static str, ttl: Duration) -> Self {
        Self {
            topic,
            ttl,
            slot: Mutex::new(Slot {
                entry: None,
                last_failure: None,
            }),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Return the cached value if it is younger than the TTL, otherwise run
    /// `refresh` and store its result.
    ///
    /// A failed refresh leaves the existing entry untouched. The read then
    /// yields [`CacheRead::Stale`] when there is an entry and fails when there
    /// is none.
    pub async fn get_or_refresh<F, Fut>(&self, refresh: F) -> Result<CacheRead<T, E>, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ticket = self.attempts.load(Ordering::Acquire);
        let mut slot = self.slot.lock().await;

        if let Some(entry) = &slot.entry {
            if entry.captured_at.elapsed() < self.ttl {
                debug!("Cache '{}' hit", self.topic);
                return Ok(CacheRead::Hit(entry.value.clone()));
            }
        }

        // A refresh finished while we were waiting for the lock and left the
        // entry stale, so it failed. Share that outcome.
        if self.attempts.load(Ordering::Acquire) != ticket {
            if let Some(error) = slot.last_failure.clone() {
                return Self::fallback(&slot, error);
            }
        }

        debug!("Cache '{}' refreshing", self.topic);
        let outcome = refresh().await;
        self.attempts.fetch_add(1, Ordering::AcqRel);

        match outcome {
            Ok(value) => {
                slot.entry = Some(CacheEntry {
                    value: value.clone(),
                    captured_at: Instant::now(),
                });
                slot.last_failure = None;
                Ok(CacheRead::Refreshed(value))
            }
            Err(error) => {
                warn!("Cache '{}' refresh failed", self.topic);
                let error = Arc::new(error);
                slot.last_failure = Some(error.clone());
                Self::fallback(&slot, error)
            }
        }
    }

    fn fallback(slot: &Slot<T, E>, error: Arc<E>) -> Result<CacheRead<T, E>, Arc<E>> {
        match &slot.entry {
            Some(entry) => Ok(CacheRead::Stale {
                value: entry.value.clone(),
                error,
            }),
            None => Err(error),
        }
    }
}
