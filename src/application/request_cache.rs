// Request cache with in-flight de-duplication
use crate::domain::error::DashboardResult;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

type SharedFetch<V> = Shared<BoxFuture<'static, DashboardResult<V>>>;

struct InFlight<V> {
    id: u64,
    fetch: SharedFetch<V>,
}

struct Resolved<V> {
    value: V,
    stored: Instant,
}

struct CacheState<K, V> {
    resolved: HashMap<K, Resolved<V>>,
    in_flight: HashMap<K, InFlight<V>>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq, V: Clone> CacheState<K, V> {
    fn is_fresh(&self, entry: &Resolved<V>) -> bool {
        self.ttl.is_none_or(|ttl| entry.stored.elapsed() < ttl)
    }

    /// Fresh value for `key`; an expired one is dropped.
    fn fresh(&mut self, key: &K) -> Option<V> {
        let entry = self.resolved.get(key)?;
        if self.is_fresh(entry) {
            return Some(entry.value.clone());
        }
        self.resolved.remove(key);
        None
    }

    fn store(&mut self, key: K, value: V) {
        self.resolved.insert(
            key,
            Resolved {
                value,
                stored: Instant::now(),
            },
        );
    }
}

/// Memoizes successful fetches per key and lets concurrent callers for the same
/// key share a single pending fetch.
///
/// Failures are handed to every waiting caller and then forgotten. An entry
/// invalidated while its fetch is pending is not written back when that fetch
/// settles. With a TTL, resolved entries older than it count as missing.
pub struct RequestCache<K, V> {
    name: &'static str,
    state: Arc<Mutex<CacheState<K, V>>>,
    next_id: AtomicU64,
}

fn lock<K, V>(state: &Mutex<CacheState<K, V>>) -> MutexGuard<'_, CacheState<K, V>> {
    // A panic while holding the lock leaves the maps consistent; keep using them.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, V> RequestCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(CacheState {
                resolved: HashMap::new(),
                in_flight: HashMap::new(),
                ttl: None,
            })),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn with_ttl(self, ttl: Duration) -> Self {
        lock(&self.state).ttl = Some(ttl);
        self
    }

    /// Cached value for `key`, or the result of the pending fetch for it, or the
    /// result of a fresh `fetch()`.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> DashboardResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = DashboardResult<V>> + Send + 'static,
    {
        let pending = {
            let mut state = lock(&self.state);
            if let Some(value) = state.fresh(&key) {
                tracing::debug!("{} cache hit for {:?}", self.name, key);
                return Ok(value);
            }
            match state.in_flight.get(&key) {
                Some(in_flight) => {
                    tracing::debug!("{} joining in-flight fetch for {:?}", self.name, key);
                    in_flight.fetch.clone()
                }
                None => {
                    tracing::debug!("{} cache miss for {:?}", self.name, key);
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let pending = settle(Arc::downgrade(&self.state), key.clone(), id, fetch())
                        .boxed()
                        .shared();
                    state.in_flight.insert(
                        key,
                        InFlight {
                            id,
                            fetch: pending.clone(),
                        },
                    );
                    pending
                }
            }
        };
        pending.await
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        lock(&self.state).fresh(key)
    }

    /// First resolved entry for which `f` returns something.
    pub fn find_map<R>(&self, mut f: impl FnMut(&K, &V) -> Option<R>) -> Option<R> {
        let state = lock(&self.state);
        state
            .resolved
            .iter()
            .filter(|(_, entry)| state.is_fresh(entry))
            .find_map(|(k, entry)| f(k, &entry.value))
    }

    pub fn insert(&self, key: K, value: V) {
        lock(&self.state).store(key, value);
    }

    /// Drops resolved and in-flight entries whose key matches. Returns how many
    /// resolved entries were removed.
    pub fn invalidate_where(&self, mut matches: impl FnMut(&K) -> bool) -> usize {
        let mut state = lock(&self.state);
        let before = state.resolved.len();
        state.resolved.retain(|k, _| !matches(k));
        state.in_flight.retain(|k, _| !matches(k));
        let removed = before - state.resolved.len();
        if removed > 0 {
            tracing::debug!("{} invalidated {} entries", self.name, removed);
        }
        removed
    }

    pub fn clear(&self) -> usize {
        self.invalidate_where(|_| true)
    }

    /// Resolved entries that have not expired.
    pub fn len(&self) -> usize {
        let state = lock(&self.state);
        state.resolved.values().filter(|e| state.is_fresh(e)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight.len()
    }
}

/// Awaits the fetch, then clears its marker and stores a success, but only if
/// the marker is still this fetch's (it was not invalidated or replaced).
async fn settle<K, V, Fut>(
    state: Weak<Mutex<CacheState<K, V>>>,
    key: K,
    id: u64,
    fetch: Fut,
) -> DashboardResult<V>
where
    K: Hash + Eq,
    V: Clone,
    Fut: Future<Output = DashboardResult<V>>,
{
    let result = fetch.await;
    if let Some(state) = state.upgrade() {
        let mut state = lock(&state);
        let current = state.in_flight.get(&key).is_some_and(|f| f.id == id);
        if current {
            state.in_flight.remove(&key);
            if let Ok(value) = &result {
                state.store(key, value.clone());
            }
        }
    }
    result
}
