//! An in-memory caching layer

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use wxopen_clock::{Clock, DurationSecs, System, UnixTime};

use super::{CacheError, KeyValueCache};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<UnixTime>,
}

impl Entry {
    fn is_live_at(&self, time: UnixTime) -> bool {
        self.expires_at.map_or(true, |expiry| time < expiry)
    }
}

/// A process-local cache with clock-driven expiry
///
/// Expired entries are dropped lazily when they are next read.
#[derive(Debug, Default)]
pub struct InMemoryCache<C = System> {
    entries: Mutex<HashMap<String, Entry>>,
    clock: C,
}

impl InMemoryCache {
    /// Constructs a new, empty cache using the system clock
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Clock> InMemoryCache<C> {
    /// Constructs a new, empty cache driven by the provided clock
    pub fn with_clock(clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Gets the remaining time to live of `key`
    ///
    /// Returns `None` if the key is absent, expired, or was stored without an
    /// expiry.
    pub fn ttl(&self, key: &str) -> Option<DurationSecs> {
        let now = self.clock.now();
        let entries = self.entries.lock();
        let entry = entries.get(key).filter(|e| e.is_live_at(now))?;
        entry.expires_at.map(|expiry| expiry - now)
    }

    /// Gets the number of live entries
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries
            .lock()
            .values()
            .filter(|e| e.is_live_at(now))
            .count()
    }

    /// Whether the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: &str, value: Vec<u8>, expires_at: Option<UnixTime>) {
        self.entries
            .lock()
            .insert(key.to_owned(), Entry { value, expires_at });
    }

    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.is_live_at(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl<C: Clock + Send + Sync> KeyValueCache for InMemoryCache<C> {
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.insert(key, value, None);
        Ok(())
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: DurationSecs,
    ) -> Result<(), CacheError> {
        let expires_at = self.clock.now() + ttl;
        self.insert(key, value, Some(expires_at));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.live_value(key))
    }

    async fn exists(&self, key: &str) -> bool {
        self.live_value(key).is_some()
    }
}
