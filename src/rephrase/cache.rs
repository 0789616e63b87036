/// Time-bounded memoization of rephrased sentences
/// Keyed by (sentence, variant). Computation runs outside the lock; the first
/// fresh value stored wins and concurrent fillers adopt it.
use crate::config::types::Result;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

pub type CacheKey = (String, u8);

#[derive(Clone, Debug)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct RephraseCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl RephraseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for the key if it has not expired
    pub fn get(&self, sentence: &str, variant: u8) -> Option<String> {
        self.get_at(sentence, variant, Instant::now())
    }

    /// Return the cached value or compute, store and return a new one
    pub fn get_or_compute<F>(&self, sentence: &str, variant: u8, compute: F) -> String
    where
        F: FnOnce(&str, u8) -> String,
    {
        self.get_or_compute_at(sentence, variant, Instant::now(), compute)
    }

    /// Like `get_or_compute`, but a failed computation yields the original
    /// sentence and leaves the cache untouched
    pub fn try_get_or_compute<F>(&self, sentence: &str, variant: u8, compute: F) -> String
    where
        F: FnOnce(&str, u8) -> Result<String>,
    {
        let now = Instant::now();
        if let Some(value) = self.get_at(sentence, variant, now) {
            return value;
        }

        match compute(sentence, variant) {
            Ok(value) => self.insert_if_absent(sentence, variant, value, now),
            Err(e) => {
                log::warn!("Rephrase failed, serving original sentence: {}", e);
                sentence.to_string()
            }
        }
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn get_or_compute_at<F>(&self, sentence: &str, variant: u8, now: Instant, compute: F) -> String
    where
        F: FnOnce(&str, u8) -> String,
    {
        if let Some(value) = self.get_at(sentence, variant, now) {
            return value;
        }
        let value = compute(sentence, variant);
        self.insert_if_absent(sentence, variant, value, now)
    }

    fn get_at(&self, sentence: &str, variant: u8, now: Instant) -> Option<String> {
        self.read()
            .get(&(sentence.to_string(), variant))
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` unless a fresh entry already exists; return the stored one
    fn insert_if_absent(&self, sentence: &str, variant: u8, value: String, now: Instant) -> String {
        let mut entries = self.write();
        let key = (sentence.to_string(), variant);

        if let Some(existing) = entries.get(&key).filter(|e| e.is_fresh(now)) {
            return existing.value.clone();
        }

        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        value
    }

    // A panic while holding the lock cannot leave a half-written entry
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}
