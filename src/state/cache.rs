//! TTL store for the slowly-changing attributes of each tracked item.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, SystemTime},
};

use dashmap::DashMap;
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::item::{StaticFields, TrackedItemId};

/// Default lifetime of a cache entry.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cached static attributes for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Item the entry belongs to.
    pub item_id: TrackedItemId,
    /// Cached attributes.
    pub fields: StaticFields,
    /// When the entry was written.
    pub cached_at: SystemTime,
    /// `cached_at + ttl`; the entry is served strictly before this instant.
    pub expires_at: SystemTime,
}

/// Read-only counters exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable.
    pub misses: u64,
    /// Entries currently held, expired or not.
    pub entries: usize,
}

/// Concurrency-safe TTL cache keyed by item id.
#[derive(Debug)]
pub struct StaticFieldCache {
    entries: DashMap<TrackedItemId, CacheEntry>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StaticFieldCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Configured entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up the static fields for `item_id`.
    ///
    /// Expired entries count as a miss but are left in place until [`Self::sweep_expired`] runs.
    pub fn get(&self, item_id: &TrackedItemId, now: SystemTime) -> Option<StaticFields> {
        let fields = self
            .entries
            .get(item_id)
            .filter(|entry| now < entry.expires_at)
            .map(|entry| entry.fields.clone());

        let counter = if fields.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        fields
    }

    /// Store freshly extracted fields, replacing any previous entry.
    pub fn put(&self, item_id: TrackedItemId, fields: StaticFields, now: SystemTime) {
        let entry = CacheEntry {
            item_id: item_id.clone(),
            fields,
            cached_at: now,
            expires_at: now + self.ttl,
        };
        self.entries.insert(item_id, entry);
    }

    /// Drop the entry for an explicitly removed item. Returns whether one existed.
    pub fn invalidate(&self, item_id: &TrackedItemId) -> bool {
        self.entries.remove(item_id).is_some()
    }

    /// Purge every entry whose expiry is at or before `now`, returning how many were removed.
    pub fn sweep_expired(&self, now: SystemTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before.saturating_sub(self.entries.len())
    }

    /// Copy of the entry for `item_id`, without touching the counters.
    pub fn entry(&self, item_id: &TrackedItemId) -> Option<CacheEntry> {
        self.entries.get(item_id).map(|entry| entry.clone())
    }

    /// Snapshot of the hit/miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}
