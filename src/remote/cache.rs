//! Time-bounded cache of parsed remote documents.

use chrono::{DateTime, TimeDelta, Utc};
use hashbrown::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::models::Polygon;

/// Default freshness window for fetched documents
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Source of the current time, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parsed polygons of one remote document. Replaced wholesale, never patched.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    pub polygons: Vec<Polygon>,
    pub labels: Vec<Option<String>>,
    pub fetched_at: DateTime<Utc>,
}

/// Cache keyed by the exact URL string the caller supplied
pub trait DocumentCache: Send + Sync {
    /// A fresh entry, or `None` when missing or expired
    fn get(&self, url: &str) -> Option<CachedDocument>;

    fn put(&self, url: &str, document: CachedDocument);

    /// Returns whether an entry was removed
    fn evict(&self, url: &str) -> bool;

    fn clear(&self);
}

/// In-process cache with a fixed time-to-live.
///
/// The lock is held only for the map operation itself. Two callers that miss
/// at the same time both fetch and the last `put` wins; both still get
/// correct data.
pub struct MemoryDocumentCache {
    entries: RwLock<HashMap<String, CachedDocument>>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

static SHARED: OnceLock<Arc<MemoryDocumentCache>> = OnceLock::new();

impl MemoryDocumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            clock,
        }
    }

    /// The process-wide cache. The TTL of the first call wins.
    pub fn shared(ttl: Duration) -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new(ttl))))
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_fresh(&self, document: &CachedDocument) -> bool {
        self.clock.now().signed_duration_since(document.fetched_at) < self.ttl
    }
}

impl Default for MemoryDocumentCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl DocumentCache for MemoryDocumentCache {
    fn get(&self, url: &str) -> Option<CachedDocument> {
        let entry = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .cloned()?;

        if self.is_fresh(&entry) {
            return Some(entry);
        }

        debug!("Cache entry for {} expired", url);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refreshed it in the meantime
        if entries.get(url).is_some_and(|e| e.fetched_at == entry.fetched_at) {
            entries.remove(url);
        }
        None
    }

    fn put(&self, url: &str, document: CachedDocument) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), document);
    }

    fn evict(&self, url: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(url)
            .is_some()
    }

    fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A cache that never stores anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl DocumentCache for NoopCache {
    fn get(&self, _url: &str) -> Option<CachedDocument> {
        None
    }

    fn put(&self, _url: &str, _document: CachedDocument) {}

    fn evict(&self, _url: &str) -> bool {
        false
    }

    fn clear(&self) {}
}

/// Clock that only moves when told to
#[cfg(test)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Utc::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += TimeDelta::from_std(by).unwrap();
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(clock: &dyn Clock) -> CachedDocument {
        let poly = Polygon::from_pairs(&[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0]]).unwrap();
        CachedDocument {
            polygons: vec![poly],
            labels: vec![None],
            fetched_at: clock.now(),
        }
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryDocumentCache::with_clock(Duration::from_secs(3600), clock.clone());

        cache.put("https://example.com/a.kml", document(clock.as_ref()));
        clock.advance(Duration::from_secs(3599));
        assert!(cache.get("https://example.com/a.kml").is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("https://example.com/a.kml").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_are_exact_strings() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryDocumentCache::with_clock(DEFAULT_CACHE_TTL, clock.clone());
        cache.put("https://example.com/a.kml", document(clock.as_ref()));
        assert!(cache.get("https://example.com/a.kml?").is_none());
        assert!(cache.get("https://EXAMPLE.com/a.kml").is_none());
    }

    #[test]
    fn test_evict_and_clear() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryDocumentCache::with_clock(DEFAULT_CACHE_TTL, clock.clone());
        cache.put("a", document(clock.as_ref()));
        cache.put("b", document(clock.as_ref()));

        assert!(cache.evict("a"));
        assert!(!cache.evict("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn test_put_replaces_wholesale() {
        let clock = Arc::new(ManualClock::new());
        let cache = MemoryDocumentCache::with_clock(DEFAULT_CACHE_TTL, clock.clone());
        cache.put("a", document(clock.as_ref()));

        let mut newer = document(clock.as_ref());
        newer.labels = vec![Some("Fresh".into())];
        cache.put("a", newer.clone());
        assert_eq!(cache.get("a"), Some(newer));
    }

    #[test]
    fn test_noop_cache() {
        let cache = NoopCache;
        cache.put("a", document(&SystemClock));
        assert!(cache.get("a").is_none());
    }
}
