//! Sharded, capacity- and TTL-bounded store for enrichment results.
//!
//! - Reads and writes on different shards never contend.
//! - Same-key writes are last-write-wins.
//! - When a write of a new key would exceed capacity, the oldest entry
//!   (by insertion order) is evicted first. Overwrites never evict.
//! - Writes are admitted one at a time, so concurrent writers of distinct
//!   keys cannot push the store past capacity.
//! - Expiry is enforced by [`ContentCache::sweep`], not on read, so an entry
//!   may outlive its TTL by up to one sweep interval.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use questguide_shared::{CacheConfig, EnrichmentResult, Objective, QuestGuideError, Result};

use crate::clock::{Clock, SystemClock};
use crate::fingerprint::Fingerprint;

const SHARD_COUNT: usize = 16;

// ---------------------------------------------------------------------------
// Entries and stats
// ---------------------------------------------------------------------------

/// A cached enrichment. Read-only once written; its key is the shard map key.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    value: Arc<EnrichmentResult>,
    created_at: DateTime<Utc>,
    ttl: Duration,
    /// Global insertion sequence, used for evict-oldest.
    seq: u64,
}

impl CacheEntry {
    /// An entry is expired once its age reaches its TTL.
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(self.created_at).to_std() {
            Ok(age) => age >= self.ttl,
            // Clock went backwards; treat as fresh.
            Err(_) => false,
        }
    }
}

/// Counters for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub capacity: usize,
}

type Shard = RwLock<HashMap<Fingerprint, CacheEntry>>;

fn poisoned<T>(_: PoisonError<T>) -> QuestGuideError {
    QuestGuideError::Cache("cache lock poisoned".into())
}

// ---------------------------------------------------------------------------
// ContentCache
// ---------------------------------------------------------------------------

/// Process-lifetime enrichment cache, keyed by [`Fingerprint`].
///
/// Every public operation is infallible from the caller's point of view:
/// internal errors are logged and reported as a miss, `false`, or `0`.
pub struct ContentCache {
    shards: Vec<Shard>,
    capacity: usize,
    default_ttl: Duration,
    clock: Arc<dyn Clock>,
    /// Serializes writers across the capacity check, eviction and insert.
    admission: Mutex<()>,
    len: AtomicUsize,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ContentCache {
    /// Create a cache backed by the wall clock.
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit time source.
    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| RwLock::default()).collect(),
            capacity: config.capacity,
            default_ttl: config.default_ttl,
            clock,
            admission: Mutex::new(()),
            len: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn shard(&self, key: &Fingerprint) -> &Shard {
        &self.shards[key.shard(SHARD_COUNT)]
    }

    /// Look up the cached result for a quest's current content.
    pub fn get(&self, quest_id: &str, objectives: &[Objective]) -> Option<Arc<EnrichmentResult>> {
        match self.try_get(quest_id, objectives) {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(quest_id, error = %e, "cache read failed, treating as miss");
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn try_get(
        &self,
        quest_id: &str,
        objectives: &[Objective],
    ) -> Result<Option<Arc<EnrichmentResult>>> {
        let key = Fingerprint::of(quest_id, objectives)?;
        let shard = self.shard(&key).read().map_err(poisoned)?;
        Ok(shard.get(&key).map(|entry| Arc::clone(&entry.value)))
    }

    /// Store a result with the default TTL. Returns `false` if it was not cached.
    pub fn set(
        &self,
        quest_id: &str,
        objectives: &[Objective],
        result: impl Into<Arc<EnrichmentResult>>,
    ) -> bool {
        self.set_with_ttl(quest_id, objectives, result, self.default_ttl)
    }

    /// Store a result with an explicit TTL. Returns `false` if it was not cached.
    pub fn set_with_ttl(
        &self,
        quest_id: &str,
        objectives: &[Objective],
        result: impl Into<Arc<EnrichmentResult>>,
        ttl: Duration,
    ) -> bool {
        match self.try_set(quest_id, objectives, result.into(), ttl) {
            Ok(()) => true,
            Err(e) => {
                warn!(quest_id, error = %e, "cache write failed");
                false
            }
        }
    }

    fn try_set(
        &self,
        quest_id: &str,
        objectives: &[Objective],
        value: Arc<EnrichmentResult>,
        ttl: Duration,
    ) -> Result<()> {
        if self.capacity == 0 {
            return Err(QuestGuideError::Cache("cache capacity is zero".into()));
        }

        let key = Fingerprint::of(quest_id, objectives)?;
        let _admitted = self.admission.lock().map_err(poisoned)?;
        let exists = self.shard(&key).read().map_err(poisoned)?.contains_key(&key);

        if !exists {
            while self.len.load(Ordering::Acquire) >= self.capacity {
                if !self.evict_oldest()? {
                    break;
                }
            }
        }

        let entry = CacheEntry {
            value,
            created_at: self.clock.now(),
            ttl,
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
        };

        let mut shard = self.shard(&key).write().map_err(poisoned)?;
        if shard.insert(key.clone(), entry).is_none() {
            self.len.fetch_add(1, Ordering::AcqRel);
        }
        debug!(%key, quest_id, ttl_secs = ttl.as_secs(), "cache entry written");
        Ok(())
    }

    /// Remove the entry with the lowest insertion sequence.
    /// Returns `false` when the store is empty.
    fn evict_oldest(&self) -> Result<bool> {
        let mut oldest: Option<(usize, Fingerprint, u64)> = None;

        for (idx, shard) in self.shards.iter().enumerate() {
            let shard = shard.read().map_err(poisoned)?;
            for (key, entry) in shard.iter() {
                if oldest.as_ref().is_none_or(|(_, _, seq)| entry.seq < *seq) {
                    oldest = Some((idx, key.clone(), entry.seq));
                }
            }
        }

        let Some((idx, key, seq)) = oldest else {
            return Ok(false);
        };

        let mut shard = self.shards[idx].write().map_err(poisoned)?;
        // Another writer may have replaced it since the scan; only evict the one we saw.
        if shard.get(&key).is_some_and(|entry| entry.seq == seq) {
            shard.remove(&key);
            self.len.fetch_sub(1, Ordering::AcqRel);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            info!(%key, "evicted oldest cache entry");
        }
        Ok(true)
    }

    /// Drop the entry for this quest content. Returns the number removed (0 or 1).
    pub fn invalidate(&self, quest_id: &str, objectives: &[Objective]) -> usize {
        let removed = Fingerprint::of(quest_id, objectives).and_then(|key| {
            let mut shard = self.shard(&key).write().map_err(poisoned)?;
            Ok(shard.remove(&key).is_some())
        });

        match removed {
            Ok(true) => {
                self.len.fetch_sub(1, Ordering::AcqRel);
                debug!(quest_id, "cache entry invalidated");
                1
            }
            Ok(false) => 0,
            Err(e) => {
                warn!(quest_id, error = %e, "cache invalidation failed");
                0
            }
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;

        for shard in &self.shards {
            let mut shard = match shard.write() {
                Ok(shard) => shard,
                Err(e) => {
                    warn!(error = %poisoned(e), "skipping shard during sweep");
                    continue;
                }
            };
            let before = shard.len();
            shard.retain(|_, entry| !entry.is_expired(now));
            removed += before - shard.len();
        }

        if removed > 0 {
            self.len.fetch_sub(removed, Ordering::AcqRel);
            info!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Remove everything.
    pub fn clear(&self) {
        for shard in &self.shards {
            if let Ok(mut shard) = shard.write() {
                let n = shard.len();
                shard.clear();
                self.len.fetch_sub(n, Ordering::AcqRel);
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.len.load(Ordering::Acquire),
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            eviction_count: self.evictions.load(Ordering::Relaxed),
            capacity: self.capacity,
        }
    }

    /// Start a background task that calls [`sweep`](Self::sweep) every `interval`.
    ///
    /// The task holds only a weak reference and exits once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        let period = interval.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sweep();
            }
            debug!("content cache dropped, sweeper exiting");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use questguide_shared::{Guide, ImageKind, ImageRef, ImageSet, ImageSource};

    fn objective(description: &str) -> Objective {
        Objective {
            id: String::new(),
            kind: "visit".into(),
            description: description.into(),
            optional: false,
            marker_item: None,
            items: vec![],
            count: None,
            found_in_raid: false,
        }
    }

    fn result(overview: &str) -> EnrichmentResult {
        let mut images = ImageSet::default();
        images.objective_images.insert(
            0,
            vec![ImageRef {
                url: "https://assets.example/marker.webp".into(),
                description: "MS2000 Marker".into(),
                source: ImageSource::ApiStructured,
                kind: ImageKind::Icon,
            }],
        );
        images.total_images = 1;
        EnrichmentResult {
            guide: Guide {
                overview: overview.into(),
                tips: "Bring a marker".into(),
                objectives: vec!["Head to the checkpoint".into()],
                image_hints: vec![0],
                raw: format!("## Overview\n{overview}"),
            },
            images,
        }
    }

    fn config(capacity: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            default_ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }

    fn cache_with_clock(capacity: usize) -> (ContentCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = ContentCache::with_clock(&config(capacity), clock.clone());
        (cache, clock)
    }

    #[test]
    fn set_then_get_roundtrips() {
        let cache = ContentCache::new(&config(10));
        let objs = vec![objective("Locate the relay station")];
        let value = result("Relay run");

        assert!(cache.set("q1", &objs, value.clone()));
        let cached = cache.get("q1", &objs).expect("cached");
        assert_eq!(*cached, value);
    }

    #[test]
    fn miss_and_hit_are_counted() {
        let cache = ContentCache::new(&config(10));
        let objs = vec![objective("Locate the relay station")];

        assert!(cache.get("q1", &objs).is_none());
        cache.set("q1", &objs, result("x"));
        assert!(cache.get("q1", &objs).is_some());
        assert!(cache.get("q1", &objs).is_some());

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert_eq!(stats.hit_count, 2);
        assert_eq!(stats.miss_count, 1);
    }

    #[test]
    fn edited_objectives_miss() {
        let cache = ContentCache::new(&config(10));
        cache.set("q1", &[objective("Mark the tank")], result("x"));
        assert!(cache.get("q1", &[objective("Mark both tanks")]).is_none());
    }

    #[test]
    fn ttl_expiry_on_sweep() {
        let (cache, clock) = cache_with_clock(10);
        let objs = vec![objective("Survive and extract")];

        cache.set_with_ttl("q1", &objs, result("x"), Duration::from_secs(1));
        assert_eq!(cache.sweep(), 0);

        clock.advance(Duration::from_secs(2));
        // Expiry is not checked on read; only the sweep removes it.
        assert!(cache.get("q1", &objs).is_some());
        assert_eq!(cache.sweep(), 1);
        assert!(cache.get("q1", &objs).is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[test]
    fn sweep_keeps_fresh_entries() {
        let (cache, clock) = cache_with_clock(10);
        cache.set_with_ttl("short", &[], result("a"), Duration::from_secs(1));
        cache.set_with_ttl("long", &[], result("b"), Duration::from_secs(100));

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.sweep(), 1);
        assert!(cache.get("long", &[]).is_some());
    }

    #[test]
    fn full_cache_evicts_oldest() {
        let (cache, _clock) = cache_with_clock(2);
        cache.set("q1", &[], result("one"));
        cache.set("q2", &[], result("two"));
        assert!(cache.set("q3", &[], result("three")));

        assert!(cache.get("q1", &[]).is_none());
        assert!(cache.get("q2", &[]).is_some());
        assert!(cache.get("q3", &[]).is_some());

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.eviction_count, 1);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let (cache, _clock) = cache_with_clock(2);
        cache.set("q1", &[], result("one"));
        cache.set("q2", &[], result("two"));
        cache.set("q1", &[], result("one, again"));

        assert_eq!(cache.stats().eviction_count, 0);
        assert_eq!(cache.get("q1", &[]).unwrap().guide.overview, "one, again");
        assert!(cache.get("q2", &[]).is_some());
    }

    #[test]
    fn overwrite_refreshes_eviction_order() {
        let (cache, _clock) = cache_with_clock(2);
        cache.set("q1", &[], result("one"));
        cache.set("q2", &[], result("two"));
        cache.set("q1", &[], result("one, again"));
        cache.set("q3", &[], result("three"));

        // q2 is now the oldest write.
        assert!(cache.get("q2", &[]).is_none());
        assert!(cache.get("q1", &[]).is_some());
    }

    #[test]
    fn zero_capacity_rejects_writes() {
        let cache = ContentCache::new(&config(0));
        assert!(!cache.set("q1", &[], result("x")));
        assert!(cache.get("q1", &[]).is_none());
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache = ContentCache::new(&config(10));
        let objs = vec![objective("Find the bunker")];
        cache.set("q1", &objs, result("x"));

        assert_eq!(cache.invalidate("q1", &objs), 1);
        assert_eq!(cache.invalidate("q1", &objs), 0);
        assert!(cache.get("q1", &objs).is_none());
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[test]
    fn clear_empties_store() {
        let cache = ContentCache::new(&config(10));
        cache.set("q1", &[], result("x"));
        cache.set("q2", &[], result("y"));
        cache.clear();
        assert_eq!(cache.stats().entry_count, 0);
    }

    #[tokio::test]
    async fn concurrent_same_key_writes_last_wins() {
        let cache = Arc::new(ContentCache::new(&config(10)));
        let mut handles = Vec::new();
        for i in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set("q1", &[], result(&format!("writer {i}")))
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let stats = cache.stats();
        assert_eq!(stats.entry_count, 1);
        assert!(cache.get("q1", &[]).unwrap().guide.overview.starts_with("writer "));
    }

    fn stored_entries(cache: &ContentCache) -> usize {
        cache.shards.iter().map(|s| s.read().unwrap().len()).sum()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_distinct_writes_respect_capacity() {
        let cache = Arc::new(ContentCache::new(&config(2)));
        let mut handles = Vec::new();
        for i in 0..64 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                cache.set(&format!("q{i}"), &[], result(&format!("writer {i}")))
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }

        let stats = cache.stats();
        assert_eq!(stored_entries(&cache), 2);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.eviction_count, 62);
    }

    #[test]
    fn threaded_writers_never_exceed_capacity() {
        let cache = Arc::new(ContentCache::new(&config(3)));
        let writers: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        cache.set(&format!("t{t}-q{i}"), &[], result("x"));
                        assert!(stored_entries(&cache) <= 3);
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        assert_eq!(stored_entries(&cache), 3);
        assert_eq!(cache.stats().entry_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_expires_entries() {
        let clock = Arc::new(ManualClock::default());
        let cache = Arc::new(ContentCache::with_clock(&config(10), clock.clone()));
        cache.set_with_ttl("q1", &[], result("x"), Duration::from_secs(1));

        let sweeper = cache.spawn_sweeper(Duration::from_secs(60));
        clock.advance(Duration::from_secs(2));

        tokio::time::sleep(Duration::from_secs(61)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        assert_eq!(cache.stats().entry_count, 0);
        sweeper.abort();
    }
}
