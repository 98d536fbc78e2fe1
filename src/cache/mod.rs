use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub mod memory;
pub mod redis;
pub mod store;

use self::memory::MemoryTier;
use self::redis::RedisTier;
use self::store::PersistentStore;

/// Where a transcript's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptSource {
    /// A caption track published alongside the video
    #[serde(rename = "transcript")]
    Captions,

    /// Recovered from the audio via the speech-to-text fallback
    #[serde(rename = "stt")]
    SpeechToText,
}

/// A resolved transcript, as served to callers and stored in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Plain transcript text; non-empty for successful resolutions
    pub text: String,

    /// Language code of the winning caption track or transcription
    #[serde(rename = "lang")]
    pub language: Option<String>,

    #[serde(rename = "ext")]
    pub source: TranscriptSource,

    /// Whether this result came out of a cache tier. Set by the manager at
    /// read time and never persisted.
    #[serde(skip)]
    pub cached: bool,
}

/// Cache identity: video id plus the ordered language preference list,
/// serialized as `"<id>|<lang1>,<lang2>,..."`.
///
/// Language order is part of the identity, so `"en,ko"` and `"ko,en"` are
/// distinct keys. The order changes which caption track wins the fallback
/// race, so collapsing them would conflate genuinely different answers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    video_id: String,
    languages: Vec<String>,
}

impl CacheKey {
    pub fn new(video_id: &str, languages: &[String]) -> Self {
        Self {
            video_id: video_id.to_string(),
            languages: languages.to_vec(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.video_id, self.languages.join(","))
    }
}

/// An immutable cached value. A new fetch always creates a new entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: TranscriptResult,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: TranscriptResult) -> Self {
        Self {
            payload,
            stored_at: Utc::now(),
        }
    }

    /// Freshness under the manager's logical TTL. Tiers may hold an entry
    /// longer; past this age the manager treats it as absent.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.stored_at);
        match chrono::Duration::from_std(ttl) {
            Ok(ttl) => age <= ttl,
            // TTL too large for chrono's range; effectively unbounded.
            Err(_) => true,
        }
    }

    fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    fn remaining_ttl(&self, ttl: Duration) -> Option<Duration> {
        ttl.checked_sub(self.age()).filter(|left| !left.is_zero())
    }
}

/// Process-lifetime cache counters, reset only on restart.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_rate: f64,
    pub memory_cache_size: usize,
}

/// Coordinates lookups and writes across the ordered tier chain:
/// memory, then Redis, then the persistent row store.
///
/// Hits are promoted to the faster tiers; writes go to every tier
/// best-effort. A tier that errors is treated as absent, so losing all
/// backing tiers degrades to fetching live on every request.
pub struct CacheManager {
    memory: MemoryTier,
    redis: Option<RedisTier>,
    store: Option<PersistentStore>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheManager {
    /// Memory-only manager; slower tiers can be attached with
    /// [`with_redis`](Self::with_redis) and [`with_store`](Self::with_store).
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            memory: MemoryTier::new(capacity),
            redis: None,
            store: None,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_redis(mut self, redis: Option<RedisTier>) -> Self {
        self.redis = redis;
        self
    }

    pub fn with_store(mut self, store: Option<PersistentStore>) -> Self {
        self.store = store;
        self
    }

    /// Walk the tier chain for `key`, promoting any hit into the faster
    /// tiers. Counts exactly one hit or one miss per call, no matter how
    /// many tiers were probed.
    pub async fn get(&self, key: &CacheKey) -> Option<TranscriptResult> {
        if let Some(entry) = self.memory.get(key, self.ttl) {
            return Some(self.record_hit(entry.payload));
        }

        if let Some(redis) = &self.redis {
            // Redis expires entries natively, so presence implies freshness.
            match redis.get(key).await {
                Ok(Some(entry)) => {
                    self.memory.insert(key.clone(), entry.clone());
                    return Some(self.record_hit(entry.payload));
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(key = %key, %error, "redis tier lookup failed, falling through");
                }
            }
        }

        if let Some(store) = &self.store {
            match store.get(key).await {
                Ok(Some(entry)) if entry.age() < self.ttl => {
                    self.memory.insert(key.clone(), entry.clone());
                    self.promote_to_redis(key, &entry);
                    return Some(self.record_hit(entry.payload));
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(key = %key, %error, "persistent tier lookup failed, falling through");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Write `value` through to every tier. The memory write is synchronous;
    /// the Redis and persistent writes run as fire-and-forget tasks whose
    /// failures are logged and swallowed.
    pub async fn set(&self, key: &CacheKey, value: TranscriptResult) {
        let entry = CacheEntry::new(value);
        self.memory.insert(key.clone(), entry.clone());

        if let Some(redis) = &self.redis {
            let redis = redis.clone();
            let key = key.clone();
            let entry = entry.clone();
            let ttl = self.ttl;
            tokio::spawn(async move {
                if let Err(error) = redis.set(&key, &entry, ttl).await {
                    tracing::warn!(key = %key, %error, "redis tier write failed");
                }
            });
        }

        if let Some(store) = &self.store {
            let store = store.clone();
            let key = key.clone();
            let entry = entry.clone();
            tokio::spawn(async move {
                if let Err(error) = store.upsert(&key, &entry).await {
                    tracing::warn!(key = %key, %error, "persistent tier write failed");
                }
            });
        }
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };

        CacheStats {
            hits,
            misses,
            total,
            hit_rate,
            memory_cache_size: self.memory.len(),
        }
    }

    pub fn redis(&self) -> Option<&RedisTier> {
        self.redis.as_ref()
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    fn record_hit(&self, mut payload: TranscriptResult) -> TranscriptResult {
        self.hits.fetch_add(1, Ordering::Relaxed);
        payload.cached = true;
        payload
    }

    /// Copy a persistent-tier hit into Redis with whatever TTL the entry has
    /// left, so Redis never serves it past its logical expiry.
    fn promote_to_redis(&self, key: &CacheKey, entry: &CacheEntry) {
        let Some(redis) = &self.redis else { return };
        let Some(remaining) = entry.remaining_ttl(self.ttl) else { return };

        let redis = redis.clone();
        let key = key.clone();
        let entry = entry.clone();
        tokio::spawn(async move {
            if let Err(error) = redis.set(&key, &entry, remaining).await {
                tracing::debug!(key = %key, %error, "redis promotion failed");
            }
        });
    }

    /// Direct memory-tier insert, bypassing the write-through path.
    #[cfg(test)]
    fn insert_memory_entry(&self, key: CacheKey, entry: CacheEntry) {
        self.memory.insert(key, entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3600);

    fn manager(capacity: usize) -> CacheManager {
        CacheManager::new(TTL, capacity)
    }

    fn result(text: &str) -> TranscriptResult {
        TranscriptResult {
            text: text.to_string(),
            language: Some("en".to_string()),
            source: TranscriptSource::Captions,
            cached: false,
        }
    }

    fn key(id: &str) -> CacheKey {
        CacheKey::new(id, &["ko".to_string(), "en".to_string()])
    }

    #[test]
    fn cache_key_serializes_id_and_ordered_languages() {
        assert_eq!(key("vid123").to_string(), "vid123|ko,en");
    }

    #[test]
    fn cache_key_is_order_sensitive() {
        let ko_en = CacheKey::new("vid", &["ko".to_string(), "en".to_string()]);
        let en_ko = CacheKey::new("vid", &["en".to_string(), "ko".to_string()]);
        assert_ne!(ko_en, en_ko);
    }

    #[tokio::test]
    async fn cold_cache_misses() {
        let cache = manager(8);
        assert!(cache.get(&key("never-written")).await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total, 1);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = manager(8);
        cache.set(&key("vid"), result("hello world")).await;

        let found = cache.get(&key("vid")).await.expect("entry should be present");
        assert_eq!(found.text, "hello world");
        assert_eq!(found.language.as_deref(), Some("en"));
        assert_eq!(found.source, TranscriptSource::Captions);
        assert!(found.cached, "hits are marked as cached at read time");
    }

    #[tokio::test]
    async fn hit_and_miss_each_count_once() {
        let cache = manager(8);
        cache.set(&key("vid"), result("text")).await;

        cache.get(&key("vid")).await;
        cache.get(&key("vid")).await;
        cache.get(&key("other")).await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total, 3);
        assert!((stats.hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let cache = manager(8);
        let mut entry = CacheEntry::new(result("stale"));
        entry.stored_at = Utc::now() - chrono::Duration::hours(2);
        cache.insert_memory_entry(key("vid"), entry);

        assert!(cache.get(&key("vid")).await.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn capacity_overflow_evicts_least_recently_touched() {
        let cache = manager(2);
        cache.set(&key("a"), result("a")).await;
        cache.set(&key("b"), result("b")).await;
        // Touch "a" so "b" becomes the eviction candidate.
        cache.get(&key("a")).await;
        cache.set(&key("c"), result("c")).await;

        assert_eq!(cache.stats().memory_cache_size, 2);
        assert!(cache.get(&key("a")).await.is_some());
        assert!(cache.get(&key("b")).await.is_none());
        assert!(cache.get(&key("c")).await.is_some());
    }

    #[tokio::test]
    async fn distinct_language_orders_are_distinct_entries() {
        let cache = manager(8);
        let ko_en = CacheKey::new("vid", &["ko".to_string(), "en".to_string()]);
        let en_ko = CacheKey::new("vid", &["en".to_string(), "ko".to_string()]);

        cache.set(&ko_en, result("korean first")).await;
        assert!(cache.get(&en_ko).await.is_none());
    }
}
