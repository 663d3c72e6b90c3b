//! Embedding cache for efficient retrieval.
//!
//! Entries are keyed by a SHA-256 digest of the embedded text and evicted in
//! least-recently-used order once the cache reaches capacity. There is no
//! time-based expiry.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};
use crate::provider::EmbeddingProvider;

/// Default number of cached embeddings.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Cache for embeddings to avoid redundant API calls.
///
/// `get` refreshes an entry's recency; `set` on a full cache evicts exactly
/// one entry, the one accessed longest ago.
pub struct EmbeddingCache {
    /// Digest of the text → embedding, in recency order.
    entries: Mutex<LruCache<String, Embedding>>,

    /// Maximum cache size.
    capacity: NonZeroUsize,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingCache {
    /// Create a new in-memory cache. A capacity of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Compute the cache key for a text.
    pub fn hash_key(text: &str) -> String {
        format!("{:x}", Sha256::digest(text.as_bytes()))
    }

    /// Get an embedding from the cache, marking it as recently used.
    pub async fn get(&self, text: &str) -> Option<Embedding> {
        let key = Self::hash_key(text);
        let found = self.entries.lock().await.get(&key).cloned();
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Put an embedding in the cache.
    pub async fn set(&self, text: &str, embedding: Embedding) {
        let key = Self::hash_key(text);
        let mut entries = self.entries.lock().await;
        if let Some((evicted, _)) = entries.push(key.clone(), embedding)
            && evicted != key
        {
            debug!("Evicted least recently used embedding {evicted}");
        }
    }

    /// Check if an embedding is cached without touching its recency.
    pub async fn contains(&self, text: &str) -> bool {
        let key = Self::hash_key(text);
        self.entries.lock().await.contains(&key)
    }

    /// Number of cached embeddings.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether the cache holds no embeddings.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Get cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            max_entries: self.capacity.get(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Statistics about the embedding cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries in cache.
    pub entries: usize,

    /// Maximum cache size.
    pub max_entries: usize,

    /// Lookups answered from the cache.
    pub hits: u64,

    /// Lookups that missed.
    pub misses: u64,
}

/// A wrapper that provides cached embedding generation.
pub struct CachedProvider<P> {
    provider: P,
    cache: EmbeddingCache,
}

impl<P> CachedProvider<P>
where
    P: EmbeddingProvider,
{
    /// Create a new cached provider.
    pub fn new(provider: P, cache: EmbeddingCache) -> Self {
        Self { provider, cache }
    }

    /// Generate an embedding, using cache if available.
    pub async fn embed(&self, text: &str) -> Result<Embedding> {
        if let Some(embedding) = self.cache.get(text).await {
            debug!("Cache hit for embedding");
            return Ok(embedding);
        }

        let embedding = self.provider.embed(text).await?;
        self.cache.set(text, embedding.clone()).await;
        Ok(embedding)
    }

    /// Generate embeddings for `texts`, in order.
    ///
    /// Cached texts skip the provider entirely. The remaining texts are sent
    /// together in a single provider call and written back to the cache.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut resolved: Vec<Option<Embedding>> = Vec::with_capacity(texts.len());
        let mut missing_slots = Vec::new();
        let mut missing_texts = Vec::new();

        for (slot, text) in texts.iter().enumerate() {
            let cached = self.cache.get(text).await;
            if cached.is_none() {
                missing_slots.push(slot);
                missing_texts.push(text.clone());
            }
            resolved.push(cached);
        }

        debug!(
            "Embedding batch of {}: {} cached, {} from {}",
            texts.len(),
            texts.len() - missing_texts.len(),
            missing_texts.len(),
            self.provider.name()
        );

        if !missing_texts.is_empty() {
            let fresh = self.provider.embed_batch(&missing_texts).await?;
            if fresh.len() != missing_texts.len() {
                return Err(EmbeddingError::InvalidResponse(format!(
                    "provider returned {} embeddings for {} texts",
                    fresh.len(),
                    missing_texts.len()
                )));
            }

            for ((slot, text), embedding) in missing_slots.into_iter().zip(&missing_texts).zip(fresh) {
                self.cache.set(text, embedding.clone()).await;
                resolved[slot] = Some(embedding);
            }
        }

        resolved
            .into_iter()
            .map(|embedding| {
                embedding.ok_or_else(|| {
                    EmbeddingError::InvalidResponse("missing embedding in batch".to_string())
                })
            })
            .collect()
    }

    /// Get the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the underlying cache.
    pub fn cache(&self) -> &EmbeddingCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex as StdMutex;

    /// Embeds a text as `[len, 1.0]` and records every batch it receives.
    #[derive(Default)]
    struct RecordingProvider {
        calls: StdMutex<Vec<Vec<String>>>,
    }

    impl RecordingProvider {
        fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        fn model(&self) -> &str {
            "test"
        }

        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.lock().unwrap().push(vec![text.to_string()]);
            Ok(vec![text.len() as f32, 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
            self.calls.lock().unwrap().push(texts.to_vec());
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_cache_set_get() {
        let cache = EmbeddingCache::new(100);
        let embedding = vec![1.0, 2.0, 3.0];

        cache.set("hello", embedding.clone()).await;

        assert_eq!(cache.get("hello").await, Some(embedding));
    }

    #[tokio::test]
    async fn test_cache_miss() {
        let cache = EmbeddingCache::new(100);
        assert!(cache.get("not cached").await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_cache_eviction_removes_least_recently_used() {
        let cache = EmbeddingCache::new(2);

        cache.set("a", vec![1.0]).await;
        cache.set("b", vec![2.0]).await;
        // Touch "a" so "b" becomes the oldest access.
        assert!(cache.get("a").await.is_some());
        cache.set("c", vec![3.0]).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.contains("a").await);
        assert!(!cache.contains("b").await);
        assert!(cache.contains("c").await);
    }

    #[tokio::test]
    async fn test_cache_overwrite_does_not_evict() {
        let cache = EmbeddingCache::new(2);

        cache.set("a", vec![1.0]).await;
        cache.set("b", vec![2.0]).await;
        cache.set("b", vec![4.0]).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get("a").await, Some(vec![1.0]));
        assert_eq!(cache.get("b").await, Some(vec![4.0]));
    }

    #[tokio::test]
    async fn test_zero_capacity_is_clamped() {
        let cache = EmbeddingCache::new(0);
        cache.set("a", vec![1.0]).await;
        cache.set("b", vec![2.0]).await;

        assert_eq!(cache.stats().await.max_entries, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.contains("b").await);
    }

    #[test]
    fn test_hash_key_is_content_derived() {
        assert_eq!(
            EmbeddingCache::hash_key("hello"),
            EmbeddingCache::hash_key("hello")
        );
        assert_ne!(
            EmbeddingCache::hash_key("hello"),
            EmbeddingCache::hash_key("hello ")
        );
        assert_eq!(EmbeddingCache::hash_key("").len(), 64);
    }

    #[tokio::test]
    async fn test_cached_provider_reuses_query_embedding() {
        let cached = CachedProvider::new(RecordingProvider::default(), EmbeddingCache::new(10));

        let first = cached.embed("linen shirt").await.unwrap();
        let second = cached.embed("linen shirt").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.provider().calls().len(), 1);
    }

    #[tokio::test]
    async fn test_cached_provider_batch_only_sends_misses() {
        let cached = CachedProvider::new(RecordingProvider::default(), EmbeddingCache::new(10));
        cached.cache().set("bb", vec![9.0, 9.0]).await;

        let texts = vec!["a".to_string(), "bb".to_string(), "ccc".to_string()];
        let embeddings = cached.embed_batch(&texts).await.unwrap();

        assert_eq!(
            embeddings,
            vec![vec![1.0, 1.0], vec![9.0, 9.0], vec![3.0, 1.0]]
        );
        assert_eq!(
            cached.provider().calls(),
            vec![vec!["a".to_string(), "ccc".to_string()]]
        );
        assert!(cached.cache().contains("ccc").await);
    }

    #[tokio::test]
    async fn test_cached_provider_fully_cached_batch_skips_provider() {
        let cached = CachedProvider::new(RecordingProvider::default(), EmbeddingCache::new(10));
        let texts = vec!["x".to_string(), "yy".to_string()];

        cached.embed_batch(&texts).await.unwrap();
        cached.embed_batch(&texts).await.unwrap();

        assert_eq!(cached.provider().calls().len(), 1);
    }
}
