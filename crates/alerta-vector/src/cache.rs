//! Caching layer for the embedding gateway
//!
//! Wraps any [`EmbeddingClient`] with a moka cache so that texts already
//! embedded during the session (repeated questions, re-uploaded rows) do
//! not hit the external service again.

use alerta_core::{EmbeddingClient, IndexConfig, Result};
use async_trait::async_trait;
use moka::future::Cache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Embedding client decorator backed by a bounded TTL cache
pub struct CachedEmbedding<C> {
    inner: C,
    cache: Cache<u64, Vec<f32>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<C: EmbeddingClient> CachedEmbedding<C> {
    /// Wrap a client using the capacity and TTL from config
    pub fn new(inner: C, config: &IndexConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_max_capacity)
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();

        Self {
            inner,
            cache,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Fraction of lookups served from cache
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[async_trait]
impl<C: EmbeddingClient> EmbeddingClient for CachedEmbedding<C> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = hash_text(text);
        if let Some(vector) = self.cache.get(&key).await {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(vector);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = self.inner.embed(text).await?;
        self.cache.insert(key, vector.clone()).await;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }
}

fn hash_text(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alerta_core::AlertaError;
    use std::sync::atomic::AtomicUsize;

    struct CountingEmbedding {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingClient for CountingEmbedding {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text == "falla" {
                return Err(AlertaError::Gateway("rate limited".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    fn cached() -> CachedEmbedding<CountingEmbedding> {
        CachedEmbedding::new(
            CountingEmbedding {
                calls: AtomicUsize::new(0),
            },
            &IndexConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_repeated_text_served_from_cache() {
        let client = cached();
        let first = client.embed("sismo").await.unwrap();
        let second = client.embed("sismo").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.hits(), 1);
        assert_eq!(client.misses(), 1);
        assert!((client.hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let client = cached();
        assert!(client.embed("falla").await.is_err());
        assert!(client.embed("falla").await.is_err());
        assert_eq!(client.inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.hits(), 0);
    }

    #[test]
    fn test_dimension_delegates() {
        assert_eq!(cached().dimension(), 2);
    }
}
