//! The response cache.
//!
//! Keys are hex SHA-256 digests of
//! `normalized_prompt | model | temperature | max_tokens`; entries
//! carry the response, its token counts, and its original cost. Each
//! task family has its own TTL, and total stored bytes are bounded by
//! LRU eviction.

use crate::strategy::{CacheFamily, TaskType};
use axon_types::TokenUsage;
use axon_types::artifact::checksum_hex;
use lru::LruCache;
use rust_decimal::Decimal;
use std::time::{Duration, Instant};

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// TTL for classification-family responses.
    pub classification_ttl: Duration,
    /// TTL for synthesis-family responses.
    pub synthesis_ttl: Duration,
    /// TTL for inference-family responses.
    pub inference_ttl: Duration,
    /// Cap on stored response bytes, in MiB.
    pub max_size_mb: usize,
    /// Advisory hit-rate goal, surfaced in stats only.
    pub target_hit_rate: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            classification_ttl: Duration::from_secs(24 * 60 * 60),
            synthesis_ttl: Duration::from_secs(60 * 60),
            inference_ttl: Duration::from_secs(30 * 60),
            max_size_mb: 64,
            target_hit_rate: 0.3,
        }
    }
}

impl CacheConfig {
    fn ttl_for(&self, family: CacheFamily) -> Duration {
        match family {
            CacheFamily::Classification => self.classification_ttl,
            CacheFamily::Synthesis => self.synthesis_ttl,
            CacheFamily::Inference => self.inference_ttl,
        }
    }
}

/// One cached response.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    /// The response text.
    pub text: String,
    /// Token counts of the original call.
    pub tokens: TokenUsage,
    /// What the original call cost.
    pub cost: Decimal,
    /// The task that produced the response.
    pub task_type: TaskType,
    /// When the entry was stored.
    pub created_at: Instant,
    /// Times this entry has been served.
    pub hit_count: u64,
}

impl CachedResponse {
    fn size_estimate(&self) -> usize {
        self.text.len() + 128
    }
}

/// Build the cache key for a request.
pub fn cache_key(prompt: &str, model: &str, temperature: f32, max_tokens: Option<u32>) -> String {
    let normalized: String = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    let material = format!(
        "{normalized}|{model}|{temperature:.3}|{}",
        max_tokens.map(|t| t.to_string()).unwrap_or_default()
    );
    checksum_hex(material.as_bytes())
}

/// LRU response cache with per-family TTLs and a byte budget.
pub struct ResponseCache {
    entries: LruCache<String, CachedResponse>,
    bytes: usize,
    config: CacheConfig,
    hits: u64,
    misses: u64,
}

impl ResponseCache {
    /// An empty cache with the given config.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: LruCache::unbounded(),
            bytes: 0,
            config,
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `key`. Expired entries are evicted and count as misses;
    /// hits bump the entry's `hit_count`.
    pub fn get(&mut self, key: &str) -> Option<CachedResponse> {
        let ttl = match self.entries.peek(key) {
            Some(entry) => self.config.ttl_for(entry.task_type.cache_family()),
            None => {
                self.misses += 1;
                return None;
            }
        };

        let expired = self
            .entries
            .peek(key)
            .is_some_and(|e| e.created_at.elapsed() > ttl);
        if expired {
            if let Some(old) = self.entries.pop(key) {
                self.bytes = self.bytes.saturating_sub(old.size_estimate());
            }
            self.misses += 1;
            return None;
        }

        let entry = self.entries.get_mut(key)?;
        entry.hit_count += 1;
        self.hits += 1;
        Some(entry.clone())
    }

    /// Store a response, evicting least-recently-used entries until the
    /// byte budget holds.
    pub fn insert(&mut self, key: String, response: CachedResponse) {
        let budget = self.config.max_size_mb * 1024 * 1024;
        if let Some(old) = self.entries.pop(&key) {
            self.bytes = self.bytes.saturating_sub(old.size_estimate());
        }
        self.bytes += response.size_estimate();
        self.entries.put(key, response);

        while self.bytes > budget {
            match self.entries.pop_lru() {
                Some((_, evicted)) => {
                    self.bytes = self.bytes.saturating_sub(evicted.size_estimate());
                }
                None => break,
            }
        }
    }

    /// `(hits, misses)` since construction.
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
