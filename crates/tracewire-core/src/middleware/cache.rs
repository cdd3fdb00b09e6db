//! Allow-listed response cache.
//!
//! Calls whose method is on the allow-list are served from an in-memory map keyed by the
//! canonical form of (method, params). Entries live for the life of the process; there is
//! no TTL and no eviction. Only successful results are stored.

use ahash::AHashSet;
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::{trace::get_active_span, KeyValue};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::debug;

use super::Middleware;
use crate::{
    config::CacheConfig,
    transport::{RpcError, RpcService},
    types::RpcCall,
    utils::{canonical_params, LimitExceeded},
};

/// Deterministic identity of a call for caching purposes.
///
/// Holds the method and the canonical JSON text of the params, so two calls map to the same
/// key exactly when their methods match and their params are equal up to object key order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    method: Arc<str>,
    params: Box<str>,
}

impl CacheKey {
    /// Derives the key for `call`.
    ///
    /// # Errors
    ///
    /// Returns [`LimitExceeded`] if the canonical params are larger than `max_bytes`.
    pub fn derive(call: &RpcCall, max_bytes: usize) -> Result<Self, LimitExceeded> {
        let params = canonical_params(call.params(), max_bytes)?;
        Ok(Self { method: Arc::from(call.method()), params: params.into_boxed_str() })
    }

    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    #[must_use]
    pub fn params(&self) -> &str {
        &self.params
    }
}

/// Point-in-time counters for a [`ResponseCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Allow-listed calls that skipped the cache because their key could not be derived.
    pub bypassed: u64,
    pub entries: usize,
}

/// Process-lifetime store of successful results for allow-listed methods.
pub struct ResponseCache {
    entries: DashMap<CacheKey, Value>,
    allowlist: AHashSet<String>,
    max_key_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
}

impl ResponseCache {
    const DEFAULT_MAX_KEY_BYTES: usize = 64 * 1024;

    /// Creates a cache for the given methods with the default key size limit.
    pub fn new<I, S>(allowlist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_max_key_bytes(allowlist, Self::DEFAULT_MAX_KEY_BYTES)
    }

    pub fn with_max_key_bytes<I, S>(allowlist: I, max_key_bytes: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: DashMap::new(),
            allowlist: allowlist.into_iter().map(Into::into).collect(),
            max_key_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypassed: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_max_key_bytes(config.allowlist.iter().cloned(), config.max_key_bytes)
    }

    #[must_use]
    pub fn is_cacheable(&self, method: &str) -> bool {
        self.allowlist.contains(method)
    }

    /// Derives the key for an allow-listed call, counting a bypass when that fails.
    fn key_for(&self, call: &RpcCall) -> Option<CacheKey> {
        match CacheKey::derive(call, self.max_key_bytes) {
            Ok(key) => Some(key),
            Err(e) => {
                self.bypassed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    method = call.method(),
                    error = %e,
                    "cache key derivation failed, bypassing cache"
                );
                None
            }
        }
    }

    /// Looks up `key`, recording a hit or a miss.
    #[must_use]
    pub fn lookup(&self, key: &CacheKey) -> Option<Value> {
        let found = self.entries.get(key).map(|entry| entry.value().clone());
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn insert(&self, key: CacheKey, value: Value) {
        self.entries.insert(key, value);
    }

    /// Drops every stored entry. Counters are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }
}

/// [`Middleware`] that puts a shared [`ResponseCache`] in front of the next service.
#[derive(Clone)]
pub struct CacheLayer {
    cache: Arc<ResponseCache>,
    annotate_spans: bool,
}

impl CacheLayer {
    #[must_use]
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self { cache, annotate_spans: false }
    }

    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(Arc::new(ResponseCache::from_config(config)))
            .with_span_annotations(config.annotate_spans)
    }

    /// Tags the active span with `rpc.cache = hit | miss` for allow-listed calls.
    #[must_use]
    pub fn with_span_annotations(mut self, enabled: bool) -> Self {
        self.annotate_spans = enabled;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }
}

impl Middleware for CacheLayer {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn wrap(&self, next: Arc<dyn RpcService>) -> Arc<dyn RpcService> {
        Arc::new(CacheService {
            next,
            cache: Arc::clone(&self.cache),
            annotate_spans: self.annotate_spans,
        })
    }
}

/// Service produced by [`CacheLayer::wrap`].
pub struct CacheService {
    next: Arc<dyn RpcService>,
    cache: Arc<ResponseCache>,
    annotate_spans: bool,
}

impl CacheService {
    fn annotate(&self, outcome: &'static str) {
        if self.annotate_spans {
            get_active_span(|span| span.set_attribute(KeyValue::new("rpc.cache", outcome)));
        }
    }
}

#[async_trait]
impl RpcService for CacheService {
    async fn dispatch(&self, call: RpcCall) -> Result<Value, RpcError> {
        if !self.cache.is_cacheable(call.method()) {
            return self.next.dispatch(call).await;
        }

        let Some(key) = self.cache.key_for(&call) else {
            return self.next.dispatch(call).await;
        };

        if let Some(cached) = self.cache.lookup(&key) {
            debug!(method = key.method(), "cache hit");
            self.annotate("hit");
            return Ok(cached);
        }

        debug!(method = key.method(), "cache miss");
        self.annotate("miss");

        // errors propagate before anything is stored
        let result = self.next.dispatch(call).await?;
        self.cache.insert(key, result.clone());
        Ok(result)
    }
}
