//! Repository configuration.

use std::time::Duration;

use tracing::warn;

/// Default number of rows fetched per streaming batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default number of batches between identity map detaches.
pub const DEFAULT_DETACH_EVERY: usize = 10;

/// Default upper bound on a bounded page.
pub const DEFAULT_MAX_PAGE_SIZE: usize = 1000;

/// Default result cache TTL in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default result cache capacity (entries).
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default number of pooled connections.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Repository configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryConfig {
    /// Rows per streaming batch.
    pub batch_size: usize,

    /// Detach streamed entities from the identity map every N batches.
    pub detach_every: usize,

    /// Largest limit honoured for bounded queries; larger limits are clamped.
    pub max_page_size: usize,

    /// Whether the result cache is consulted at all.
    pub cache_enabled: bool,

    /// TTL used when a query opts into caching without its own TTL.
    pub cache_ttl: Duration,

    /// Maximum number of cached results.
    pub cache_capacity: usize,

    /// Idle connections kept by the pool.
    pub pool_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            detach_every: DEFAULT_DETACH_EVERY,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            cache_enabled: true,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the streaming batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the identity map detach interval.
    pub fn with_detach_every(mut self, batches: usize) -> Self {
        self.detach_every = batches.max(1);
        self
    }

    /// Set the maximum page size.
    pub fn with_max_page_size(mut self, max: usize) -> Self {
        self.max_page_size = max.max(1);
        self
    }

    /// Enable or disable the result cache.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the default cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity.max(1);
        self
    }

    /// Set the connection pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Clamp a caller-supplied limit to the maximum page size.
    pub fn clamp_limit(&self, limit: usize) -> usize {
        if limit > self.max_page_size {
            warn!(
                requested = limit,
                max = self.max_page_size,
                "limit exceeds maximum page size, clamping"
            );
            return self.max_page_size;
        }
        limit
    }
}
