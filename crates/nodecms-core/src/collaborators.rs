//! Interfaces of services the core consumes but does not implement.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Answers whether the current request is a preview.
pub trait PreviewResolver: Send + Sync {
    fn is_preview(&self) -> bool;
}

/// Fixed preview answer, for tooling and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPreview(pub bool);

impl PreviewResolver for StaticPreview {
    fn is_preview(&self) -> bool {
        self.0
    }
}

/// Extra parameters passed to a search provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    /// Entity being searched.
    pub entity: String,
    /// Locale to restrict results to, if any.
    pub locale: Option<String>,
}

/// One ranked hit from a search provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
}

/// Full-text search engine, consumed as a black box.
pub trait SearchProvider: Send + Sync {
    /// Return at most `limit` hits, best first.
    fn search(&self, query: &str, params: &SearchParams, limit: usize) -> Result<Vec<SearchHit>>;
}

/// Keyed cache with topic-based invalidation.
pub trait CacheProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    /// Store `value` for `ttl`, tagged with `topics`.
    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, topics: &[&str]);

    /// Drop every entry tagged with `topic`; returns how many were dropped.
    fn invalidate(&self, topic: &str) -> usize;
}
