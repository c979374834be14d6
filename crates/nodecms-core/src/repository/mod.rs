//! Content repositories.
//!
//! [`Repository`] is the generic compiler-backed repository; the per-entity
//! repositories wrap one and add their named lookups.

mod document;
mod node;
mod node_source;
mod taxonomy;
mod translation;

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, trace};

use crate::collaborators::{CacheProvider, SearchParams, SearchProvider};
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::Entity;
use crate::persistence::IdentityMap;
use crate::query::executor::{fetch, fetch_count};
use crate::query::{
    CompiledQuery, Cursor, FilterCriteria, FindQuery, HookBus, Paginator, QueryCompiler,
    VisibilityContext,
};
use crate::store::Database;

pub use document::DocumentRepository;
pub use node::NodeRepository;
pub use node_source::NodeSourceRepository;
pub use taxonomy::{FolderRepository, TagRepository};
pub use translation::{LocaleCache, TranslationRepository};

/// Generic repository over one entity.
pub struct Repository<E: Entity> {
    db: Database,
    hooks: Arc<HookBus>,
    cache: Option<Arc<dyn CacheProvider>>,
    identity_map: Arc<IdentityMap>,
    config: RepositoryConfig,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            hooks: Arc::clone(&self.hooks),
            cache: self.cache.clone(),
            identity_map: Arc::clone(&self.identity_map),
            config: self.config.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::descriptor().name)
            .field("hooks", &self.hooks)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self {
            db,
            hooks: Arc::new(HookBus::new()),
            cache: None,
            identity_map: Arc::new(IdentityMap::new()),
            config,
            _entity: PhantomData,
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<HookBus>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_identity_map(mut self, identity_map: Arc<IdentityMap>) -> Self {
        self.identity_map = identity_map;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn identity_map(&self) -> &Arc<IdentityMap> {
        &self.identity_map
    }

    pub(crate) fn cache(&self) -> Option<&Arc<dyn CacheProvider>> {
        self.cache.as_ref()
    }

    /// Compile without executing. Limits above the maximum page size are
    /// clamped.
    pub fn compile(&self, query: &FindQuery, visibility: &VisibilityContext) -> Result<CompiledQuery> {
        match query.limit {
            Some(limit) if self.config.clamp_limit(limit) != limit => {
                let clamped = FindQuery {
                    limit: Some(self.config.max_page_size),
                    ..query.clone()
                };
                QueryCompiler::compile(E::descriptor(), &clamped, visibility, &self.hooks)
            }
            _ => QueryCompiler::compile(E::descriptor(), query, visibility, &self.hooks),
        }
    }

    /// Materialized ordered list.
    pub fn find(&self, query: &FindQuery, visibility: &VisibilityContext) -> Result<Vec<E>> {
        let compiled = self.compile(query, visibility)?;
        let sql = compiled.sql();
        self.cached(query, &compiled, &sql, || {
            let conn = self.db.connection()?;
            fetch::<E>(&conn, &sql, compiled.bindings())
        })
    }

    /// First match, if any.
    pub fn find_one(&self, query: &FindQuery, visibility: &VisibilityContext) -> Result<Option<E>> {
        let single = FindQuery {
            limit: Some(1),
            ..query.clone()
        };
        Ok(self.find(&single, visibility)?.into_iter().next())
    }

    /// Distinct count of matching roots.
    pub fn count(&self, query: &FindQuery, visibility: &VisibilityContext) -> Result<u64> {
        let compiled = self.compile(query, visibility)?;
        let sql = compiled.count_sql();
        self.cached(query, &compiled, &sql, || {
            let conn = self.db.connection()?;
            fetch_count(&conn, &sql, compiled.bindings())
        })
    }

    /// One page plus the total, counted with a separate distinct query.
    pub fn paginate(
        &self,
        query: &FindQuery,
        visibility: &VisibilityContext,
    ) -> Result<Paginator<E>> {
        let limit = self
            .config
            .clamp_limit(query.limit.unwrap_or(self.config.batch_size));
        let offset = query.offset.unwrap_or(0);
        let bounded = FindQuery {
            limit: Some(limit),
            offset: Some(offset),
            ..query.clone()
        };
        let compiled = self.compile(&bounded, visibility)?;

        let conn = self.db.connection()?;
        let items = fetch::<E>(&conn, &compiled.sql(), compiled.bindings())?;
        let total = fetch_count(&conn, &compiled.count_sql(), compiled.bindings())?;
        debug!(
            entity = E::descriptor().name,
            limit,
            offset,
            total,
            "paginated query"
        );
        Ok(Paginator {
            items,
            total,
            limit,
            offset,
        })
    }

    /// Streaming cursor with the configured batch size.
    pub fn stream(&self, query: &FindQuery, visibility: &VisibilityContext) -> Result<Cursor<E>> {
        self.stream_batches(query, visibility, self.config.batch_size)
    }

    /// Streaming cursor with an explicit batch size.
    pub fn stream_batches(
        &self,
        query: &FindQuery,
        visibility: &VisibilityContext,
        batch_size: usize,
    ) -> Result<Cursor<E>> {
        let compiled = QueryCompiler::compile(E::descriptor(), query, visibility, &self.hooks)?;
        let conn = self.db.connection()?;
        Ok(Cursor::new(conn, compiled, batch_size, self.config.detach_every)
            .with_identity_map(Arc::clone(&self.identity_map)))
    }

    /// Search-by-pattern on top of `query`.
    pub fn search(
        &self,
        pattern: &str,
        query: &FindQuery,
        visibility: &VisibilityContext,
    ) -> Result<Vec<E>> {
        self.find(&query.clone().with_search(pattern), visibility)
    }

    /// Count of [`Repository::search`] results.
    pub fn count_search(
        &self,
        pattern: &str,
        query: &FindQuery,
        visibility: &VisibilityContext,
    ) -> Result<u64> {
        self.count(&query.clone().with_search(pattern), visibility)
    }

    /// Lookup by slug column or translated primary name.
    pub fn find_by_identifier(
        &self,
        identifier: &str,
        visibility: &VisibilityContext,
    ) -> Result<Option<E>> {
        let query = FindQuery::default().with_identifier(identifier);
        self.find_one(&query, visibility)
    }

    /// Entities with the given ids, still gated.
    pub fn find_by_ids(&self, ids: &[i64], visibility: &VisibilityContext) -> Result<Vec<E>> {
        let query = FindQuery::new(FilterCriteria::new().any_of("id", ids.iter().copied()));
        self.find(&query, visibility)
    }

    /// Full-text search through `provider`, then the normal pipeline
    /// constrained to the hits. Provider rank order is preserved.
    pub fn find_by_text(
        &self,
        provider: &dyn SearchProvider,
        text: &str,
        query: &FindQuery,
        visibility: &VisibilityContext,
    ) -> Result<Vec<E>> {
        let params = SearchParams {
            entity: E::descriptor().name.to_string(),
            locale: None,
        };
        let limit = self
            .config
            .clamp_limit(query.limit.unwrap_or(self.config.max_page_size));
        let hits = provider.search(text, &params, limit)?;
        if hits.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = hits.iter().map(|h| h.id).collect();
        debug!(entity = params.entity, hits = ids.len(), "constraining search hits");
        let constrained = FindQuery {
            limit: None,
            offset: None,
            ..query.clone()
        }
        .within_ids(ids.iter().copied());
        let mut found = self.find(&constrained, visibility)?;

        let rank: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        found.sort_by_key(|e| rank.get(&e.id()).copied().unwrap_or(usize::MAX));
        Ok(found)
    }

    fn cached<T, F>(
        &self,
        query: &FindQuery,
        compiled: &CompiledQuery,
        statement: &str,
        load: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let cache = match &self.cache {
            Some(cache) if query.cached && self.config.cache_enabled => cache,
            _ => return load(),
        };

        let key = compiled.fingerprint_of(statement);
        if let Some(hit) = cache.get(&key) {
            match serde_json::from_value(hit) {
                Ok(value) => {
                    trace!(entity = E::descriptor().name, key = %key, "result cache hit");
                    return Ok(value);
                }
                Err(err) => debug!(key = %key, error = %err, "discarding undecodable cache entry"),
            }
        }

        let value = load()?;
        let ttl = query.cache_ttl.unwrap_or(self.config.cache_ttl);
        cache.set(&key, serde_json::to_value(&value)?, ttl, &compiled.plan().topics());
        Ok(value)
    }
}
