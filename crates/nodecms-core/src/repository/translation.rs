use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use super::Repository;
use crate::catalog::TRANSLATION;
use crate::collaborators::CacheProvider;
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::Translation;
use crate::query::{FilterCriteria, FindQuery, OrderBy, VisibilityContext};
use crate::store::Database;

/// Small cache for translation lookups.
///
/// There are only a handful of translations, so any write to one of them
/// clears everything instead of tracking keys per topic.
#[derive(Debug, Default)]
pub struct LocaleCache {
    entries: RwLock<HashMap<String, (serde_json::Value, Instant)>>,
}

impl LocaleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CacheProvider for LocaleCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Some(value.clone()),
            _ => None,
        }
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration, _topics: &[&str]) {
        self.entries
            .write()
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn invalidate(&self, topic: &str) -> usize {
        if topic != TRANSLATION.name {
            return 0;
        }
        let mut entries = self.entries.write();
        let cleared = entries.len();
        entries.clear();
        debug!(cleared, "locale cache cleared");
        cleared
    }
}

/// Repository of translations.
#[derive(Debug, Clone)]
pub struct TranslationRepository {
    inner: Repository<Translation>,
    locale_cache: Arc<LocaleCache>,
}

impl TranslationRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        let locale_cache = Arc::new(LocaleCache::new());
        let inner = Repository::new(db, config).with_cache(locale_cache.clone());
        Self {
            inner,
            locale_cache,
        }
    }

    /// Cache to subscribe to a unit of work so translation writes clear it.
    pub fn locale_cache(&self) -> Arc<LocaleCache> {
        Arc::clone(&self.locale_cache)
    }

    /// The default translation, served from the locale cache when possible.
    pub fn find_default(&self) -> Result<Option<Translation>> {
        let query = FindQuery::new(FilterCriteria::new().eq("isDefault", true)).with_cache();
        self.find_one(&query, &VisibilityContext::include_all())
    }

    /// Translations offered to visitors, by locale.
    pub fn find_available(&self) -> Result<Vec<Translation>> {
        let query = FindQuery::new(FilterCriteria::new().eq("available", true))
            .with_order(OrderBy::new().asc("locale"))
            .with_cache();
        self.find(&query, &VisibilityContext::include_all())
    }

    pub fn find_by_locale(&self, locale: &str) -> Result<Option<Translation>> {
        let query = FindQuery::new(FilterCriteria::new().eq("locale", locale)).with_cache();
        self.find_one(&query, &VisibilityContext::include_all())
    }
}

impl Deref for TranslationRepository {
    type Target = Repository<Translation>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{PersistenceManager, UnitOfWork};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, TranslationRepository) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("locales.db"), &RepositoryConfig::default()).unwrap();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&Translation::new(2, "fr"));
        uow.persist(&Translation::new(3, "de").with_available(false));
        uow.flush().unwrap();
        let repo = TranslationRepository::new(db.clone(), RepositoryConfig::default());
        (dir, db, repo)
    }

    #[test]
    fn test_lookups() {
        let (_dir, _db, repo) = setup();
        assert_eq!(repo.find_default().unwrap().map(|t| t.locale), Some("en".to_string()));
        let available: Vec<_> = repo.find_available().unwrap().into_iter().map(|t| t.locale).collect();
        assert_eq!(available, vec!["en", "fr"]);
        assert_eq!(repo.find_by_locale("de").unwrap().map(|t| t.id), Some(3));
        assert!(repo.find_by_locale("it").unwrap().is_none());
    }

    #[test]
    fn test_default_is_cached_until_a_translation_changes() {
        let (_dir, db, repo) = setup();
        assert_eq!(repo.find_default().unwrap().map(|t| t.id), Some(1));
        assert!(!repo.locale_cache().is_empty());

        // Written behind the cache's back: the stale answer is still served.
        db.connection()
            .unwrap()
            .execute_batch("UPDATE translations SET is_default = 0; UPDATE translations SET is_default = 1 WHERE id = 2;")
            .unwrap();
        assert_eq!(repo.find_default().unwrap().map(|t| t.id), Some(1));

        let mut uow = UnitOfWork::new(db).with_subscriber(repo.locale_cache());
        uow.persist(&Translation::new(2, "fr").as_default());
        uow.persist(&Translation::new(1, "en"));
        uow.flush().unwrap();

        assert!(repo.locale_cache().is_empty());
        assert_eq!(repo.find_default().unwrap().map(|t| t.id), Some(2));
    }

    #[test]
    fn test_other_topics_leave_locales_alone() {
        let cache = LocaleCache::new();
        cache.set("k", serde_json::json!(["en"]), Duration::from_secs(60), &["translation"]);
        assert_eq!(cache.invalidate("node"), 0);
        assert_eq!(cache.invalidate("translation"), 1);
        assert!(cache.get("k").is_none());
    }
}
