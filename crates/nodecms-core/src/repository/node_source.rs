use std::ops::Deref;

use super::Repository;
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::{LocalizedContent, Translation};
use crate::query::{FilterCriteria, FindQuery, OrderBy, VisibilityContext};
use crate::store::Database;

/// Repository of localized node content. Visibility follows the owning
/// node's status.
#[derive(Debug, Clone)]
pub struct NodeSourceRepository {
    inner: Repository<LocalizedContent>,
}

impl NodeSourceRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self::from_repository(Repository::new(db, config))
    }

    pub fn from_repository(inner: Repository<LocalizedContent>) -> Self {
        Self { inner }
    }

    pub fn find_by_title(
        &self,
        title: &str,
        translation: Option<&Translation>,
        visibility: &VisibilityContext,
    ) -> Result<Vec<LocalizedContent>> {
        let mut query = FindQuery::new(FilterCriteria::new().eq("title", title));
        if let Some(translation) = translation {
            query = query.with_translation(translation);
        }
        self.find(&query, visibility)
    }

    /// Every translation of one node.
    pub fn find_by_node(
        &self,
        node_id: i64,
        visibility: &VisibilityContext,
    ) -> Result<Vec<LocalizedContent>> {
        let query = FindQuery::new(FilterCriteria::new().eq("node", node_id))
            .with_order(OrderBy::new().asc("translation.locale"));
        self.find(&query, visibility)
    }

    /// Search-by-pattern restricted to one translation.
    pub fn search_localized(
        &self,
        pattern: &str,
        translation: &Translation,
        visibility: &VisibilityContext,
    ) -> Result<Vec<LocalizedContent>> {
        let query = FindQuery::default()
            .with_translation(translation)
            .with_order(OrderBy::new().asc("title"));
        self.search(pattern, &query, visibility)
    }
}

impl Deref for NodeSourceRepository {
    type Target = Repository<LocalizedContent>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
