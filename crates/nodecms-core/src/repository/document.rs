use std::ops::Deref;

use super::Repository;
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::Document;
use crate::query::{FilterCriteria, FindQuery, OrderBy, VisibilityContext};
use crate::store::Database;

/// Repository of documents.
#[derive(Debug, Clone)]
pub struct DocumentRepository {
    inner: Repository<Document>,
}

impl DocumentRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self::from_repository(Repository::new(db, config))
    }

    pub fn from_repository(inner: Repository<Document>) -> Self {
        Self { inner }
    }

    /// Documents filed in `folder_id`.
    pub fn find_by_folder(
        &self,
        folder_id: i64,
        visibility: &VisibilityContext,
    ) -> Result<Vec<Document>> {
        let query = FindQuery::new(FilterCriteria::new().folders([folder_id], false))
            .with_order(OrderBy::new().asc("filename"));
        self.find(&query, visibility)
    }

    pub fn find_by_mime_type(
        &self,
        mime_type: &str,
        visibility: &VisibilityContext,
    ) -> Result<Vec<Document>> {
        let query = FindQuery::new(FilterCriteria::new().eq("mimeType", mime_type))
            .with_order(OrderBy::new().asc("filename"));
        self.find(&query, visibility)
    }
}

impl Deref for DocumentRepository {
    type Target = Repository<Document>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
