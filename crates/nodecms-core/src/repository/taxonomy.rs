use std::ops::Deref;

use super::Repository;
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::{Folder, Tag};
use crate::query::{FilterCriteria, FindQuery, OrderBy, VisibilityContext};
use crate::store::Database;

/// Repository of tags.
#[derive(Debug, Clone)]
pub struct TagRepository {
    inner: Repository<Tag>,
}

impl TagRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self::from_repository(Repository::new(db, config))
    }

    pub fn from_repository(inner: Repository<Tag>) -> Self {
        Self { inner }
    }

    pub fn find_by_tag_name(
        &self,
        tag_name: &str,
        visibility: &VisibilityContext,
    ) -> Result<Option<Tag>> {
        let query = FindQuery::new(FilterCriteria::new().eq("tagName", tag_name));
        self.find_one(&query, visibility)
    }

    /// Child tags of `parent_id`, by position.
    pub fn find_children(&self, parent_id: i64, visibility: &VisibilityContext) -> Result<Vec<Tag>> {
        let query = FindQuery::new(FilterCriteria::new().eq("parent", parent_id))
            .with_order(OrderBy::new().asc("position"));
        self.find(&query, visibility)
    }
}

impl Deref for TagRepository {
    type Target = Repository<Tag>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Repository of document folders.
#[derive(Debug, Clone)]
pub struct FolderRepository {
    inner: Repository<Folder>,
}

impl FolderRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self::from_repository(Repository::new(db, config))
    }

    pub fn from_repository(inner: Repository<Folder>) -> Self {
        Self { inner }
    }

    pub fn find_by_folder_name(
        &self,
        folder_name: &str,
        visibility: &VisibilityContext,
    ) -> Result<Option<Folder>> {
        let query = FindQuery::new(FilterCriteria::new().eq("folderName", folder_name));
        self.find_one(&query, visibility)
    }

    pub fn find_children(
        &self,
        parent_id: i64,
        visibility: &VisibilityContext,
    ) -> Result<Vec<Folder>> {
        let query = FindQuery::new(FilterCriteria::new().eq("parent", parent_id))
            .with_order(OrderBy::new().asc("position"));
        self.find(&query, visibility)
    }
}

impl Deref for FolderRepository {
    type Target = Repository<Folder>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentNode, FolderTranslation, NodeStatus, TagTranslation, Translation};
    use crate::persistence::{PersistenceManager, UnitOfWork};
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("taxonomy.db"), &RepositoryConfig::default()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_tag_lookups() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&Tag::new(1, "topics"));
        uow.persist(&Tag::new(2, "sport").with_parent(1));
        uow.persist(&Tag::new(3, "music").with_parent(1));
        uow.persist(&TagTranslation::new(1, 3, 1, "Music & concerts"));
        uow.flush().unwrap();

        let repo = TagRepository::new(db, RepositoryConfig::default());
        let vis = VisibilityContext::published_only();
        assert_eq!(repo.find_by_tag_name("sport", &vis).unwrap().map(|t| t.id), Some(2));
        assert_eq!(repo.find_children(1, &vis).unwrap().len(), 2);
        assert_eq!(
            repo.find_by_identifier("Music & concerts", &vis).unwrap().map(|t| t.id),
            Some(3)
        );
    }

    #[test]
    fn test_tag_criteria_through_nodes_are_gated() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Tag::new(1, "news"));
        uow.persist(&Tag::new(2, "internal"));
        uow.persist(&ContentNode::new(1, "public").with_status(NodeStatus::Published));
        uow.persist(&ContentNode::new(2, "hidden"));
        uow.tag_node(1, 1);
        uow.tag_node(2, 2);
        uow.flush().unwrap();

        let repo = TagRepository::new(db, RepositoryConfig::default());
        let query = FindQuery::new(FilterCriteria::new().not_null("nodes.id"));
        let public = repo.find(&query, &VisibilityContext::published_only()).unwrap();
        assert_eq!(public.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1]);
        let backend = repo.find(&query, &VisibilityContext::include_unpublished()).unwrap();
        assert_eq!(backend.len(), 2);
    }

    #[test]
    fn test_folder_lookups() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&Folder::new(1, "media"));
        uow.persist(&Folder::new(2, "press").with_parent(1));
        uow.persist(&FolderTranslation::new(1, 2, 1, "Press room"));
        uow.flush().unwrap();

        let repo = FolderRepository::new(db, RepositoryConfig::default());
        let vis = VisibilityContext::published_only();
        assert_eq!(repo.find_by_folder_name("media", &vis).unwrap().map(|f| f.id), Some(1));
        assert_eq!(repo.find_children(1, &vis).unwrap().len(), 1);
        assert!(repo.find_children(2, &vis).unwrap().is_empty());
        assert_eq!(
            repo.find_by_identifier("Press room", &vis).unwrap().map(|f| f.id),
            Some(2)
        );
    }
}
