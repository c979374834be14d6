use std::ops::Deref;

use rusqlite::{params_from_iter, TransactionBehavior};
use tracing::{debug, info};

use super::Repository;
use crate::catalog::{self, RelationShape, NODE};
use crate::config::RepositoryConfig;
use crate::error::Result;
use crate::model::{ContentNode, NodeStatus};
use crate::persistence::PersistenceManager;
use crate::query::{FilterCriteria, FindQuery, OrderBy, VisibilityContext};
use crate::store::Database;

/// Repository of content nodes.
#[derive(Debug, Clone)]
pub struct NodeRepository {
    inner: Repository<ContentNode>,
}

impl NodeRepository {
    pub fn new(db: Database, config: RepositoryConfig) -> Self {
        Self::from_repository(Repository::new(db, config))
    }

    pub fn from_repository(inner: Repository<ContentNode>) -> Self {
        Self { inner }
    }

    /// Direct children of `parent_id`, by position.
    pub fn find_children(
        &self,
        parent_id: i64,
        visibility: &VisibilityContext,
    ) -> Result<Vec<ContentNode>> {
        let query = FindQuery::new(FilterCriteria::new().eq("parent", parent_id))
            .with_order(OrderBy::new().asc("position"));
        self.find(&query, visibility)
    }

    /// Root nodes, by position.
    pub fn find_roots(&self, visibility: &VisibilityContext) -> Result<Vec<ContentNode>> {
        let query = FindQuery::new(FilterCriteria::new().is_null("parent"))
            .with_order(OrderBy::new().asc("position"));
        self.find(&query, visibility)
    }

    pub fn find_by_node_name(
        &self,
        node_name: &str,
        visibility: &VisibilityContext,
    ) -> Result<Option<ContentNode>> {
        let query = FindQuery::new(FilterCriteria::new().eq("nodeName", node_name));
        self.find_one(&query, visibility)
    }

    /// Nodes whose type is named `type_name`.
    pub fn find_by_node_type(
        &self,
        type_name: &str,
        visibility: &VisibilityContext,
    ) -> Result<Vec<ContentNode>> {
        let query = FindQuery::new(FilterCriteria::new().eq("nodeType.name", type_name))
            .with_order(OrderBy::new().asc("position"));
        self.find(&query, visibility)
    }

    /// Validate a workflow move and queue the updated node on `uow`.
    ///
    /// Nothing is written until the unit of work is flushed.
    pub fn transition<P: PersistenceManager>(
        &self,
        node: &ContentNode,
        to: NodeStatus,
        uow: &mut P,
    ) -> Result<ContentNode> {
        let status = node.status.transition(to)?;
        let updated = node.clone().with_status(status);
        uow.persist(&updated);
        debug!(node = node.id, from = %node.status, to = %status, "queued status transition");
        Ok(updated)
    }

    /// Hard-delete every node in the Deleted state together with its
    /// localized content and join records. Returns the number of nodes
    /// removed.
    pub fn purge_deleted(&self) -> Result<usize> {
        let status_column = NODE.field("status").map_or("status", |f| f.column);

        let mut conn = self.database().connection()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM {} WHERE {} = ?1",
                NODE.identity, NODE.table, status_column
            ))?;
            let rows = stmt.query_map([NodeStatus::Deleted], |row| row.get(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };
        if ids.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let mut topics = vec![NODE.name];
        for relation in NODE.relations {
            let (table, column) = match relation.shape {
                RelationShape::ManyToMany {
                    edge_table,
                    local_column,
                    ..
                } => (edge_table, local_column),
                RelationShape::OneToMany { remote_column } if relation.target != NODE.name => {
                    match catalog::lookup(relation.target) {
                        Some(target) => (target.table, remote_column),
                        None => continue,
                    }
                }
                _ => continue,
            };
            let removed = tx.execute(
                &format!("DELETE FROM {table} WHERE {column} IN ({placeholders})"),
                params_from_iter(ids.iter()),
            )?;
            if removed > 0 && !topics.contains(&relation.target) {
                topics.push(relation.target);
            }
        }
        let purged = tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} IN ({placeholders})",
                NODE.table, NODE.identity
            ),
            params_from_iter(ids.iter()),
        )?;
        tx.commit()?;

        self.identity_map().detach::<ContentNode>(&ids);
        if let Some(cache) = self.cache() {
            for topic in &topics {
                cache.invalidate(topic);
            }
        }
        info!(purged, topics = ?topics, "purged deleted nodes");
        Ok(purged)
    }
}

impl Deref for NodeRepository {
    type Target = Repository<ContentNode>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::collaborators::CacheProvider;
    use crate::error::Error;
    use crate::model::{LocalizedContent, NodeType, Tag, Translation};
    use crate::persistence::UnitOfWork;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database, NodeRepository) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("nodes.db"), &RepositoryConfig::default()).unwrap();
        let repo = NodeRepository::new(db.clone(), RepositoryConfig::default());

        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&NodeType::new(1, "Page"));
        uow.persist(&NodeType::new(2, "Article"));
        uow.persist(&ContentNode::new(1, "home").with_status(NodeStatus::Published).with_node_type(1));
        uow.persist(
            &ContentNode::new(2, "about")
                .with_parent(1)
                .with_position(2.0)
                .with_status(NodeStatus::Published)
                .with_node_type(1),
        );
        uow.persist(
            &ContentNode::new(3, "news")
                .with_parent(1)
                .with_position(1.0)
                .with_status(NodeStatus::Published)
                .with_node_type(2),
        );
        uow.persist(&ContentNode::new(4, "wip").with_parent(1).with_position(0.5));
        uow.flush().unwrap();
        (dir, db, repo)
    }

    #[test]
    fn test_find_children_ordered_by_position() {
        let (_dir, _db, repo) = setup();
        let published = repo.find_children(1, &VisibilityContext::published_only()).unwrap();
        let names: Vec<_> = published.iter().map(|n| n.node_name.as_str()).collect();
        assert_eq!(names, vec!["news", "about"]);

        let all = repo.find_children(1, &VisibilityContext::include_unpublished()).unwrap();
        assert_eq!(all.first().map(|n| n.id), Some(4));
    }

    #[test]
    fn test_find_by_node_type_and_name() {
        let (_dir, _db, repo) = setup();
        let vis = VisibilityContext::published_only();
        let articles = repo.find_by_node_type("Article", &vis).unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].id, 3);

        assert_eq!(repo.find_by_node_name("about", &vis).unwrap().map(|n| n.id), Some(2));
        assert!(repo.find_by_node_name("wip", &vis).unwrap().is_none());
        assert_eq!(repo.find_roots(&vis).unwrap().len(), 1);
    }

    #[test]
    fn test_transition_validates_before_queueing() {
        let (_dir, db, repo) = setup();
        let mut uow = UnitOfWork::new(db);
        let draft = ContentNode::new(4, "wip");

        let err = repo.transition(&draft, NodeStatus::Archived, &mut uow).unwrap_err();
        assert!(matches!(err, Error::InvalidStatusTransition { .. }));
        assert_eq!(uow.pending(), 0);

        let published = repo.transition(&draft, NodeStatus::Published, &mut uow).unwrap();
        assert_eq!(published.status, NodeStatus::Published);
        uow.flush().unwrap();

        let vis = VisibilityContext::published_only();
        assert!(repo.find_by_node_name("wip", &vis).unwrap().is_some());
    }

    #[test]
    fn test_purge_deleted_removes_dependents() {
        let (_dir, db, _) = setup();
        let cache = Arc::new(ResultCache::new(16));
        let repo = NodeRepository::from_repository(
            Repository::new(db.clone(), RepositoryConfig::default()).with_cache(cache.clone()),
        );

        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&LocalizedContent::new(1, 4, 1, "Work in progress"));
        uow.persist(&Tag::new(10, "draft-tag"));
        uow.tag_node(4, 10);
        uow.persist(&ContentNode::new(4, "wip").with_status(NodeStatus::Deleted));
        uow.flush().unwrap();

        cache.set("k", serde_json::json!(1), std::time::Duration::from_secs(60), &["node_source"]);

        assert_eq!(repo.purge_deleted().unwrap(), 1);
        let conn = db.connection().unwrap();
        let sources: i64 = conn
            .query_row("SELECT COUNT(*) FROM node_sources", [], |r| r.get(0))
            .unwrap();
        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM nodes_tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!((sources, links), (0, 0));
        assert!(cache.get("k").is_none());

        assert_eq!(repo.purge_deleted().unwrap(), 0);
        let everything = repo
            .find(&FindQuery::default(), &VisibilityContext::include_all())
            .unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[test]
    fn test_purge_keeps_dependents_of_live_nodes() {
        let (_dir, db, repo) = setup();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&LocalizedContent::new(1, 1, 1, "Home"));
        uow.persist(&LocalizedContent::new(2, 4, 1, "Work in progress"));
        uow.persist(&Tag::new(10, "shared"));
        uow.tag_node(1, 10);
        uow.tag_node(4, 10);
        uow.persist(&ContentNode::new(4, "wip").with_status(NodeStatus::Deleted));
        uow.flush().unwrap();

        assert_eq!(repo.purge_deleted().unwrap(), 1);
        let conn = db.connection().unwrap();
        let sources: Vec<i64> = conn
            .prepare("SELECT node_id FROM node_sources")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        let linked: Vec<i64> = conn
            .prepare("SELECT node_id FROM nodes_tags")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(sources, vec![1]);
        assert_eq!(linked, vec![1]);
    }
}
