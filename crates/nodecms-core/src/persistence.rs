//! Write side: identity map and unit of work.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, info};

use crate::catalog::{EntityDescriptor, RelationShape, DOCUMENT, NODE};
use crate::collaborators::CacheProvider;
use crate::error::Result;
use crate::model::{Entity, Value};
use crate::store::Database;

/// Per-session cache of hydrated entities keyed by (entity name, id).
#[derive(Default)]
pub struct IdentityMap {
    entries: DashMap<(&'static str, i64), Arc<dyn Any + Send + Sync>>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<E: Entity>(&self, entity: &E) {
        self.entries
            .insert((E::descriptor().name, entity.id()), Arc::new(entity.clone()));
    }

    pub fn get<E: Entity>(&self, id: i64) -> Option<E> {
        self.entries
            .get(&(E::descriptor().name, id))
            .and_then(|entry| entry.value().downcast_ref::<E>().cloned())
    }

    pub fn contains<E: Entity>(&self, id: i64) -> bool {
        self.entries.contains_key(&(E::descriptor().name, id))
    }

    /// Detach the given ids of `E`. Returns how many were present.
    pub fn detach<E: Entity>(&self, ids: &[i64]) -> usize {
        ids.iter()
            .filter(|id| self.detach_key(E::descriptor().name, **id))
            .count()
    }

    fn detach_key(&self, entity: &'static str, id: i64) -> bool {
        self.entries.remove(&(entity, id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl fmt::Debug for IdentityMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMap")
            .field("len", &self.entries.len())
            .finish()
    }
}

/// Queue of writes flushed in one transaction.
pub trait PersistenceManager {
    /// Queue an insert-or-replace of `entity`.
    fn persist<E: Entity>(&mut self, entity: &E);

    /// Queue a hard delete of `entity` and its join records.
    fn remove<E: Entity>(&mut self, entity: &E);

    /// Apply every queued write atomically.
    fn flush(&mut self) -> Result<FlushSummary>;
}

/// Outcome of a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub upserts: usize,
    pub deletes: usize,
    pub links: usize,
    pub unlinks: usize,
    /// Invalidation topics published to subscribers.
    pub topics: Vec<&'static str>,
}

#[derive(Debug, Clone)]
enum Operation {
    Upsert {
        descriptor: &'static EntityDescriptor,
        id: i64,
        values: Vec<(&'static str, Value)>,
    },
    Delete {
        descriptor: &'static EntityDescriptor,
        id: i64,
    },
    Link {
        edge: EdgeRecord,
        attach: bool,
    },
}

/// A row of a join record table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EdgeRecord {
    table: &'static str,
    columns: [(&'static str, i64); 2],
    topics: [&'static str; 2],
}

impl EdgeRecord {
    fn between(
        owner: &'static EntityDescriptor,
        relation: &str,
        owner_id: i64,
        target_id: i64,
    ) -> Option<Self> {
        let relation = owner.relation(relation)?;
        match relation.shape {
            RelationShape::ManyToMany {
                edge_table,
                local_column,
                remote_column,
            } => Some(Self {
                table: edge_table,
                columns: [(local_column, owner_id), (remote_column, target_id)],
                topics: [owner.name, relation.target],
            }),
            _ => None,
        }
    }
}

/// Default [`PersistenceManager`] over a [`Database`].
pub struct UnitOfWork {
    db: Database,
    pending: Vec<Operation>,
    subscribers: Vec<Arc<dyn CacheProvider>>,
    identity_map: Option<Arc<IdentityMap>>,
}

impl UnitOfWork {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            pending: Vec::new(),
            subscribers: Vec::new(),
            identity_map: None,
        }
    }

    /// Publish invalidation topics to `cache` after every flush.
    pub fn subscribe(&mut self, cache: Arc<dyn CacheProvider>) {
        self.subscribers.push(cache);
    }

    pub fn with_subscriber(mut self, cache: Arc<dyn CacheProvider>) -> Self {
        self.subscribe(cache);
        self
    }

    /// Detach written entities from `identity_map` after every flush.
    pub fn with_identity_map(mut self, identity_map: Arc<IdentityMap>) -> Self {
        self.identity_map = Some(identity_map);
        self
    }

    /// Attach a tag to a node.
    pub fn tag_node(&mut self, node_id: i64, tag_id: i64) {
        self.queue_link(&NODE, "tags", node_id, tag_id, true);
    }

    /// Detach a tag from a node.
    pub fn untag_node(&mut self, node_id: i64, tag_id: i64) {
        self.queue_link(&NODE, "tags", node_id, tag_id, false);
    }

    /// File a document into a folder.
    pub fn file_document(&mut self, document_id: i64, folder_id: i64) {
        self.queue_link(&DOCUMENT, "folders", document_id, folder_id, true);
    }

    /// Remove a document from a folder.
    pub fn unfile_document(&mut self, document_id: i64, folder_id: i64) {
        self.queue_link(&DOCUMENT, "folders", document_id, folder_id, false);
    }

    fn queue_link(
        &mut self,
        owner: &'static EntityDescriptor,
        relation: &str,
        owner_id: i64,
        target_id: i64,
        attach: bool,
    ) {
        if let Some(edge) = EdgeRecord::between(owner, relation, owner_id, target_id) {
            self.pending.push(Operation::Link { edge, attach });
        }
    }

    /// Number of queued writes.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop every queued write.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    fn apply(tx: &rusqlite::Transaction<'_>, op: &Operation) -> Result<()> {
        match op {
            Operation::Upsert {
                descriptor, values, ..
            } => {
                let columns: Vec<&str> = values.iter().map(|(c, _)| *c).collect();
                let placeholders: Vec<String> = columns.iter().map(|c| format!(":{}", c)).collect();
                let updates: Vec<String> = columns
                    .iter()
                    .filter(|c| **c != descriptor.identity)
                    .map(|c| format!("{c} = excluded.{c}"))
                    .collect();
                // Conflicts on secondary unique indexes surface as errors.
                let sql = if updates.is_empty() {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO NOTHING",
                        descriptor.table,
                        columns.join(", "),
                        placeholders.join(", "),
                        descriptor.identity
                    )
                } else {
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) DO UPDATE SET {}",
                        descriptor.table,
                        columns.join(", "),
                        placeholders.join(", "),
                        descriptor.identity,
                        updates.join(", ")
                    )
                };
                let params: Vec<(&str, &dyn rusqlite::ToSql)> = placeholders
                    .iter()
                    .zip(values)
                    .map(|(name, (_, value))| (name.as_str(), value as &dyn rusqlite::ToSql))
                    .collect();
                tx.prepare_cached(&sql)?.execute(params.as_slice())?;
            }
            Operation::Delete { descriptor, id } => {
                for relation in descriptor.relations {
                    if let RelationShape::ManyToMany {
                        edge_table,
                        local_column,
                        ..
                    } = relation.shape
                    {
                        tx.execute(
                            &format!("DELETE FROM {} WHERE {} = ?1", edge_table, local_column),
                            [id],
                        )?;
                    }
                }
                tx.execute(
                    &format!(
                        "DELETE FROM {} WHERE {} = ?1",
                        descriptor.table, descriptor.identity
                    ),
                    [id],
                )?;
            }
            Operation::Link { edge, attach } => {
                let [(a, a_id), (b, b_id)] = edge.columns;
                let sql = if *attach {
                    format!(
                        "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?1, ?2)",
                        edge.table, a, b
                    )
                } else {
                    format!("DELETE FROM {} WHERE {} = ?1 AND {} = ?2", edge.table, a, b)
                };
                tx.execute(&sql, [a_id, b_id])?;
            }
        }
        Ok(())
    }
}

impl PersistenceManager for UnitOfWork {
    fn persist<E: Entity>(&mut self, entity: &E) {
        self.pending.push(Operation::Upsert {
            descriptor: E::descriptor(),
            id: entity.id(),
            values: entity.values(),
        });
    }

    fn remove<E: Entity>(&mut self, entity: &E) {
        self.pending.push(Operation::Delete {
            descriptor: E::descriptor(),
            id: entity.id(),
        });
    }

    fn flush(&mut self) -> Result<FlushSummary> {
        if self.pending.is_empty() {
            return Ok(FlushSummary::default());
        }

        let mut conn = self.db.connection()?;
        let tx = conn.transaction()?;
        for op in &self.pending {
            Self::apply(&tx, op)?;
        }
        tx.commit()?;

        let mut summary = FlushSummary::default();
        for op in self.pending.drain(..) {
            match op {
                Operation::Upsert { descriptor, id, .. } => {
                    summary.upserts += 1;
                    add_topic(&mut summary.topics, descriptor.name);
                    if let Some(map) = &self.identity_map {
                        map.detach_key(descriptor.name, id);
                    }
                }
                Operation::Delete { descriptor, id } => {
                    summary.deletes += 1;
                    add_topic(&mut summary.topics, descriptor.name);
                    if let Some(map) = &self.identity_map {
                        map.detach_key(descriptor.name, id);
                    }
                }
                Operation::Link { edge, attach } => {
                    if attach {
                        summary.links += 1;
                    } else {
                        summary.unlinks += 1;
                    }
                    for topic in edge.topics {
                        add_topic(&mut summary.topics, topic);
                    }
                }
            }
        }

        for topic in &summary.topics {
            for subscriber in &self.subscribers {
                subscriber.invalidate(topic);
            }
        }
        debug!(topics = ?summary.topics, "published invalidation topics");
        info!(
            upserts = summary.upserts,
            deletes = summary.deletes,
            links = summary.links,
            unlinks = summary.unlinks,
            "unit of work flushed"
        );
        Ok(summary)
    }
}

fn add_topic(topics: &mut Vec<&'static str>, topic: &'static str) {
    if !topics.contains(&topic) {
        topics.push(topic);
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("pending", &self.pending.len())
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::config::RepositoryConfig;
    use crate::error::Error;
    use crate::model::{ContentNode, LocalizedContent, Tag, Translation};
    use std::time::Duration;
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open(dir.path().join("uow.db"), &RepositoryConfig::default()).unwrap();
        (dir, db)
    }

    fn count(db: &Database, sql: &str) -> i64 {
        db.connection().unwrap().query_row(sql, [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_flush_writes_in_one_transaction() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&ContentNode::new(1, "home"));
        uow.persist(&Tag::new(10, "news"));
        uow.tag_node(1, 10);
        uow.tag_node(1, 10);
        let summary = uow.flush().unwrap();

        assert_eq!(summary.upserts, 2);
        assert_eq!(summary.links, 2);
        assert_eq!(summary.topics, vec!["node", "tag"]);
        assert_eq!(uow.pending(), 0);
        assert_eq!(count(&db, "SELECT COUNT(*) FROM nodes_tags"), 1);
    }

    #[test]
    fn test_failed_flush_leaves_nothing_behind() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&ContentNode::new(1, "home"));
        uow.pending.push(Operation::Delete {
            descriptor: &NODE,
            id: 1,
        });
        uow.pending.push(Operation::Upsert {
            descriptor: &NODE,
            id: 2,
            values: vec![("missing_column", Value::Int64(1))],
        });
        assert!(uow.flush().is_err());
        assert_eq!(count(&db, "SELECT COUNT(*) FROM nodes"), 0);
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&ContentNode::new(1, "home"));
        uow.tag_node(1, 10);
        uow.flush().unwrap();

        uow.persist(&ContentNode::new(1, "start"));
        uow.flush().unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM nodes"), 1);
        assert_eq!(
            count(&db, "SELECT COUNT(*) FROM nodes WHERE node_name = 'start'"),
            1
        );
        assert_eq!(count(&db, "SELECT COUNT(*) FROM nodes_tags"), 1);
    }

    #[test]
    fn test_second_default_translation_is_rejected() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&Translation::new(1, "en").as_default());
        uow.flush().unwrap();

        uow.clear();
        uow.persist(&Translation::new(2, "fr").as_default());
        let err = uow.flush().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(count(&db, "SELECT COUNT(*) FROM translations"), 1);
        assert_eq!(
            count(&db, "SELECT id FROM translations WHERE is_default = 1"),
            1
        );
    }

    #[test]
    fn test_duplicate_localization_keeps_existing_row() {
        let (_dir, db) = open();
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&LocalizedContent::new(1, 1, 1, "Home"));
        uow.flush().unwrap();

        uow.clear();
        uow.persist(&LocalizedContent::new(2, 1, 1, "Start"));
        assert!(matches!(uow.flush(), Err(Error::Storage(_))));
        assert_eq!(
            count(&db, "SELECT id FROM node_sources WHERE node_id = 1 AND translation_id = 1"),
            1
        );
    }

    #[test]
    fn test_remove_drops_join_records() {
        let (_dir, db) = open();
        let node = ContentNode::new(1, "home");
        let mut uow = UnitOfWork::new(db.clone());
        uow.persist(&node);
        uow.tag_node(1, 10);
        uow.flush().unwrap();

        uow.remove(&node);
        uow.flush().unwrap();
        assert_eq!(count(&db, "SELECT COUNT(*) FROM nodes_tags"), 0);
    }

    #[test]
    fn test_flush_invalidates_subscribers() {
        let (_dir, db) = open();
        let cache = Arc::new(ResultCache::new(16));
        cache.set("k", serde_json::json!(1), Duration::from_secs(60), &["tag"]);
        cache.set("other", serde_json::json!(2), Duration::from_secs(60), &["document"]);

        let mut uow = UnitOfWork::new(db).with_subscriber(cache.clone());
        uow.persist(&Tag::new(1, "news"));
        uow.flush().unwrap();

        assert!(cache.get("k").is_none());
        assert!(cache.get("other").is_some());
    }

    #[test]
    fn test_identity_map_detached_on_write() {
        let (_dir, db) = open();
        let map = Arc::new(IdentityMap::new());
        let node = ContentNode::new(1, "home");
        map.insert(&node);
        assert_eq!(map.get::<ContentNode>(1), Some(node.clone()));

        let mut uow = UnitOfWork::new(db).with_identity_map(map.clone());
        uow.persist(&node);
        uow.flush().unwrap();
        assert!(!map.contains::<ContentNode>(1));
    }
}
