//! SQLite-backed store: connection pool and schema bootstrap.

use std::fmt::Write;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::catalog::{self, RelationShape};
use crate::config::RepositoryConfig;
use crate::error::Result;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Unique indexes and lookup indexes not derivable from descriptors.
const EXTRA_INDEXES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS node_sources_node_translation ON node_sources (node_id, translation_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS tag_translations_tag_translation ON tag_translations (tag_id, translation_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS folder_translations_folder_translation ON folder_translations (folder_id, translation_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS document_translations_document_translation ON document_translations (document_id, translation_id)",
    "CREATE UNIQUE INDEX IF NOT EXISTS translations_single_default ON translations (is_default) WHERE is_default = 1",
    "CREATE UNIQUE INDEX IF NOT EXISTS translations_locale ON translations (locale)",
    "CREATE INDEX IF NOT EXISTS nodes_parent ON nodes (parent_id)",
    "CREATE INDEX IF NOT EXISTS nodes_status ON nodes (status)",
    "CREATE INDEX IF NOT EXISTS tags_parent ON tags (parent_id)",
    "CREATE INDEX IF NOT EXISTS folders_parent ON folders (parent_id)",
];

/// Idle connection pool.
struct ConnectionPool {
    path: PathBuf,
    idle: Mutex<Vec<Connection>>,
    max_idle: usize,
}

impl ConnectionPool {
    fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
                | OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(conn);
        }
    }
}

/// A connection checked out for one call; returned to the pool on drop.
pub struct PooledConnection {
    conn: Option<Connection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `Drop` takes the connection out.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("connection taken"))
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("connection taken"))
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

/// Handle to the content database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    pool: Arc<ConnectionPool>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bootstrap the
    /// schema.
    pub fn open(path: impl AsRef<Path>, config: &RepositoryConfig) -> Result<Self> {
        let pool = Arc::new(ConnectionPool {
            path: path.as_ref().to_path_buf(),
            idle: Mutex::new(Vec::new()),
            max_idle: config.pool_size,
        });
        let db = Self { pool };
        db.bootstrap()?;
        info!(path = %db.path().display(), "database opened");
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.pool.path
    }

    /// Check out a connection.
    pub fn connection(&self) -> Result<PooledConnection> {
        let reused = self.pool.idle.lock().pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.pool.open_connection()?,
        };
        Ok(PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.pool),
        })
    }

    /// Number of idle pooled connections.
    pub fn idle_connections(&self) -> usize {
        self.pool.idle.lock().len()
    }

    /// Create missing tables and indexes. Existing tables are left alone.
    pub fn bootstrap(&self) -> Result<()> {
        let conn = self.connection()?;
        let statements = schema_statements();
        conn.execute_batch(&statements.join(";\n"))?;
        debug!(statements = statements.len(), "schema bootstrapped");
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.pool.path)
            .field("max_idle", &self.pool.max_idle)
            .finish()
    }
}

/// DDL for every descriptor table, join record table, and index.
pub fn schema_statements() -> Vec<String> {
    let mut statements = Vec::new();
    let mut edges: Vec<(&str, &str, &str)> = Vec::new();

    for descriptor in catalog::all() {
        let mut ddl = format!("CREATE TABLE IF NOT EXISTS {} (", descriptor.table);
        for (i, field) in descriptor.fields.iter().enumerate() {
            if i > 0 {
                ddl.push_str(", ");
            }
            let _ = write!(ddl, "{} {}", field.column, field.kind.sql_type());
            if field.column == descriptor.identity {
                ddl.push_str(" PRIMARY KEY");
            }
        }
        ddl.push(')');
        statements.push(ddl);

        for relation in descriptor.relations {
            if let RelationShape::ManyToMany {
                edge_table,
                local_column,
                remote_column,
            } = relation.shape
            {
                let exists = edges.iter().any(|(t, _, _)| *t == edge_table);
                if !exists {
                    edges.push((edge_table, local_column, remote_column));
                }
            }
        }
    }

    for (table, a, b) in edges {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {table} ({a} INTEGER NOT NULL, {b} INTEGER NOT NULL, PRIMARY KEY ({a}, {b}))"
        ));
        statements.push(format!(
            "CREATE INDEX IF NOT EXISTS {table}_{b} ON {table} ({b})"
        ));
    }

    statements.extend(EXTRA_INDEXES.iter().map(|s| s.to_string()));
    statements
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("content.db");
        let config = RepositoryConfig::default();
        Database::open(&path, &config).unwrap();
        let db = Database::open(&path, &config).unwrap();

        let conn = db.connection().unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        // Ten entity tables plus two join record tables.
        assert_eq!(tables, 12);
    }

    #[test]
    fn test_connections_return_to_pool() {
        let dir = TempDir::new().unwrap();
        let config = RepositoryConfig::default().with_pool_size(1);
        let db = Database::open(dir.path().join("pool.db"), &config).unwrap();
        {
            let _a = db.connection().unwrap();
            let _b = db.connection().unwrap();
        }
        assert_eq!(db.idle_connections(), 1);
    }

    #[test]
    fn test_schema_mentions_join_tables() {
        let ddl = schema_statements().join("\n");
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS nodes_tags (node_id INTEGER NOT NULL, tag_id INTEGER NOT NULL"));
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS documents_folders (folder_id INTEGER NOT NULL, document_id INTEGER NOT NULL"));
    }
}
