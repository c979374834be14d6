//! Bounded and streaming execution of compiled queries.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, trace};

use super::compiler::{Bindings, CompiledQuery};
use crate::error::Result;
use crate::model::Entity;
use crate::persistence::IdentityMap;
use crate::store::PooledConnection;

/// Run a select statement and hydrate every row.
pub fn fetch<E: Entity>(conn: &Connection, sql: &str, bindings: &Bindings) -> Result<Vec<E>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let params = bindings.as_params();
    let rows = stmt.query_map(params.as_slice(), E::from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Run a count statement.
pub fn fetch_count(conn: &Connection, sql: &str, bindings: &Bindings) -> Result<u64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let params = bindings.as_params();
    let count: i64 = stmt.query_row(params.as_slice(), |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// One bounded page with the total number of matching roots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paginator<E> {
    pub items: Vec<E>,
    pub total: u64,
    pub limit: usize,
    pub offset: usize,
}

impl<E> Paginator<E> {
    /// 1-based page number.
    pub fn page(&self) -> usize {
        if self.limit == 0 {
            return 1;
        }
        self.offset / self.limit + 1
    }

    pub fn page_count(&self) -> usize {
        if self.limit == 0 {
            return 1;
        }
        (self.total as usize).div_ceil(self.limit).max(1)
    }

    pub fn has_next(&self) -> bool {
        ((self.offset + self.items.len()) as u64) < self.total
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Finite, non-restartable cursor yielding fixed-size batches.
///
/// Holds one pooled connection until dropped. Dropping the cursor early is
/// how a caller cancels a scan.
pub struct Cursor<E: Entity> {
    conn: PooledConnection,
    compiled: CompiledQuery,
    batch_size: usize,
    next_offset: usize,
    remaining: Option<usize>,
    batches: usize,
    rows: usize,
    detach_every: usize,
    identity_map: Option<Arc<IdentityMap>>,
    attached: Vec<i64>,
    finished: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Cursor<E> {
    pub fn new(
        conn: PooledConnection,
        compiled: CompiledQuery,
        batch_size: usize,
        detach_every: usize,
    ) -> Self {
        let next_offset = compiled.plan().offset.unwrap_or(0);
        let remaining = compiled.plan().limit;
        Self {
            conn,
            compiled,
            batch_size: batch_size.max(1),
            next_offset,
            remaining,
            batches: 0,
            rows: 0,
            detach_every: detach_every.max(1),
            identity_map: None,
            attached: Vec::new(),
            finished: false,
            _entity: PhantomData,
        }
    }

    /// Register streamed entities in `identity_map`, detaching them every
    /// `detach_every` batches.
    pub fn with_identity_map(mut self, identity_map: Arc<IdentityMap>) -> Self {
        self.identity_map = Some(identity_map);
        self
    }

    /// Batches yielded so far.
    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Rows yielded so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.detach_attached();
            debug!(
                entity = E::descriptor().name,
                batches = self.batches,
                rows = self.rows,
                "cursor exhausted"
            );
        }
    }

    fn detach_attached(&mut self) {
        if let Some(map) = &self.identity_map {
            let detached = map.detach::<E>(&self.attached);
            trace!(entity = E::descriptor().name, detached, "detached streamed entities");
        }
        self.attached.clear();
    }
}

impl<E: Entity> Iterator for Cursor<E> {
    type Item = Result<Vec<E>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        let size = match self.remaining {
            Some(0) => {
                self.finish();
                return None;
            }
            Some(remaining) => remaining.min(self.batch_size),
            None => self.batch_size,
        };

        let sql = self.compiled.window_sql(Some(size), Some(self.next_offset));
        let batch = match fetch::<E>(&self.conn, &sql, self.compiled.bindings()) {
            Ok(batch) => batch,
            Err(err) => {
                self.finish();
                return Some(Err(err));
            }
        };
        if batch.is_empty() {
            self.finish();
            return None;
        }

        self.next_offset += batch.len();
        self.rows += batch.len();
        self.batches += 1;
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(batch.len());
        }

        if let Some(map) = self.identity_map.clone() {
            for entity in &batch {
                map.insert(entity);
                self.attached.push(entity.id());
            }
            if self.batches % self.detach_every == 0 {
                self.detach_attached();
            }
        }

        if batch.len() < size {
            self.finish();
        }
        Some(Ok(batch))
    }
}

impl<E: Entity> FusedIterator for Cursor<E> {}

impl<E: Entity> Drop for Cursor<E> {
    fn drop(&mut self) {
        self.detach_attached();
    }
}
