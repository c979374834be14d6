//! Join planning over the static relation graph.
//!
//! Every dotted path resolves through [`QueryPlan::join_path`], which
//! reuses the join registered for a (parent alias, relation) pair so that a
//! to-many relation is joined once no matter how many criteria mention it.
//! [`QueryPlan::join_unique`] is the one deliberate exception, used by
//! exclusive set filters.

use tracing::trace;

use super::plan::{ColumnRef, Join, JoinKind, Predicate, QueryPlan};
use crate::catalog::EntityDescriptor;
use crate::error::{Error, Result};

/// Rewrite a path so that a leading `translation` segment on a localized
/// entity walks through its localized projection.
///
/// `translation.locale` on nodes becomes `nodeSources.translation.locale`.
pub fn expand_path<'a>(descriptor: &'static EntityDescriptor, segments: &[&'a str]) -> Vec<&'a str> {
    match (descriptor.localized, segments.first()) {
        (Some(localized), Some(&"translation"))
            if segments.len() > 1 && descriptor.relation("translation").is_none() =>
        {
            let mut expanded: Vec<&'a str> = vec![localized.relation, localized.translation_relation];
            expanded.extend_from_slice(&segments[1..]);
            expanded
        }
        _ => segments.to_vec(),
    }
}

/// Walk relation segments without touching a plan; fails on the first
/// segment that is not a relation of the current entity.
pub fn resolve_relations(
    root: &'static EntityDescriptor,
    segments: &[&str],
    full_path: &str,
) -> Result<&'static EntityDescriptor> {
    let mut current = root;
    for segment in segments {
        let relation = current
            .relation(segment)
            .ok_or_else(|| unsupported(root, full_path))?;
        current = crate::catalog::lookup(relation.target).ok_or_else(|| unsupported(root, full_path))?;
    }
    Ok(current)
}

fn unsupported(root: &EntityDescriptor, path: &str) -> Error {
    Error::UnsupportedPath {
        entity: root.name.to_string(),
        path: path.to_string(),
    }
}

impl QueryPlan {
    /// Join `relation` from `parent`, reusing the shared join when present.
    pub fn join_relation(
        &mut self,
        parent: &str,
        relation: &str,
        kind: JoinKind,
    ) -> Result<(String, &'static EntityDescriptor)> {
        if let Some(existing) = self.joins.find(parent, relation) {
            trace!(parent, relation, alias = %existing.alias, "reusing join");
            return Ok((existing.alias.clone(), existing.target));
        }

        let (descriptor, target) = self.relation_target(parent, relation)?;
        let relation = descriptor
            .relation(relation)
            .ok_or_else(|| unsupported(self.root, relation))?;
        let alias = self.fresh_alias(relation.alias);
        trace!(parent, relation = relation.name, alias = %alias, ?kind, "adding join");
        self.joins.push(Join {
            parent: parent.to_string(),
            relation,
            target,
            alias: alias.clone(),
            kind,
            conditions: Vec::new(),
            shared: true,
        });
        Ok((alias, target))
    }

    /// Join `relation` from `parent` under a new alias, bypassing reuse.
    ///
    /// The join is never returned by later [`QueryPlan::join_relation`]
    /// lookups for the same key.
    pub fn join_unique(
        &mut self,
        parent: &str,
        relation: &str,
        kind: JoinKind,
        suffix: usize,
        conditions: Vec<Predicate>,
    ) -> Result<String> {
        let (descriptor, target) = self.relation_target(parent, relation)?;
        let relation = descriptor
            .relation(relation)
            .ok_or_else(|| unsupported(self.root, relation))?;
        let alias = self.fresh_alias(&format!("{}_{}", relation.alias, suffix));
        self.joins.push(Join {
            parent: parent.to_string(),
            relation,
            target,
            alias: alias.clone(),
            kind,
            conditions,
            shared: false,
        });
        Ok(alias)
    }

    /// Resolve a chain of relation segments from the root alias.
    pub fn join_path(
        &mut self,
        segments: &[&str],
        kind: JoinKind,
    ) -> Result<(String, &'static EntityDescriptor)> {
        let full_path = segments.join(".");
        // Validate the whole chain before registering anything.
        resolve_relations(self.root, segments, &full_path)?;

        let mut alias = self.root.alias.to_string();
        let mut descriptor = self.root;
        for segment in segments {
            let (next_alias, next) = self.join_relation(&alias, segment, kind)?;
            alias = next_alias;
            descriptor = next;
        }
        Ok((alias, descriptor))
    }

    /// Resolve a dotted field path to an aliased column, joining its
    /// relation prefix.
    pub fn resolve_column(&mut self, path: &str, kind: JoinKind) -> Result<ColumnRef> {
        let raw: Vec<&str> = path.split('.').collect();
        let segments = expand_path(self.root, &raw);
        let Some((field, relations)) = segments.split_last() else {
            return Err(unsupported(self.root, path));
        };
        resolve_relations(self.root, relations, path)?;
        let (alias, descriptor) = self.join_path(relations, kind)?;
        let field = descriptor.field(field).ok_or_else(|| Error::UnknownField {
            entity: descriptor.name.to_string(),
            field: field.to_string(),
        })?;
        Ok(ColumnRef::new(alias, field.column))
    }

    fn relation_target(
        &self,
        parent: &str,
        relation: &str,
    ) -> Result<(&'static EntityDescriptor, &'static EntityDescriptor)> {
        let descriptor = self
            .descriptor_for(parent)
            .ok_or_else(|| unsupported(self.root, relation))?;
        let target = descriptor
            .relation(relation)
            .and_then(|r| crate::catalog::lookup(r.target))
            .ok_or_else(|| unsupported(self.root, relation))?;
        Ok((descriptor, target))
    }

    fn fresh_alias(&self, base: &str) -> String {
        let taken = |alias: &str| alias == self.root.alias || self.joins.alias_taken(alias);
        if !taken(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}_{}", base, n);
            if !taken(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }
}
