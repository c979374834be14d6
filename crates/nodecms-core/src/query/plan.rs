//! Ephemeral compiled query structure and its SQL rendering.

use std::fmt::Write;

use super::criteria::{Operand, OrderDirection};
use super::translation::TranslationStrategy;
use super::visibility::GateState;
use crate::catalog::{EntityDescriptor, RelationDescriptor, RelationShape};

/// Join flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn as_sql(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

/// An alias-qualified column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }

    fn render(&self, out: &mut String) {
        let _ = write!(out, "{}.{}", self.alias, self.column);
    }
}

/// Comparison operators with a single bound operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// A boolean expression over aliased columns and named parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: ColumnRef,
        op: CompareOp,
        param: String,
    },
    Between {
        column: ColumnRef,
        low: String,
        high: String,
    },
    Like {
        column: ColumnRef,
        param: String,
        case_insensitive: bool,
    },
    In {
        column: ColumnRef,
        params: Vec<String>,
    },
    NotIn {
        column: ColumnRef,
        params: Vec<String>,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    /// Matches nothing.
    AlwaysFalse,
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
    /// Hand-written SQL fragment, for extensions. Parameters it references
    /// must be registered with [`QueryPlan::add_param`].
    Raw(String),
}

impl Predicate {
    pub fn compare(column: ColumnRef, op: CompareOp, param: impl Into<String>) -> Self {
        Predicate::Compare {
            column,
            op,
            param: param.into(),
        }
    }

    /// Parameter names referenced by this predicate.
    pub fn params(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_params(&mut names);
        names
    }

    fn collect_params<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { param, .. } | Predicate::Like { param, .. } => names.push(param),
            Predicate::Between { low, high, .. } => {
                names.push(low);
                names.push(high);
            }
            Predicate::In { params, .. } | Predicate::NotIn { params, .. } => {
                names.extend(params.iter().map(String::as_str))
            }
            Predicate::Or(items) | Predicate::And(items) => {
                for item in items {
                    item.collect_params(names);
                }
            }
            Predicate::IsNull(_)
            | Predicate::IsNotNull(_)
            | Predicate::AlwaysFalse
            | Predicate::Raw(_) => {}
        }
    }

    fn render(&self, out: &mut String) {
        match self {
            Predicate::Compare { column, op, param } => {
                column.render(out);
                let _ = write!(out, " {} {}", op.as_sql(), param);
            }
            Predicate::Between { column, low, high } => {
                column.render(out);
                let _ = write!(out, " BETWEEN {} AND {}", low, high);
            }
            Predicate::Like {
                column,
                param,
                case_insensitive,
            } => {
                if *case_insensitive {
                    out.push_str("LOWER(");
                    column.render(out);
                    out.push(')');
                } else {
                    column.render(out);
                }
                let _ = write!(out, " LIKE {}", param);
            }
            Predicate::In { column, params } | Predicate::NotIn { column, params } => {
                column.render(out);
                let keyword = if matches!(self, Predicate::In { .. }) {
                    " IN ("
                } else {
                    " NOT IN ("
                };
                out.push_str(keyword);
                out.push_str(&params.join(", "));
                out.push(')');
            }
            Predicate::IsNull(column) => {
                column.render(out);
                out.push_str(" IS NULL");
            }
            Predicate::IsNotNull(column) => {
                column.render(out);
                out.push_str(" IS NOT NULL");
            }
            Predicate::AlwaysFalse => out.push_str("1 = 0"),
            Predicate::Or(items) => render_group(items, " OR ", "1 = 0", out),
            Predicate::And(items) => render_group(items, " AND ", "1 = 1", out),
            Predicate::Raw(sql) => {
                out.push('(');
                out.push_str(sql);
                out.push(')');
            }
        }
    }
}

fn render_group(items: &[Predicate], separator: &str, empty: &str, out: &mut String) {
    if items.is_empty() {
        out.push_str(empty);
        return;
    }
    out.push('(');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(separator);
        }
        item.render(out);
    }
    out.push(')');
}

/// One registered join.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    /// Alias the relation is joined from.
    pub parent: String,
    pub relation: &'static RelationDescriptor,
    pub target: &'static EntityDescriptor,
    pub alias: String,
    pub kind: JoinKind,
    /// Extra ON conditions on the target.
    pub conditions: Vec<Predicate>,
    /// Whether this join is shared through the registry key.
    pub shared: bool,
}

impl Join {
    fn render(&self, parent_identity: &str, out: &mut String) {
        let kind = self.kind.as_sql();
        let target = self.target;
        match self.relation.shape {
            RelationShape::ManyToOne { local_column } => {
                let _ = write!(
                    out,
                    " {} {} AS {} ON {}.{} = {}.{}",
                    kind, target.table, self.alias, self.alias, target.identity, self.parent,
                    local_column
                );
            }
            RelationShape::OneToMany { remote_column } => {
                let _ = write!(
                    out,
                    " {} {} AS {} ON {}.{} = {}.{}",
                    kind, target.table, self.alias, self.alias, remote_column, self.parent,
                    parent_identity
                );
            }
            RelationShape::ManyToMany {
                edge_table,
                local_column,
                remote_column,
            } => {
                let edge = self.edge_alias();
                let _ = write!(
                    out,
                    " {} {} AS {} ON {}.{} = {}.{} {} {} AS {} ON {}.{} = {}.{}",
                    kind,
                    edge_table,
                    edge,
                    edge,
                    local_column,
                    self.parent,
                    parent_identity,
                    kind,
                    target.table,
                    self.alias,
                    self.alias,
                    target.identity,
                    edge,
                    remote_column
                );
            }
        }
        for condition in &self.conditions {
            out.push_str(" AND ");
            condition.render(out);
        }
    }

    /// Alias of the join record table for many-to-many relations.
    pub fn edge_alias(&self) -> String {
        format!("{}_link", self.alias)
    }
}

/// Deduplicating join registry keyed by (parent alias, relation name).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinRegistry {
    joins: Vec<Join>,
}

impl JoinRegistry {
    /// Shared join for `(parent, relation)`, if already registered.
    pub fn find(&self, parent: &str, relation: &str) -> Option<&Join> {
        self.joins
            .iter()
            .find(|j| j.shared && j.parent == parent && j.relation.name == relation)
    }

    pub fn get(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    pub fn get_mut(&mut self, alias: &str) -> Option<&mut Join> {
        self.joins.iter_mut().find(|j| j.alias == alias)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Join> {
        self.joins.iter()
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Number of joins registered from `parent` through `relation`,
    /// unique joins included.
    pub fn count_for(&self, parent: &str, relation: &str) -> usize {
        self.joins
            .iter()
            .filter(|j| j.parent == parent && j.relation.name == relation)
            .count()
    }

    pub(crate) fn alias_taken(&self, alias: &str) -> bool {
        self.joins
            .iter()
            .any(|j| j.alias == alias || j.edge_alias() == alias)
    }

    pub(crate) fn push(&mut self, join: Join) {
        self.joins.push(join);
    }
}

/// A named parameter registered in the plan, with the criteria key that
/// produced it and the operand it defaults to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub name: String,
    pub key: String,
    pub operand: Operand,
}

/// One ORDER BY term.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTerm {
    pub column: ColumnRef,
    pub direction: OrderDirection,
}

/// Compiled join/predicate/ordering/window structure for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub root: &'static EntityDescriptor,
    pub joins: JoinRegistry,
    pub predicates: Vec<Predicate>,
    pub order: Vec<OrderTerm>,
    pub params: Vec<ParamSlot>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub translation: TranslationStrategy,
    pub gate: GateState,
}

impl QueryPlan {
    pub fn new(root: &'static EntityDescriptor) -> Self {
        Self {
            root,
            joins: JoinRegistry::default(),
            predicates: Vec::new(),
            order: Vec::new(),
            params: Vec::new(),
            limit: None,
            offset: None,
            translation: TranslationStrategy::None,
            gate: GateState::Bypass,
        }
    }

    /// Root alias.
    pub fn root_alias(&self) -> &'static str {
        self.root.alias
    }

    /// Root identity column.
    pub fn root_identity(&self) -> ColumnRef {
        ColumnRef::new(self.root.alias, self.root.identity)
    }

    /// Register a named parameter and return its placeholder (`:name`).
    pub fn add_param(&mut self, key: &str, operand: Operand) -> String {
        let stem: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let name = format!(":{}_{}", stem, self.params.len());
        self.params.push(ParamSlot {
            name: name.clone(),
            key: key.to_string(),
            operand,
        });
        name
    }

    /// AND a predicate into the WHERE clause.
    pub fn add_predicate(&mut self, predicate: Predicate) {
        self.predicates.push(predicate);
    }

    /// Entity descriptor behind an alias (root or joined).
    pub fn descriptor_for(&self, alias: &str) -> Option<&'static EntityDescriptor> {
        if alias == self.root.alias {
            return Some(self.root);
        }
        self.joins.get(alias).map(|j| j.target)
    }

    fn render_from(&self, out: &mut String) {
        let _ = write!(out, " FROM {} AS {}", self.root.table, self.root.alias);
        for join in self.joins.iter() {
            let parent_identity = self
                .descriptor_for(&join.parent)
                .map(|d| d.identity)
                .unwrap_or("id");
            join.render(parent_identity, out);
        }
        if !self.predicates.is_empty() {
            out.push_str(" WHERE ");
            for (i, predicate) in self.predicates.iter().enumerate() {
                if i > 0 {
                    out.push_str(" AND ");
                }
                predicate.render(out);
            }
        }
    }

    fn render_select(&self, out: &mut String) {
        out.push_str("SELECT DISTINCT ");
        for (i, field) in self.root.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{}.{} AS {}", self.root.alias, field.column, field.column);
        }
        self.render_from(out);
        if !self.order.is_empty() {
            out.push_str(" ORDER BY ");
            for (i, term) in self.order.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                term.column.render(out);
                out.push(' ');
                out.push_str(term.direction.as_sql());
            }
        }
    }

    /// Full statement, without the pagination window.
    pub fn to_sql_unbounded(&self) -> String {
        let mut out = String::with_capacity(256);
        self.render_select(&mut out);
        out
    }

    /// Full statement with the plan's own window.
    pub fn to_sql(&self) -> String {
        self.to_sql_window(self.limit, self.offset)
    }

    /// Full statement with an explicit window.
    pub fn to_sql_window(&self, limit: Option<usize>, offset: Option<usize>) -> String {
        let mut out = self.to_sql_unbounded();
        match (limit, offset) {
            (Some(limit), Some(offset)) => {
                let _ = write!(out, " LIMIT {} OFFSET {}", limit, offset);
            }
            (Some(limit), None) => {
                let _ = write!(out, " LIMIT {}", limit);
            }
            (None, Some(offset)) => {
                let _ = write!(out, " LIMIT -1 OFFSET {}", offset);
            }
            (None, None) => {}
        }
        out
    }

    /// Distinct root count, unaffected by join row multiplication.
    pub fn to_count_sql(&self) -> String {
        let mut out = format!(
            "SELECT COUNT(DISTINCT {}.{})",
            self.root.alias, self.root.identity
        );
        self.render_from(&mut out);
        out
    }

    /// Entity names this plan reads, used as cache invalidation topics.
    pub fn topics(&self) -> Vec<&'static str> {
        let mut topics = vec![self.root.name];
        for join in self.joins.iter() {
            if !topics.contains(&join.target.name) {
                topics.push(join.target.name);
            }
        }
        topics
    }
}
