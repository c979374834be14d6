//! Criteria-to-query compilation.

use std::collections::HashSet;

use rusqlite::ToSql;
use tracing::debug;

use super::criteria::{FindQuery, Operand, Operator, OrderDirection};
use super::hooks::{ApplyEvent, BuildEvent, HookBus};
use super::normalizer::{normalize, NormalizedFilter};
use super::plan::{ColumnRef, CompareOp, JoinKind, OrderTerm, Predicate, QueryPlan};
use super::search::{apply_identifier, apply_search};
use super::set_filter::apply_set_filter;
use super::translation::apply_translation;
use super::visibility::{apply_gate, VisibilityContext};
use crate::catalog::EntityDescriptor;
use crate::error::{Error, Result};
use crate::model::{EntityRef, Value};

/// Named parameter values for one compiled statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: Vec<(String, Value)>,
}

impl Bindings {
    /// Set a value, replacing any earlier value for `name`.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Borrowed named parameters for `rusqlite`.
    pub fn as_params(&self) -> Vec<(&str, &dyn ToSql)> {
        self.values
            .iter()
            .map(|(n, v)| (n.as_str(), v as &dyn ToSql))
            .collect()
    }

    fn retain_names(&mut self, names: &HashSet<String>) {
        self.values.retain(|(n, _)| names.contains(n));
    }
}

/// A plan together with its bound parameter values.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    plan: QueryPlan,
    bindings: Bindings,
}

impl CompiledQuery {
    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Statement with the plan's window.
    pub fn sql(&self) -> String {
        self.plan.to_sql()
    }

    /// Statement with the given window.
    pub fn window_sql(&self, limit: Option<usize>, offset: Option<usize>) -> String {
        self.plan.to_sql_window(limit, offset)
    }

    /// Distinct root count statement.
    pub fn count_sql(&self) -> String {
        self.plan.to_count_sql()
    }

    /// Cache key for the windowed select statement.
    pub fn fingerprint(&self) -> String {
        self.fingerprint_of(&self.sql())
    }

    /// Cache key of `statement` combined with this query's bindings.
    pub fn fingerprint_of(&self, statement: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(statement.as_bytes());
        for (name, value) in self.bindings.iter() {
            hasher.update(&[0xff]);
            hasher.update(name.as_bytes());
            value.hash_into(&mut hasher);
        }
        hex::encode(hasher.finalize().as_bytes())
    }
}

/// The compiler pipeline.
///
/// Stateless; every call builds and returns a fresh plan.
pub struct QueryCompiler;

impl QueryCompiler {
    /// Compile `query` against `descriptor` under the visibility policy in
    /// `visibility`, running `hooks` for every generic criteria key.
    pub fn compile(
        descriptor: &'static EntityDescriptor,
        query: &FindQuery,
        visibility: &VisibilityContext,
        hooks: &HookBus,
    ) -> Result<CompiledQuery> {
        let normalized = normalize(descriptor, &query.criteria)?;

        let mut plan = QueryPlan::new(descriptor);
        plan.limit = query.limit;
        plan.offset = query.offset;

        let explicit = query
            .translation
            .map(|id| Operand::Entity(EntityRef::new("translation", id)))
            .or_else(|| normalized.translation.clone());
        apply_translation(&mut plan, explicit, normalized.references_translation)?;

        if let Some(tags) = &normalized.tags {
            apply_set_filter(&mut plan, tags)?;
        }
        if let Some(folders) = &normalized.folders {
            apply_set_filter(&mut plan, folders)?;
        }

        // Suppressed keys contribute neither a join nor a default predicate.
        let mut defaults = Vec::with_capacity(normalized.filters.len());
        for filter in &normalized.filters {
            let mut event = BuildEvent::new(&mut plan, filter);
            if hooks.dispatch_build(&mut event)? {
                continue;
            }
            let (alias, target) = plan.join_path(filter.relations(), JoinKind::Inner)?;
            let column = target
                .field(filter.field())
                .map(|f| f.column)
                .unwrap_or(filter.field());
            defaults.push((filter, ColumnRef::new(alias, column)));
        }

        resolve_order(&mut plan, query)?;

        if let Some(identifier) = &query.identifier {
            apply_identifier(&mut plan, identifier)?;
        }

        apply_gate(&mut plan, visibility.gate_state())?;

        for (filter, column) in defaults {
            if let Some(predicate) = default_predicate(&mut plan, filter, column) {
                plan.add_predicate(predicate);
            }
        }

        if let Some(pattern) = &query.search {
            apply_search(&mut plan, pattern)?;
        }

        if let Some(ids) = &query.within_ids {
            let predicate = if ids.is_empty() {
                Predicate::AlwaysFalse
            } else {
                Predicate::In {
                    params: ids
                        .iter()
                        .map(|id| plan.add_param("within", Operand::Value(Value::Int64(*id))))
                        .collect(),
                    column: plan.root_identity(),
                }
            };
            plan.add_predicate(predicate);
        }

        let bindings = bind(&plan, hooks)?;
        let compiled = CompiledQuery { plan, bindings };
        debug!(
            entity = descriptor.name,
            joins = compiled.plan.joins.len(),
            params = compiled.bindings.len(),
            sql = %compiled.sql(),
            "compiled query"
        );
        Ok(compiled)
    }
}

fn resolve_order(plan: &mut QueryPlan, query: &FindQuery) -> Result<()> {
    for (path, direction) in query.order.iter() {
        let column = plan.resolve_column(path, JoinKind::Left)?;
        plan.order.push(OrderTerm { column, direction });
    }
    let identity = plan.root_identity();
    if !plan.order.iter().any(|t| t.column == identity) {
        plan.order.push(OrderTerm {
            column: identity,
            direction: OrderDirection::Asc,
        });
    }
    Ok(())
}

fn default_predicate(
    plan: &mut QueryPlan,
    filter: &NormalizedFilter,
    column: ColumnRef,
) -> Option<Predicate> {
    let key = filter.key.as_str();
    let predicate = match filter.operator {
        Operator::Eq => compare(plan, filter, column, CompareOp::Eq),
        Operator::Ne => compare(plan, filter, column, CompareOp::Ne),
        Operator::Lt => compare(plan, filter, column, CompareOp::Lt),
        Operator::Lte => compare(plan, filter, column, CompareOp::Lte),
        Operator::Gt => compare(plan, filter, column, CompareOp::Gt),
        Operator::Gte => compare(plan, filter, column, CompareOp::Gte),
        Operator::Between => {
            let low = plan.add_param(key, filter.operands[0].clone());
            let high = plan.add_param(key, filter.operands[1].clone());
            Predicate::Between { column, low, high }
        }
        Operator::Like => {
            let param = plan.add_param(key, first_operand(filter));
            Predicate::Like {
                column,
                param,
                case_insensitive: false,
            }
        }
        Operator::In if filter.operands.is_empty() => Predicate::AlwaysFalse,
        Operator::In => Predicate::In {
            params: filter
                .operands
                .iter()
                .map(|o| plan.add_param(key, o.clone()))
                .collect(),
            column,
        },
        Operator::NotIn if filter.operands.is_empty() => return None,
        Operator::NotIn => Predicate::NotIn {
            params: filter
                .operands
                .iter()
                .map(|o| plan.add_param(key, o.clone()))
                .collect(),
            column,
        },
        Operator::IsNull => Predicate::IsNull(column),
        Operator::IsNotNull => Predicate::IsNotNull(column),
    };
    Some(predicate)
}

fn compare(
    plan: &mut QueryPlan,
    filter: &NormalizedFilter,
    column: ColumnRef,
    op: CompareOp,
) -> Predicate {
    let param = plan.add_param(&filter.key, first_operand(filter));
    Predicate::compare(column, op, param)
}

fn first_operand(filter: &NormalizedFilter) -> Operand {
    filter
        .operands
        .first()
        .cloned()
        .unwrap_or(Operand::Value(Value::Null))
}

/// Parameter names the rendered statement actually references.
fn referenced_params(plan: &QueryPlan) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut raws = Vec::new();
    let mut visit = |predicate: &Predicate| {
        names.extend(predicate.params().into_iter().map(str::to_string));
        collect_raw(predicate, &mut raws);
    };
    for predicate in &plan.predicates {
        visit(predicate);
    }
    for join in plan.joins.iter() {
        for condition in &join.conditions {
            visit(condition);
        }
    }
    for slot in &plan.params {
        if raws.iter().any(|sql: &String| mentions(sql, &slot.name)) {
            names.insert(slot.name.clone());
        }
    }
    names
}

fn collect_raw(predicate: &Predicate, out: &mut Vec<String>) {
    match predicate {
        Predicate::Raw(sql) => out.push(sql.clone()),
        Predicate::Or(items) | Predicate::And(items) => {
            for item in items {
                collect_raw(item, out);
            }
        }
        _ => {}
    }
}

/// Whether `sql` mentions the placeholder `name` as a whole token.
fn mentions(sql: &str, name: &str) -> bool {
    sql.match_indices(name).any(|(i, _)| {
        sql[i + name.len()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_'))
    })
}

fn bind(plan: &QueryPlan, hooks: &HookBus) -> Result<Bindings> {
    let referenced = referenced_params(plan);
    let mut bindings = Bindings::default();

    let mut keys: Vec<&str> = Vec::new();
    for slot in &plan.params {
        if !keys.contains(&slot.key.as_str()) {
            keys.push(&slot.key);
        }
    }

    for key in keys {
        let slots: Vec<_> = plan
            .params
            .iter()
            .filter(|s| s.key == key && referenced.contains(&s.name))
            .cloned()
            .collect();
        if slots.is_empty() {
            continue;
        }
        let mut event = ApplyEvent::new(key, &slots, &mut bindings);
        if hooks.dispatch_apply(&mut event)? {
            if let Some(slot) = slots.iter().find(|s| !bindings.contains(&s.name)) {
                return Err(Error::invalid_criterion(
                    key,
                    format!("listener stopped binding but left {} unbound", slot.name),
                ));
            }
            continue;
        }
        for slot in &slots {
            bindings.set(slot.name.clone(), slot.operand.to_value());
        }
    }

    bindings.retain_names(&referenced);
    Ok(bindings)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::catalog::{NODE, NODE_SOURCE};
    use crate::query::criteria::{FilterCriteria, OrderBy};
    use crate::query::hooks::QueryListener;
    use crate::query::visibility::GateState;

    fn compile(descriptor: &'static EntityDescriptor, query: &FindQuery) -> CompiledQuery {
        QueryCompiler::compile(
            descriptor,
            query,
            &VisibilityContext::published_only(),
            &HookBus::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_compilation_is_deterministic() {
        let query = FindQuery::new(
            FilterCriteria::new()
                .eq("nodeType.name", "page")
                .op("position", ">", 2i64)
                .tags([1i64, 2], false),
        )
        .with_order(OrderBy::new().desc("nodeType.name"));
        let a = compile(&NODE, &query);
        let b = compile(&NODE, &query);
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn test_repeated_prefix_joins_once() {
        let query = FindQuery::new(
            FilterCriteria::new()
                .eq("node.nodeName", "home")
                .eq("node.visible", true)
                .eq("node.nodeType.name", "page"),
        )
        .with_order(OrderBy::new().asc("node.position"));
        let compiled = compile(&NODE_SOURCE, &query);
        assert_eq!(compiled.plan().joins.count_for("ns", "node"), 1);
        assert_eq!(compiled.plan().joins.count_for("n", "nodeType"), 1);
    }

    #[test]
    fn test_empty_in_and_not_in() {
        let query = FindQuery::new(
            FilterCriteria::new()
                .any_of("id", Vec::<i64>::new())
                .not_in("nodeName", Vec::<String>::new()),
        );
        let compiled = compile(&NODE, &query);
        let sql = compiled.sql();
        assert!(sql.contains("1 = 0"));
        assert!(!sql.contains("NOT IN"));
    }

    #[test]
    fn test_gate_is_always_present_in_strict_mode() {
        let query = FindQuery::new(FilterCriteria::new().op("status", "<=", 50i64));
        let compiled = compile(&NODE, &query);
        assert_eq!(compiled.plan().gate, GateState::Strict);
        assert!(compiled.sql().contains("n.status = :visibility_"));
        assert_eq!(
            compiled
                .bindings()
                .iter()
                .filter(|(name, _)| name.starts_with(":visibility"))
                .count(),
            1
        );
    }

    #[test]
    fn test_order_ends_with_identity() {
        let query = FindQuery::new(FilterCriteria::new()).with_order(OrderBy::new().asc("position"));
        let sql = compile(&NODE, &query).sql();
        assert!(sql.ends_with("ORDER BY n.position ASC, n.id ASC"));

        let by_id = FindQuery::new(FilterCriteria::new()).with_order(OrderBy::new().desc("id"));
        assert!(compile(&NODE, &by_id).sql().ends_with("ORDER BY n.id DESC"));
    }

    #[test]
    fn test_entity_refs_bind_as_ids() {
        let query = FindQuery::new(
            FilterCriteria::new().eq("nodeType", EntityRef::new("node_type", 7)),
        );
        let compiled = compile(&NODE, &query);
        let bound: Vec<_> = compiled
            .bindings()
            .iter()
            .filter(|(name, _)| name.starts_with(":nodeType"))
            .map(|(_, v)| v.clone())
            .collect();
        assert_eq!(bound, vec![Value::Int64(7)]);
    }

    #[test]
    fn test_count_sql_counts_distinct_roots() {
        let query = FindQuery::new(FilterCriteria::new().eq("translation.locale", "en"))
            .with_limit(10)
            .with_offset(20);
        let compiled = compile(&NODE, &query);
        assert!(compiled.count_sql().starts_with("SELECT COUNT(DISTINCT n.id) FROM nodes AS n"));
        assert!(!compiled.count_sql().contains("LIMIT"));
        assert!(compiled.sql().ends_with("LIMIT 10 OFFSET 20"));
    }

    struct RealmListener;

    impl QueryListener for RealmListener {
        fn name(&self) -> &str {
            "realm"
        }

        fn on_build(&self, event: &mut BuildEvent<'_>) -> Result<()> {
            if event.key() == "realm" || event.key() == "visible" {
                let param = event.plan.add_param("visible", Operand::from(true));
                event.plan.add_predicate(Predicate::Raw(format!(
                    "n.visible = {} OR n.parent_id IS NULL",
                    param
                )));
                event.stop_propagation();
            }
            Ok(())
        }

        fn on_apply(&self, event: &mut ApplyEvent<'_>) -> Result<()> {
            if event.key == "nodeName" {
                for slot in event.slots {
                    event.bindings.set(slot.name.clone(), Value::from("overridden"));
                }
                event.stop_propagation();
            }
            Ok(())
        }
    }

    #[test]
    fn test_build_hook_replaces_default_predicate() {
        let hooks = HookBus::new().with_listener(Arc::new(RealmListener));
        let query = FindQuery::new(FilterCriteria::new().eq("visible", false));
        let compiled = QueryCompiler::compile(
            &NODE,
            &query,
            &VisibilityContext::include_all(),
            &hooks,
        )
        .unwrap();
        let sql = compiled.sql();
        assert!(sql.contains("(n.visible = :visible_"));
        assert!(sql.contains(" OR n.parent_id IS NULL)"));
        let visible: Vec<_> = compiled
            .bindings()
            .iter()
            .filter(|(name, _)| name.starts_with(":visible"))
            .map(|(_, v)| v.clone())
            .collect();
        assert_eq!(visible, vec![Value::Bool(true)]);
    }

    #[test]
    fn test_apply_hook_supplies_values() {
        let hooks = HookBus::new().with_listener(Arc::new(RealmListener));
        let query = FindQuery::new(FilterCriteria::new().eq("nodeName", "home"));
        let compiled = QueryCompiler::compile(
            &NODE,
            &query,
            &VisibilityContext::include_all(),
            &hooks,
        )
        .unwrap();
        let bound: Vec<_> = compiled.bindings().iter().map(|(_, v)| v.clone()).collect();
        assert!(bound.contains(&Value::from("overridden")));
        assert!(!bound.contains(&Value::from("home")));
    }

    struct NodeTypeListener;

    impl QueryListener for NodeTypeListener {
        fn name(&self) -> &str {
            "node-type"
        }

        fn on_build(&self, event: &mut BuildEvent<'_>) -> Result<()> {
            if event.key() == "nodeType.name" {
                event.stop_propagation();
            }
            Ok(())
        }
    }

    #[test]
    fn test_suppressed_key_adds_no_join() {
        let hooks = HookBus::new().with_listener(Arc::new(NodeTypeListener));
        let query = FindQuery::new(
            FilterCriteria::new()
                .eq("nodeType.name", "page")
                .eq("nodeName", "home"),
        );
        let compiled = QueryCompiler::compile(
            &NODE,
            &query,
            &VisibilityContext::include_all(),
            &hooks,
        )
        .unwrap();
        assert_eq!(compiled.plan().joins.count_for("n", "nodeType"), 0);
        assert!(!compiled.sql().contains("node_types"));
        assert!(compiled.sql().contains("n.node_name = :nodeName_"));
    }

    struct SilentApplyListener;

    impl QueryListener for SilentApplyListener {
        fn name(&self) -> &str {
            "silent"
        }

        fn on_apply(&self, event: &mut ApplyEvent<'_>) -> Result<()> {
            if event.key == "nodeName" {
                event.stop_propagation();
            }
            Ok(())
        }
    }

    #[test]
    fn test_unbound_slot_after_stopped_apply_is_an_error() {
        let hooks = HookBus::new().with_listener(Arc::new(SilentApplyListener));
        let query = FindQuery::new(FilterCriteria::new().eq("nodeName", "home"));
        let err = QueryCompiler::compile(
            &NODE,
            &query,
            &VisibilityContext::include_all(),
            &hooks,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCriterion { ref key, .. } if key == "nodeName"));
    }

    #[test]
    fn test_compile_errors_before_execution() {
        let query = FindQuery::new(FilterCriteria::new().eq("owner.name", "x"));
        let err = QueryCompiler::compile(
            &NODE,
            &query,
            &VisibilityContext::published_only(),
            &HookBus::new(),
        )
        .unwrap_err();
        assert!(err.is_compile_error());
    }

    #[test]
    fn test_mentions_matches_whole_placeholder() {
        assert!(mentions("a = :p_1", ":p_1"));
        assert!(!mentions("a = :p_10", ":p_1"));
    }
}
