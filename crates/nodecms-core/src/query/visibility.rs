//! Status-based visibility gate.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::criteria::Operand;
use super::plan::{ColumnRef, CompareOp, JoinKind, Predicate, QueryPlan};
use crate::catalog::{StatusSource, NODE};
use crate::collaborators::PreviewResolver;
use crate::error::Result;
use crate::model::NodeStatus;

/// Caller-selected status policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Public rendering: published content only.
    #[default]
    PublishedOnly,
    /// Editing: drafts and pending content too.
    IncludeUnpublished,
    /// Maintenance and trash tooling: every status.
    IncludeAllStatuses,
}

impl std::str::FromStr for VisibilityMode {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "published" | "published_only" => Ok(VisibilityMode::PublishedOnly),
            "unpublished" | "include_unpublished" => Ok(VisibilityMode::IncludeUnpublished),
            "all" | "include_all_statuses" => Ok(VisibilityMode::IncludeAllStatuses),
            other => Err(crate::error::Error::invalid_criterion(
                "mode",
                format!("unknown visibility mode '{}'", other),
            )),
        }
    }
}

/// Per-call visibility policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct VisibilityContext {
    pub mode: VisibilityMode,
    pub preview_active: bool,
}

impl VisibilityContext {
    pub fn new(mode: VisibilityMode, preview_active: bool) -> Self {
        Self {
            mode,
            preview_active,
        }
    }

    pub fn published_only() -> Self {
        Self::new(VisibilityMode::PublishedOnly, false)
    }

    pub fn include_unpublished() -> Self {
        Self::new(VisibilityMode::IncludeUnpublished, false)
    }

    pub fn include_all() -> Self {
        Self::new(VisibilityMode::IncludeAllStatuses, false)
    }

    pub fn with_preview(mut self, preview_active: bool) -> Self {
        self.preview_active = preview_active;
        self
    }

    /// Build the context from a preview resolver's answer.
    pub fn from_resolver(mode: VisibilityMode, resolver: &dyn PreviewResolver) -> Self {
        Self::new(mode, resolver.is_preview())
    }

    /// Derive the gate state.
    pub fn gate_state(&self) -> GateState {
        match (self.mode, self.preview_active) {
            (VisibilityMode::IncludeAllStatuses, _) => GateState::Bypass,
            (VisibilityMode::IncludeUnpublished, _) | (_, true) => GateState::Lenient,
            (VisibilityMode::PublishedOnly, false) => GateState::Strict,
        }
    }
}

/// Gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GateState {
    /// No status predicate.
    #[default]
    Bypass,
    /// `status <= Published`.
    Lenient,
    /// `status = Published`.
    Strict,
}

impl GateState {
    fn compare_op(self) -> Option<CompareOp> {
        match self {
            GateState::Bypass => None,
            GateState::Lenient => Some(CompareOp::Lte),
            GateState::Strict => Some(CompareOp::Eq),
        }
    }
}

/// Overlay the status policy on `plan`.
///
/// Must run after business-criteria joins: an existing node join is reused,
/// and when the status lives behind a relation that is not joined yet the
/// gate joins it itself.
pub fn apply_gate(plan: &mut QueryPlan, state: GateState) -> Result<()> {
    plan.gate = state;
    let Some(op) = state.compare_op() else {
        debug!(entity = plan.root.name, "visibility gate bypassed");
        return Ok(());
    };

    let root = plan.root;
    match root.status {
        StatusSource::Own { field } => {
            let column = root.field(field).map(|f| f.column).unwrap_or(field);
            let predicate = status_predicate(plan, ColumnRef::new(root.alias, column), op);
            plan.add_predicate(predicate);
        }
        StatusSource::Via { relation } => {
            let reused = plan.joins.find(root.alias, relation).is_some();
            let (alias, target) = plan.join_relation(root.alias, relation, JoinKind::Inner)?;
            debug!(entity = root.name, alias = %alias, reused, "gating through related status");
            let predicate = status_predicate(plan, ColumnRef::new(alias, status_column(target)), op);
            plan.add_predicate(predicate);
        }
        StatusSource::Unmanaged => {
            let gated: Vec<(String, JoinKind)> = plan
                .joins
                .iter()
                .filter(|j| j.target.name == NODE.name)
                .map(|j| (j.alias.clone(), j.kind))
                .collect();
            for (alias, kind) in gated {
                let predicate =
                    status_predicate(plan, ColumnRef::new(alias.clone(), status_column(&NODE)), op);
                match kind {
                    JoinKind::Inner => plan.add_predicate(predicate),
                    JoinKind::Left => {
                        if let Some(join) = plan.joins.get_mut(&alias) {
                            join.conditions.push(predicate);
                        }
                    }
                }
            }
        }
    }
    debug!(entity = root.name, gate = ?state, "visibility gate applied");
    Ok(())
}

fn status_column(descriptor: &crate::catalog::EntityDescriptor) -> &'static str {
    match descriptor.status {
        StatusSource::Own { field } => descriptor.field(field).map(|f| f.column).unwrap_or(field),
        _ => "status",
    }
}

fn status_predicate(plan: &mut QueryPlan, column: ColumnRef, op: CompareOp) -> Predicate {
    let param = plan.add_param("visibility", Operand::from(NodeStatus::Published));
    Predicate::compare(column, op, param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NODE_SOURCE, TAG};

    #[test]
    fn test_gate_state_derivation() {
        assert_eq!(VisibilityContext::published_only().gate_state(), GateState::Strict);
        assert_eq!(
            VisibilityContext::published_only().with_preview(true).gate_state(),
            GateState::Lenient
        );
        assert_eq!(
            VisibilityContext::include_unpublished().gate_state(),
            GateState::Lenient
        );
        assert_eq!(
            VisibilityContext::include_all().with_preview(true).gate_state(),
            GateState::Bypass
        );
    }

    #[test]
    fn test_own_status() {
        let mut plan = QueryPlan::new(&NODE);
        apply_gate(&mut plan, GateState::Strict).unwrap();
        assert!(plan.to_sql().contains("WHERE n.status = :visibility_0"));
        assert_eq!(plan.params[0].operand, Operand::from(NodeStatus::Published));
    }

    #[test]
    fn test_via_relation_creates_missing_join() {
        let mut plan = QueryPlan::new(&NODE_SOURCE);
        apply_gate(&mut plan, GateState::Lenient).unwrap();
        assert_eq!(plan.joins.count_for("ns", "node"), 1);
        assert!(plan.to_sql().contains("WHERE n.status <= :visibility_0"));
    }

    #[test]
    fn test_via_relation_reuses_existing_join() {
        let mut plan = QueryPlan::new(&NODE_SOURCE);
        plan.resolve_column("node.nodeName", JoinKind::Inner).unwrap();
        apply_gate(&mut plan, GateState::Strict).unwrap();
        assert_eq!(plan.joins.count_for("ns", "node"), 1);
    }

    #[test]
    fn test_bypass_adds_nothing() {
        let mut plan = QueryPlan::new(&NODE);
        apply_gate(&mut plan, GateState::Bypass).unwrap();
        assert!(plan.predicates.is_empty());
        assert!(plan.params.is_empty());
    }

    #[test]
    fn test_unmanaged_gates_node_joins() {
        let mut plan = QueryPlan::new(&TAG);
        apply_gate(&mut plan, GateState::Strict).unwrap();
        assert!(plan.predicates.is_empty());

        let mut plan = QueryPlan::new(&TAG);
        plan.resolve_column("nodes.nodeName", JoinKind::Inner).unwrap();
        apply_gate(&mut plan, GateState::Strict).unwrap();
        assert!(plan.to_sql().contains("WHERE n.status = :visibility_0"));
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(
            "include-unpublished".parse::<VisibilityMode>().unwrap(),
            VisibilityMode::IncludeUnpublished
        );
        assert_eq!("all".parse::<VisibilityMode>().unwrap(), VisibilityMode::IncludeAllStatuses);
        assert!("secret".parse::<VisibilityMode>().is_err());
    }
}
