//! Tag and folder membership filters.

use tracing::debug;

use super::normalizer::SetRequest;
use super::plan::{ColumnRef, CompareOp, JoinKind, Predicate, QueryPlan};
use crate::error::Result;

/// Add the joins and predicates for one membership request.
///
/// ANY-of uses one shared join constrained with `IN`; ALL-of adds one
/// uniquely aliased inner join per requested member, each pinned to that
/// member. An empty member list adds nothing.
pub fn apply_set_filter(plan: &mut QueryPlan, request: &SetRequest) -> Result<()> {
    if request.members.is_empty() {
        debug!(key = request.key, "empty membership set, filter skipped");
        return Ok(());
    }

    let segments: Vec<&str> = request.path.split('.').collect();
    let Some((set_relation, prefix)) = segments.split_last() else {
        return Ok(());
    };
    let (parent, _) = plan.join_path(prefix, JoinKind::Inner)?;

    if !request.exclusive {
        let (alias, target) = plan.join_relation(&parent, set_relation, JoinKind::Inner)?;
        let params = request
            .members
            .iter()
            .map(|member| plan.add_param(request.key, member.clone()))
            .collect();
        plan.add_predicate(Predicate::In {
            column: ColumnRef::new(alias, target.identity),
            params,
        });
        return Ok(());
    }

    let mut seen = Vec::with_capacity(request.members.len());
    for (index, member) in request.members.iter().enumerate() {
        if seen.contains(&member) {
            debug!(key = request.key, %member, "duplicate member in exclusive set");
        }
        seen.push(member);

        let alias = plan.join_unique(&parent, set_relation, JoinKind::Inner, index, Vec::new())?;
        let param = plan.add_param(request.key, member.clone());
        if let Some(join) = plan.joins.get_mut(&alias) {
            let identity = join.target.identity;
            join.conditions.push(Predicate::compare(
                ColumnRef::new(alias.clone(), identity),
                CompareOp::Eq,
                param,
            ));
        }
    }
    Ok(())
}
