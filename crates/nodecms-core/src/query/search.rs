//! Search-by-pattern and identifier lookups.

use super::criteria::Operand;
use super::plan::{ColumnRef, CompareOp, JoinKind, Predicate, QueryPlan};
use crate::error::Result;

/// AND one OR-chain of case-insensitive substring matches over the root's
/// searchable columns and, when the localized projection is joined, over
/// its searchable columns too.
pub fn apply_search(plan: &mut QueryPlan, pattern: &str) -> Result<()> {
    let needle = pattern.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(());
    }

    let mut columns: Vec<ColumnRef> = plan
        .root
        .searchable_fields()
        .map(|f| ColumnRef::new(plan.root.alias, f.column))
        .collect();
    if let Some(localized) = plan.root.localized {
        if let Some(join) = plan.joins.find(plan.root.alias, localized.relation) {
            columns.extend(
                join.target
                    .searchable_fields()
                    .map(|f| ColumnRef::new(join.alias.clone(), f.column)),
            );
        }
    }

    if columns.is_empty() {
        plan.add_predicate(Predicate::AlwaysFalse);
        return Ok(());
    }

    let param = plan.add_param("search", Operand::from(format!("%{}%", needle)));
    let chain = columns
        .into_iter()
        .map(|column| Predicate::Like {
            column,
            param: param.clone(),
            case_insensitive: true,
        })
        .collect();
    plan.add_predicate(Predicate::Or(chain));
    Ok(())
}

/// Match either a slug column or the translated primary name.
pub fn apply_identifier(plan: &mut QueryPlan, identifier: &str) -> Result<()> {
    let root = plan.root;
    let mut columns: Vec<ColumnRef> = root
        .identifier_fields
        .iter()
        .filter_map(|name| root.field(name))
        .map(|f| ColumnRef::new(root.alias, f.column))
        .collect();

    if let Some(localized) = root.localized {
        if let Some(name_field) = localized.name_field {
            let (alias, target) = plan.join_relation(root.alias, localized.relation, JoinKind::Left)?;
            if let Some(field) = target.field(name_field) {
                columns.push(ColumnRef::new(alias, field.column));
            }
        }
    }

    if columns.is_empty() {
        plan.add_predicate(Predicate::AlwaysFalse);
        return Ok(());
    }

    let param = plan.add_param("identifier", Operand::from(identifier));
    let chain = columns
        .into_iter()
        .map(|column| Predicate::compare(column, CompareOp::Eq, param.clone()))
        .collect();
    plan.add_predicate(Predicate::Or(chain));
    Ok(())
}
