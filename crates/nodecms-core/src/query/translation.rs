//! Locale join strategy, chosen once per query.

use tracing::debug;

use super::criteria::Operand;
use super::plan::{ColumnRef, CompareOp, JoinKind, Predicate, QueryPlan};
use crate::catalog::{RelationShape, TRANSLATION};
use crate::error::Result;
use crate::model::Value;

/// The locale join strategy in effect for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TranslationStrategy {
    /// Inner join on the localized projection, constrained to one
    /// translation bound at `param`.
    Explicit { param: String },
    /// Localized projection and translation joined unconstrained; criteria
    /// filter them.
    Criteria,
    /// Left joins falling back to the default translation.
    DefaultFallback,
    /// Nothing to join.
    #[default]
    None,
}

impl TranslationStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            TranslationStrategy::Explicit { .. } => "explicit",
            TranslationStrategy::Criteria => "criteria",
            TranslationStrategy::DefaultFallback => "default_fallback",
            TranslationStrategy::None => "none",
        }
    }
}

/// Pick and apply the translation strategy.
///
/// Precedence: an explicit translation, then criteria reaching translation
/// fields, then the default-translation fallback.
pub fn apply_translation(
    plan: &mut QueryPlan,
    explicit: Option<Operand>,
    references_translation: bool,
) -> Result<TranslationStrategy> {
    let root = plan.root;
    let root_alias = root.alias;

    let strategy = match (root.localized, explicit) {
        (Some(localized), Some(translation)) => {
            let (alias, target) = plan.join_relation(root_alias, localized.relation, JoinKind::Inner)?;
            let column = translation_column(target, localized.translation_relation);
            let param = plan.add_param("translation", translation);
            if let Some(join) = plan.joins.get_mut(&alias) {
                join.conditions.push(Predicate::compare(
                    ColumnRef::new(alias.clone(), column),
                    CompareOp::Eq,
                    param.clone(),
                ));
            }
            TranslationStrategy::Explicit { param }
        }
        (None, Some(translation)) => match root.relation("translation") {
            Some(_) => {
                let column = translation_column(root, "translation");
                let param = plan.add_param("translation", translation);
                plan.add_predicate(Predicate::compare(
                    ColumnRef::new(root_alias, column),
                    CompareOp::Eq,
                    param.clone(),
                ));
                TranslationStrategy::Explicit { param }
            }
            None => {
                debug!(entity = root.name, "entity is not translated, ignoring translation");
                TranslationStrategy::None
            }
        },
        (Some(localized), None) if references_translation => {
            let (alias, _) = plan.join_relation(root_alias, localized.relation, JoinKind::Inner)?;
            plan.join_relation(&alias, localized.translation_relation, JoinKind::Inner)?;
            TranslationStrategy::Criteria
        }
        (None, None) if references_translation => TranslationStrategy::Criteria,
        (Some(localized), None) => {
            let (alias, _) = plan.join_relation(root_alias, localized.relation, JoinKind::Left)?;
            let (translation_alias, _) =
                plan.join_relation(&alias, localized.translation_relation, JoinKind::Left)?;
            let default_column = TRANSLATION
                .field("isDefault")
                .map(|f| f.column)
                .unwrap_or("is_default");
            let param = plan.add_param("translation.isDefault", Operand::Value(Value::Bool(true)));
            if let Some(join) = plan.joins.get_mut(&translation_alias) {
                join.conditions.push(Predicate::compare(
                    ColumnRef::new(translation_alias.clone(), default_column),
                    CompareOp::Eq,
                    param,
                ));
            }
            TranslationStrategy::DefaultFallback
        }
        (None, None) => TranslationStrategy::None,
    };

    debug!(entity = root.name, strategy = strategy.name(), "translation strategy");
    plan.translation = strategy.clone();
    Ok(strategy)
}

/// Foreign key column pointing at the translation on `owner`.
fn translation_column(owner: &crate::catalog::EntityDescriptor, relation: &str) -> &'static str {
    match owner.relation(relation).map(|r| r.shape) {
        Some(RelationShape::ManyToOne { local_column }) => local_column,
        _ => "translation_id",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{NODE, NODE_SOURCE, NODE_TYPE};

    #[test]
    fn test_explicit_constrains_localized_join() {
        let mut plan = QueryPlan::new(&NODE);
        let strategy = apply_translation(&mut plan, Some(Operand::from(2i64)), true).unwrap();
        assert!(matches!(strategy, TranslationStrategy::Explicit { .. }));
        let sql = plan.to_sql();
        assert!(sql.contains(
            "INNER JOIN node_sources AS ns ON ns.node_id = n.id AND ns.translation_id = :translation_0"
        ));
        assert_eq!(plan.joins.len(), 1);
    }

    #[test]
    fn test_explicit_on_node_source_constrains_root() {
        let mut plan = QueryPlan::new(&NODE_SOURCE);
        apply_translation(&mut plan, Some(Operand::from(2i64)), false).unwrap();
        assert!(plan.joins.is_empty());
        assert!(plan.to_sql().contains("WHERE ns.translation_id = :translation_0"));
    }

    #[test]
    fn test_criteria_strategy_joins_unconstrained() {
        let mut plan = QueryPlan::new(&NODE);
        let strategy = apply_translation(&mut plan, None, true).unwrap();
        assert_eq!(strategy, TranslationStrategy::Criteria);
        let sql = plan.to_sql();
        assert!(sql.contains("INNER JOIN node_sources AS ns ON ns.node_id = n.id"));
        assert!(sql.contains("INNER JOIN translations AS t ON t.id = ns.translation_id"));
        assert!(plan.params.is_empty());
    }

    #[test]
    fn test_default_fallback_uses_left_joins() {
        let mut plan = QueryPlan::new(&NODE);
        let strategy = apply_translation(&mut plan, None, false).unwrap();
        assert_eq!(strategy, TranslationStrategy::DefaultFallback);
        let sql = plan.to_sql();
        assert!(sql.contains("LEFT JOIN node_sources AS ns ON ns.node_id = n.id"));
        assert!(sql.contains(
            "LEFT JOIN translations AS t ON t.id = ns.translation_id AND t.is_default = :translation_isDefault_0"
        ));
    }

    #[test]
    fn test_untranslated_entity() {
        let mut plan = QueryPlan::new(&NODE_TYPE);
        assert_eq!(
            apply_translation(&mut plan, Some(Operand::from(1i64)), false).unwrap(),
            TranslationStrategy::None
        );
        assert!(plan.joins.is_empty());
    }
}
