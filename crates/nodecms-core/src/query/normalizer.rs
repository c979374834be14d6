//! Criteria normalization.
//!
//! Turns a [`FilterCriteria`] map into typed filters, validating paths and
//! operator arity up front so that nothing reaches the database when any
//! part of the map is malformed. Set-filter and translation keys are split
//! off here and never reach the generic filter stream.

use super::criteria::{
    Criterion, FilterCriteria, Operand, Operator, FOLDERS_KEY, FOLDER_EXCLUSIVE_KEY, TAGS_KEY,
    TAG_EXCLUSIVE_KEY, TRANSLATION_KEY,
};
use super::join::{expand_path, resolve_relations};
use crate::catalog::EntityDescriptor;
use crate::error::{Error, Result};
use crate::model::Value;

/// A validated filter: relation path, field, operator, operands.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFilter {
    /// Criteria key as supplied.
    pub key: String,
    /// Relation segments followed by the field name, after expansion.
    pub path: Vec<&'static str>,
    pub operator: Operator,
    pub operands: Vec<Operand>,
}

impl NormalizedFilter {
    /// Relation segments, without the trailing field.
    pub fn relations(&self) -> &[&'static str] {
        &self.path[..self.path.len().saturating_sub(1)]
    }

    /// Trailing field name.
    pub fn field(&self) -> &'static str {
        self.path.last().copied().unwrap_or_default()
    }
}

/// A tag or folder membership request.
#[derive(Debug, Clone, PartialEq)]
pub struct SetRequest {
    /// Criteria key (`tags` or `folders`).
    pub key: &'static str,
    /// Relation path from the root to the set entity.
    pub path: &'static str,
    pub members: Vec<Operand>,
    pub exclusive: bool,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedCriteria {
    pub filters: Vec<NormalizedFilter>,
    pub tags: Option<SetRequest>,
    pub folders: Option<SetRequest>,
    /// Translation named through the `translation` key.
    pub translation: Option<Operand>,
    /// Whether any filter reaches translation fields.
    pub references_translation: bool,
}

/// Normalize `criteria` against `descriptor`.
pub fn normalize(
    descriptor: &'static EntityDescriptor,
    criteria: &FilterCriteria,
) -> Result<NormalizedCriteria> {
    let mut normalized = NormalizedCriteria {
        tags: set_request(descriptor, criteria, TAGS_KEY, TAG_EXCLUSIVE_KEY, descriptor.tag_path)?,
        folders: set_request(
            descriptor,
            criteria,
            FOLDERS_KEY,
            FOLDER_EXCLUSIVE_KEY,
            descriptor.folder_path,
        )?,
        translation: translation_operand(criteria)?,
        ..Default::default()
    };

    for (key, criterion) in criteria.iter() {
        if is_intercepted(key) {
            continue;
        }
        let filter = normalize_one(descriptor, key, criterion)?;
        if touches_translation(descriptor, &filter.path) {
            normalized.references_translation = true;
        }
        normalized.filters.push(filter);
    }
    Ok(normalized)
}

fn is_intercepted(key: &str) -> bool {
    matches!(
        key,
        TAGS_KEY | TAG_EXCLUSIVE_KEY | FOLDERS_KEY | FOLDER_EXCLUSIVE_KEY | TRANSLATION_KEY
    )
}

fn normalize_one(
    descriptor: &'static EntityDescriptor,
    key: &str,
    criterion: &Criterion,
) -> Result<NormalizedFilter> {
    let path = static_path(descriptor, key)?;
    let (operator, operands) = match criterion {
        Criterion::Value(operand) if operand.is_null() => (Operator::IsNull, Vec::new()),
        Criterion::Value(operand) => (Operator::Eq, vec![operand.clone()]),
        Criterion::List(operands) => (Operator::In, operands.clone()),
        Criterion::NotNull => (Operator::IsNotNull, Vec::new()),
        Criterion::Tuple { operator, operands } => {
            let op = Operator::parse(operator).ok_or_else(|| Error::InvalidOperator {
                field: key.to_string(),
                operator: operator.clone(),
            })?;
            tuple_operator(key, op, operands)?
        }
    };

    Ok(NormalizedFilter {
        key: key.to_string(),
        path,
        operator,
        operands,
    })
}

fn tuple_operator(
    key: &str,
    op: Operator,
    operands: &[Operand],
) -> Result<(Operator, Vec<Operand>)> {
    if let Some(expected) = op.arity() {
        if operands.len() != expected {
            return Err(Error::InvalidOperatorArity {
                field: key.to_string(),
                operator: op.as_sql().to_string(),
                expected: format!("exactly {}", expected),
                actual: operands.len(),
            });
        }
    }
    // ["=", null] and ["!=", null] read as null checks.
    let null_operand = operands.len() == 1 && operands[0].is_null();
    let resolved = match op {
        Operator::Eq if null_operand => (Operator::IsNull, Vec::new()),
        Operator::Ne if null_operand => (Operator::IsNotNull, Vec::new()),
        _ => (op, operands.to_vec()),
    };
    Ok(resolved)
}

/// Resolve `key` into static path segments, validating every hop.
fn static_path(descriptor: &'static EntityDescriptor, key: &str) -> Result<Vec<&'static str>> {
    let raw: Vec<&str> = key.split('.').collect();
    if raw.iter().any(|s| s.is_empty()) {
        return Err(Error::invalid_criterion(key, "empty path segment"));
    }
    let expanded = expand_path(descriptor, &raw);
    let (field, relations) = expanded
        .split_last()
        .ok_or_else(|| Error::invalid_criterion(key, "empty key"))?;

    let mut path = Vec::with_capacity(expanded.len());
    let mut current = descriptor;
    for segment in relations {
        let relation = current.relation(segment).ok_or_else(|| Error::UnsupportedPath {
            entity: descriptor.name.to_string(),
            path: key.to_string(),
        })?;
        path.push(relation.name);
        current = resolve_relations(current, &[relation.name], key)?;
    }

    let field = current.field(field).ok_or_else(|| Error::UnknownField {
        entity: current.name.to_string(),
        field: field.to_string(),
    })?;
    path.push(field.name);
    Ok(path)
}

fn touches_translation(descriptor: &EntityDescriptor, path: &[&str]) -> bool {
    if path.len() < 2 {
        return false;
    }
    match descriptor.localized {
        Some(localized) => path
            .windows(2)
            .any(|w| w[0] == localized.relation && w[1] == localized.translation_relation),
        None => path[0] == "translation",
    }
}

fn set_request(
    descriptor: &'static EntityDescriptor,
    criteria: &FilterCriteria,
    key: &'static str,
    exclusive_key: &str,
    path: Option<&'static str>,
) -> Result<Option<SetRequest>> {
    let Some(criterion) = criteria.get(key) else {
        return Ok(None);
    };
    let path = path.ok_or_else(|| Error::UnsupportedPath {
        entity: descriptor.name.to_string(),
        path: key.to_string(),
    })?;
    let members = match criterion {
        Criterion::Value(operand) if operand.is_null() => Vec::new(),
        Criterion::Value(operand) => vec![operand.clone()],
        Criterion::List(operands) => operands.clone(),
        Criterion::Tuple { .. } | Criterion::NotNull => {
            return Err(Error::invalid_criterion(
                key,
                "expected an entity, an id, or a list of them",
            ))
        }
    };
    let exclusive = match criteria.get(exclusive_key) {
        None => false,
        Some(Criterion::Value(Operand::Value(value))) => flag(exclusive_key, value)?,
        Some(_) => return Err(Error::invalid_criterion(exclusive_key, "expected a boolean")),
    };
    Ok(Some(SetRequest {
        key,
        path,
        members,
        exclusive,
    }))
}

fn flag(key: &str, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int64(0) => Ok(false),
        Value::Int64(1) => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(Error::invalid_criterion(
            key,
            format!("expected a boolean, got {}", other.type_name()),
        )),
    }
}

fn translation_operand(criteria: &FilterCriteria) -> Result<Option<Operand>> {
    match criteria.get(TRANSLATION_KEY) {
        None => Ok(None),
        Some(Criterion::Value(operand)) if operand.is_null() => Ok(None),
        Some(Criterion::Value(operand @ Operand::Entity(_)))
        | Some(Criterion::Value(operand @ Operand::Value(Value::Int64(_)))) => {
            Ok(Some(operand.clone()))
        }
        Some(_) => Err(Error::invalid_criterion(
            TRANSLATION_KEY,
            "expected a translation or a translation id",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DOCUMENT, NODE, NODE_SOURCE};
    use crate::model::EntityRef;

    #[test]
    fn test_shapes() {
        let criteria = FilterCriteria::new()
            .eq("nodeName", "home")
            .is_null("parent")
            .any_of("id", [1i64, 2, 3])
            .not_null("nodeType")
            .between("position", 1.0, 4.0);
        let normalized = normalize(&NODE, &criteria).unwrap();
        let ops: Vec<_> = normalized
            .filters
            .iter()
            .map(|f| (f.key.as_str(), f.operator))
            .collect();
        assert_eq!(
            ops,
            vec![
                ("id", Operator::In),
                ("nodeName", Operator::Eq),
                ("nodeType", Operator::IsNotNull),
                ("parent", Operator::IsNull),
                ("position", Operator::Between),
            ]
        );
    }

    #[test]
    fn test_between_arity() {
        let criteria = FilterCriteria::new().insert(
            "position",
            Criterion::Tuple {
                operator: "BETWEEN".into(),
                operands: vec![Operand::from(1i64)],
            },
        );
        let err = normalize(&NODE, &criteria).unwrap_err();
        assert!(matches!(err, Error::InvalidOperatorArity { actual: 1, .. }));
    }

    #[test]
    fn test_unknown_operator() {
        let criteria = FilterCriteria::new().op("position", "~=", 1i64);
        assert!(matches!(
            normalize(&NODE, &criteria).unwrap_err(),
            Error::InvalidOperator { .. }
        ));
    }

    #[test]
    fn test_unsupported_prefix() {
        let criteria = FilterCriteria::new().eq("author.name", "x");
        assert!(matches!(
            normalize(&NODE, &criteria).unwrap_err(),
            Error::UnsupportedPath { .. }
        ));
    }

    #[test]
    fn test_intercepted_keys_leave_generic_stream() {
        let criteria = FilterCriteria::new()
            .tags([EntityRef::new("tag", 1), EntityRef::new("tag", 2)], true)
            .translation(3i64)
            .eq("visible", true);
        let normalized = normalize(&NODE, &criteria).unwrap();
        assert_eq!(normalized.filters.len(), 1);
        let tags = normalized.tags.unwrap();
        assert!(tags.exclusive);
        assert_eq!(tags.members.len(), 2);
        assert_eq!(normalized.translation, Some(Operand::from(3i64)));
    }

    #[test]
    fn test_set_filter_on_entity_without_set() {
        let criteria = FilterCriteria::new().tags([1i64], false);
        assert!(matches!(
            normalize(&DOCUMENT, &criteria).unwrap_err(),
            Error::UnsupportedPath { .. }
        ));
    }

    #[test]
    fn test_translation_reference_detection() {
        let on_node = FilterCriteria::new().eq("translation.locale", "fr");
        let normalized = normalize(&NODE, &on_node).unwrap();
        assert!(normalized.references_translation);
        assert_eq!(
            normalized.filters[0].path,
            vec!["nodeSources", "translation", "locale"]
        );

        let on_source = FilterCriteria::new().eq("translation.locale", "fr");
        assert!(normalize(&NODE_SOURCE, &on_source).unwrap().references_translation);

        let plain = FilterCriteria::new().eq("nodeName", "home");
        assert!(!normalize(&NODE, &plain).unwrap().references_translation);
    }

    #[test]
    fn test_null_tuple_reads_as_null_check() {
        let criteria = FilterCriteria::new().op("parent", "!=", crate::model::Value::Null);
        let normalized = normalize(&NODE, &criteria).unwrap();
        assert_eq!(normalized.filters[0].operator, Operator::IsNotNull);
        assert!(normalized.filters[0].operands.is_empty());
    }
}
