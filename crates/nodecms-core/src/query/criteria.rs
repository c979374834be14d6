//! Caller-facing filter, ordering, and query window types.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{EntityRef, NodeStatus, Translation, Value};

/// Keys owned by the tag/folder set filter and the translation resolver.
pub const TAGS_KEY: &str = "tags";
pub const TAG_EXCLUSIVE_KEY: &str = "tagExclusive";
pub const FOLDERS_KEY: &str = "folders";
pub const FOLDER_EXCLUSIVE_KEY: &str = "folderExclusive";
pub const TRANSLATION_KEY: &str = "translation";

/// A single operand: a raw scalar or a reference to an entity.
///
/// Entity references are reduced to their identity at bind time.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Entity(EntityRef),
}

impl Operand {
    /// The scalar bound for this operand.
    pub fn to_value(&self) -> Value {
        match self {
            Operand::Value(v) => v.clone(),
            Operand::Entity(r) => Value::Int64(r.id),
        }
    }

    /// Whether this operand is a null scalar.
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    fn from_json(key: &str, value: &serde_json::Value) -> Result<Self> {
        if let serde_json::Value::Object(map) = value {
            let entity = map.get("entity").and_then(|v| v.as_str());
            let id = map.get("id").and_then(|v| v.as_i64());
            return match (entity, id) {
                (Some(entity), Some(id)) => Ok(Operand::Entity(EntityRef::new(entity, id))),
                _ => Err(Error::invalid_criterion(
                    key,
                    "objects must be entity references {\"entity\", \"id\"}",
                )),
            };
        }
        Value::from_json(value)
            .map(Operand::Value)
            .ok_or_else(|| Error::invalid_criterion(key, format!("unsupported operand {}", value)))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(v) => write!(f, "{}", v),
            Operand::Entity(r) => write!(f, "{}", r),
        }
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<EntityRef> for Operand {
    fn from(r: EntityRef) -> Self {
        Operand::Entity(r)
    }
}

impl From<&Translation> for Operand {
    fn from(t: &Translation) -> Self {
        Operand::Entity(EntityRef::new("translation", t.id))
    }
}

impl From<NodeStatus> for Operand {
    fn from(s: NodeStatus) -> Self {
        Operand::Value(s.into())
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Value(Value::Int64(v))
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Value(Value::Int64(v as i64))
    }
}

impl From<f64> for Operand {
    fn from(v: f64) -> Self {
        Operand::Value(Value::Float64(v))
    }
}

impl From<bool> for Operand {
    fn from(v: bool) -> Self {
        Operand::Value(Value::Bool(v))
    }
}

impl From<&str> for Operand {
    fn from(v: &str) -> Self {
        Operand::Value(Value::String(v.to_string()))
    }
}

impl From<String> for Operand {
    fn from(v: String) -> Self {
        Operand::Value(Value::String(v))
    }
}

/// Filter operators.
///
/// `IsNull` and `IsNotNull` carry no operand and are produced from a null
/// scalar and from the `NOT NULL` literal respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    Between,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    /// Parse an operator keyword as found at the head of an operator tuple.
    pub fn parse(keyword: &str) -> Option<Self> {
        let normalized = keyword.trim().to_ascii_uppercase();
        let op = match normalized.as_str() {
            "=" | "==" => Operator::Eq,
            "!=" | "<>" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Lte,
            ">" => Operator::Gt,
            ">=" => Operator::Gte,
            "BETWEEN" => Operator::Between,
            "LIKE" => Operator::Like,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            _ => return None,
        };
        Some(op)
    }

    /// Required operand count, `None` for list operators.
    pub fn arity(self) -> Option<usize> {
        match self {
            Operator::IsNull | Operator::IsNotNull => Some(0),
            Operator::Between => Some(2),
            Operator::In | Operator::NotIn => None,
            _ => Some(1),
        }
    }

    /// SQL keyword or symbol.
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Between => "BETWEEN",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Raw value attached to a criteria key.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Equality, or `IS NULL` for a null scalar.
    Value(Operand),
    /// Implicit `IN`.
    List(Vec<Operand>),
    /// Operator tuple, validated during normalization.
    Tuple {
        operator: String,
        operands: Vec<Operand>,
    },
    /// The `NOT NULL` literal.
    NotNull,
}

/// Free-form filter map, iterated in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterCriteria {
    entries: BTreeMap<String, Criterion>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a raw criterion, replacing any previous one for `key`.
    pub fn insert(mut self, key: impl Into<String>, criterion: Criterion) -> Self {
        self.entries.insert(key.into(), criterion);
        self
    }

    /// `key = value` (`IS NULL` when the value is null).
    pub fn eq(self, key: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.insert(key, Criterion::Value(value.into()))
    }

    /// `key IS NULL`.
    pub fn is_null(self, key: impl Into<String>) -> Self {
        self.insert(key, Criterion::Value(Operand::Value(Value::Null)))
    }

    /// `key IN (values)`.
    pub fn any_of<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.insert(key, Criterion::List(values.into_iter().map(Into::into).collect()))
    }

    /// Single-operand operator tuple (`<=`, `>`, `LIKE`, ...).
    pub fn op(self, key: impl Into<String>, operator: &str, value: impl Into<Operand>) -> Self {
        self.insert(
            key,
            Criterion::Tuple {
                operator: operator.to_string(),
                operands: vec![value.into()],
            },
        )
    }

    /// Inclusive range.
    pub fn between(
        self,
        key: impl Into<String>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        self.insert(
            key,
            Criterion::Tuple {
                operator: "BETWEEN".to_string(),
                operands: vec![low.into(), high.into()],
            },
        )
    }

    /// `LIKE` with caller-supplied wildcards.
    pub fn like(self, key: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.op(key, "LIKE", pattern.into())
    }

    /// `key NOT IN (values)`.
    pub fn not_in<I, V>(self, key: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.insert(
            key,
            Criterion::Tuple {
                operator: "NOT IN".to_string(),
                operands: values.into_iter().map(Into::into).collect(),
            },
        )
    }

    /// `key IS NOT NULL`.
    pub fn not_null(self, key: impl Into<String>) -> Self {
        self.insert(key, Criterion::NotNull)
    }

    /// Tag membership, ANY-of by default, ALL-of when `exclusive`.
    pub fn tags<I, V>(self, tags: I, exclusive: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.any_of(TAGS_KEY, tags).eq(TAG_EXCLUSIVE_KEY, exclusive)
    }

    /// Folder membership, ANY-of by default, ALL-of when `exclusive`.
    pub fn folders<I, V>(self, folders: I, exclusive: bool) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Operand>,
    {
        self.any_of(FOLDERS_KEY, folders)
            .eq(FOLDER_EXCLUSIVE_KEY, exclusive)
    }

    /// Constrain to one translation (id or entity reference).
    pub fn translation(self, translation: impl Into<Operand>) -> Self {
        self.eq(TRANSLATION_KEY, translation)
    }

    pub fn get(&self, key: &str) -> Option<&Criterion> {
        self.entries.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Criterion> {
        self.entries.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Criterion)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a JSON object.
    ///
    /// Arrays whose first element is an operator keyword are operator
    /// tuples (nested arrays in the tail are flattened, so both
    /// `["NOT IN", [1, 2]]` and `["BETWEEN", 1, 5]` work); other arrays are
    /// implicit `IN` lists. The string `"NOT NULL"` is the not-null literal
    /// and `{"entity": .., "id": ..}` objects are entity references.
    ///
    /// Keywords match case-insensitively, so a list of strings that starts
    /// with one (`["like", "x"]`) is read as a tuple. Spell such lists as
    /// `["IN", ["like", "x"]]` to match the strings literally.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::invalid_criterion("<criteria>", "expected a JSON object"))?;

        let mut criteria = FilterCriteria::new();
        for (key, raw) in object {
            let criterion = match raw {
                serde_json::Value::String(s) if s.trim().eq_ignore_ascii_case("NOT NULL") => {
                    Criterion::NotNull
                }
                serde_json::Value::Array(items) => Self::array_from_json(key, items)?,
                other => Criterion::Value(Operand::from_json(key, other)?),
            };
            criteria.entries.insert(key.clone(), criterion);
        }
        Ok(criteria)
    }

    fn array_from_json(key: &str, items: &[serde_json::Value]) -> Result<Criterion> {
        let head = items.first().and_then(|v| v.as_str());
        if let Some(operator) = head.filter(|h| Operator::parse(h).is_some()) {
            let mut operands = Vec::new();
            for item in &items[1..] {
                match item {
                    serde_json::Value::Array(nested) => {
                        for value in nested {
                            operands.push(Operand::from_json(key, value)?);
                        }
                    }
                    other => operands.push(Operand::from_json(key, other)?),
                }
            }
            return Ok(Criterion::Tuple {
                operator: operator.to_string(),
                operands,
            });
        }

        let operands = items
            .iter()
            .map(|item| Operand::from_json(key, item))
            .collect::<Result<Vec<_>>>()?;
        Ok(Criterion::List(operands))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl FromStr for OrderDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(OrderDirection::Asc),
            "desc" | "descending" => Ok(OrderDirection::Desc),
            other => Err(Error::invalid_criterion(
                "order",
                format!("unknown direction '{}'", other),
            )),
        }
    }
}

/// Ordered list of (field path, direction) pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBy {
    entries: Vec<(String, OrderDirection)>,
}

impl OrderBy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asc(mut self, path: impl Into<String>) -> Self {
        self.entries.push((path.into(), OrderDirection::Asc));
        self
    }

    pub fn desc(mut self, path: impl Into<String>) -> Self {
        self.entries.push((path.into(), OrderDirection::Desc));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, OrderDirection)> {
        self.entries.iter().map(|(p, d)| (p.as_str(), *d))
    }

    /// Parse `path[:asc|desc]` items separated by commas.
    pub fn parse(spec: &str) -> Result<Self> {
        let mut order = OrderBy::new();
        for item in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (path, direction) = match item.split_once(':') {
                Some((path, dir)) => (path.trim(), dir.parse()?),
                None => (item, OrderDirection::Asc),
            };
            order.entries.push((path.to_string(), direction));
        }
        Ok(order)
    }
}

/// Everything a caller supplies for one repository call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindQuery {
    pub criteria: FilterCriteria,
    pub order: OrderBy,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Explicit translation id.
    pub translation: Option<i64>,
    /// Search-by-pattern text.
    pub search: Option<String>,
    /// Slug or primary name matched against identifier columns.
    pub identifier: Option<String>,
    /// Root ids the result must fall within, on top of `criteria`.
    pub within_ids: Option<Vec<i64>>,
    /// Opt into result caching.
    pub cached: bool,
    /// TTL overriding the repository default when cached.
    pub cache_ttl: Option<Duration>,
}

impl FindQuery {
    pub fn new(criteria: FilterCriteria) -> Self {
        Self {
            criteria,
            ..Default::default()
        }
    }

    pub fn with_order(mut self, order: OrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_translation(mut self, translation: &Translation) -> Self {
        self.translation = Some(translation.id);
        self
    }

    pub fn with_translation_id(mut self, translation_id: i64) -> Self {
        self.translation = Some(translation_id);
        self
    }

    pub fn with_search(mut self, pattern: impl Into<String>) -> Self {
        self.search = Some(pattern.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Restrict results to `ids` without touching any `id` criterion.
    pub fn within_ids(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.within_ids = Some(ids.into_iter().collect());
        self
    }

    /// Cache the result with the repository's default TTL.
    pub fn with_cache(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Cache the result for `ttl`.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cached = true;
        self.cache_ttl = Some(ttl);
        self
    }

    /// Both limit and offset supplied.
    pub fn is_bounded(&self) -> bool {
        self.limit.is_some() && self.offset.is_some()
    }
}
