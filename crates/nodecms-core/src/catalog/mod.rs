//! Static entity descriptors.
//!
//! Each content entity registers a build-time table of its fields, the
//! relations reachable through dotted criteria paths, and the hooks the
//! compiler needs (localized projection, status source, tag/folder sets).
//! Nothing here is discovered at call time.

mod descriptors;

pub use descriptors::{
    DOCUMENT, DOCUMENT_TRANSLATION, FOLDER, FOLDER_TRANSLATION, NODE, NODE_SOURCE, NODE_TYPE, TAG,
    TAG_TRANSLATION, TRANSLATION,
};

/// Storage kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Integer column.
    Integer,
    /// Real column.
    Float,
    /// Boolean stored as 0/1.
    Boolean,
    /// Short string column.
    String,
    /// Long text column.
    Text,
    /// Unix timestamp (seconds).
    Timestamp,
    /// Foreign key to another entity's identity.
    Reference,
}

impl FieldKind {
    /// Whether the kind holds free text.
    pub fn is_textual(self) -> bool {
        matches!(self, FieldKind::String | FieldKind::Text)
    }

    /// SQL column type used by schema bootstrap.
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldKind::Integer | FieldKind::Boolean | FieldKind::Timestamp | FieldKind::Reference => {
                "INTEGER"
            }
            FieldKind::Float => "REAL",
            FieldKind::String | FieldKind::Text => "TEXT",
        }
    }
}

/// A field of an entity: criteria name, column, and search eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Name used in criteria and ordering.
    pub name: &'static str,
    /// Column in the entity table.
    pub column: &'static str,
    /// Storage kind.
    pub kind: FieldKind,
    /// Included in search-by-pattern.
    pub searchable: bool,
    /// Never searchable, never logged.
    pub sensitive: bool,
}

impl FieldDescriptor {
    /// A non-searchable field.
    pub const fn scalar(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            searchable: false,
            sensitive: false,
        }
    }

    /// A searchable string or text field.
    pub const fn text(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            column,
            kind,
            searchable: true,
            sensitive: false,
        }
    }

    /// A sensitive string field (tokens, secrets).
    pub const fn secret(name: &'static str, column: &'static str) -> Self {
        Self {
            name,
            column,
            kind: FieldKind::String,
            searchable: false,
            sensitive: true,
        }
    }

    /// Whether search-by-pattern may read this column.
    pub fn is_searchable(&self) -> bool {
        self.searchable && !self.sensitive && self.kind.is_textual()
    }
}

/// How a relation is joined from its owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    /// `owner.local_column = target.identity`.
    ManyToOne {
        /// Foreign key column on the owner.
        local_column: &'static str,
    },
    /// `target.remote_column = owner.identity`.
    OneToMany {
        /// Foreign key column on the target.
        remote_column: &'static str,
    },
    /// Through an edge table: `edge.local_column = owner.identity` and
    /// `target.identity = edge.remote_column`.
    ManyToMany {
        /// Join record table.
        edge_table: &'static str,
        /// Edge column pointing at the owner.
        local_column: &'static str,
        /// Edge column pointing at the target.
        remote_column: &'static str,
    },
}

impl RelationShape {
    /// Whether joining this relation can multiply owner rows.
    pub fn is_to_many(&self) -> bool {
        !matches!(self, RelationShape::ManyToOne { .. })
    }
}

/// A named relation reachable through a dotted criteria path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Path segment naming the relation.
    pub name: &'static str,
    /// Target entity name (see [`lookup`]).
    pub target: &'static str,
    /// Preferred alias for the joined target.
    pub alias: &'static str,
    /// Join shape.
    pub shape: RelationShape,
}

/// Localized projection of an entity (its translated content rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalizedDescriptor {
    /// Relation from the entity to its localized rows.
    pub relation: &'static str,
    /// Relation from a localized row to its translation.
    pub translation_relation: &'static str,
    /// Translated primary name, used by identifier lookups.
    pub name_field: Option<&'static str>,
}

/// Where the workflow status of an entity lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// The root entity carries the status column.
    Own {
        /// Status field name.
        field: &'static str,
    },
    /// The status lives on an entity reached through a relation.
    Via {
        /// Relation leading to the status-bearing entity.
        relation: &'static str,
    },
    /// No status; the gate only constrains node joins already present.
    Unmanaged,
}

/// Complete static description of an entity.
#[derive(Debug, PartialEq, Eq)]
pub struct EntityDescriptor {
    /// Entity name used by [`lookup`].
    pub name: &'static str,
    /// Table name.
    pub table: &'static str,
    /// Root alias used when this entity is queried directly.
    pub alias: &'static str,
    /// Identity column.
    pub identity: &'static str,
    /// Field table, in select-list order.
    pub fields: &'static [FieldDescriptor],
    /// Relation graph edges owned by this entity.
    pub relations: &'static [RelationDescriptor],
    /// Localized projection, if the entity is translated.
    pub localized: Option<LocalizedDescriptor>,
    /// Status source for the visibility gate.
    pub status: StatusSource,
    /// Relation path used by the `tags` criterion.
    pub tag_path: Option<&'static str>,
    /// Relation path used by the `folders` criterion.
    pub folder_path: Option<&'static str>,
    /// Slug or primary-name fields used by identifier lookups.
    pub identifier_fields: &'static [&'static str],
}

impl EntityDescriptor {
    /// Find a field by criteria name.
    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Find a relation by path segment.
    pub fn relation(&self, name: &str) -> Option<&'static RelationDescriptor> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Fields eligible for search-by-pattern.
    pub fn searchable_fields(&self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_searchable())
    }

    /// Whether the entity carries or reaches a workflow status.
    pub fn has_status(&self) -> bool {
        !matches!(self.status, StatusSource::Unmanaged)
    }
}

/// All registered descriptors.
pub fn all() -> [&'static EntityDescriptor; 10] {
    [
        &NODE,
        &NODE_TYPE,
        &TRANSLATION,
        &NODE_SOURCE,
        &TAG,
        &TAG_TRANSLATION,
        &FOLDER,
        &FOLDER_TRANSLATION,
        &DOCUMENT,
        &DOCUMENT_TRANSLATION,
    ]
}

/// Resolve a descriptor by entity name.
pub fn lookup(name: &str) -> Option<&'static EntityDescriptor> {
    all().into_iter().find(|d| d.name == name)
}
