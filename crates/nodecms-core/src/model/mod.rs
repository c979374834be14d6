//! Content entities and the scalar types they are built from.

mod document;
mod node;
pub mod status;
mod taxonomy;
mod translation;
pub mod value;

use std::fmt;

use rusqlite::Row;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::EntityDescriptor;

pub use document::{Document, DocumentTranslation};
pub use node::{ContentNode, NodeType};
pub use status::NodeStatus;
pub use taxonomy::{Folder, FolderTranslation, Tag, TagTranslation};
pub use translation::{LocalizedContent, Translation};
pub use value::Value;

/// A persisted entity with a static descriptor.
///
/// Rows are hydrated by column name, so the select list order produced by
/// the compiler does not matter to implementors.
pub trait Entity: Sized + Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Static descriptor for this entity.
    fn descriptor() -> &'static EntityDescriptor;

    /// Hydrate from a result row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Identity value.
    fn id(&self) -> i64;

    /// Column values for the write side, identity included.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Reference to this entity usable as a criteria operand.
    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::descriptor().name, self.id())
    }
}

/// A reference to a persisted entity, used where criteria name an entity
/// rather than its raw identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity name.
    pub entity: String,
    /// Identity value.
    pub id: i64,
}

impl EntityRef {
    /// Create a new reference.
    pub fn new(entity: impl Into<String>, id: i64) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.id)
    }
}
