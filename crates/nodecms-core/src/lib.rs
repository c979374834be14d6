//! nodecms core - criteria compiler, visibility gate, and content repositories.
//!
//! This crate turns free-form filter maps into deduplicated, parameterized
//! SQL over the content tables, overlays the publication status policy, and
//! runs the result as a list, a page, or a streaming cursor.

pub mod cache;
pub mod catalog;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod model;
pub mod persistence;
pub mod query;
pub mod repository;
pub mod store;

pub use cache::{CacheStats, ResultCache};
pub use catalog::{EntityDescriptor, FieldDescriptor, FieldKind, RelationDescriptor, RelationShape};
pub use collaborators::{
    CacheProvider, PreviewResolver, SearchHit, SearchParams, SearchProvider, StaticPreview,
};
pub use config::RepositoryConfig;
pub use error::{Error, Result};
pub use model::{
    ContentNode, Document, DocumentTranslation, Entity, EntityRef, Folder, FolderTranslation,
    LocalizedContent, NodeStatus, NodeType, Tag, TagTranslation, Translation, Value,
};
pub use persistence::{FlushSummary, IdentityMap, PersistenceManager, UnitOfWork};
pub use query::{
    CompiledQuery, Cursor, FilterCriteria, FindQuery, HookBus, OrderBy, OrderDirection,
    Paginator, QueryCompiler, QueryListener, VisibilityContext, VisibilityMode,
};
pub use repository::{
    DocumentRepository, FolderRepository, LocaleCache, NodeRepository, NodeSourceRepository,
    Repository, TagRepository, TranslationRepository,
};
pub use store::Database;
