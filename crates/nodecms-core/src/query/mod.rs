//! Criteria-to-query compilation and execution.
//!
//! Pipeline: [`normalizer`] validates the criteria map, [`translation`]
//! picks the locale join strategy, [`set_filter`] adds tag/folder
//! membership joins, the [`join`] planner resolves every dotted path against
//! one shared registry, [`visibility`] overlays the status gate, [`hooks`]
//! listeners get a chance to reshape each key, [`compiler`] emits the
//! default predicates and binds parameters, and [`executor`] runs the result
//! as a page or a streaming cursor.

pub mod compiler;
pub mod criteria;
pub mod executor;
pub mod hooks;
pub mod join;
pub mod normalizer;
pub mod plan;
pub mod search;
pub mod set_filter;
pub mod translation;
pub mod visibility;

pub use compiler::{Bindings, CompiledQuery, QueryCompiler};
pub use criteria::{Criterion, FilterCriteria, FindQuery, Operand, Operator, OrderBy, OrderDirection};
pub use executor::{Cursor, Paginator};
pub use hooks::{ApplyEvent, BuildEvent, HookBus, QueryListener};
pub use normalizer::{NormalizedCriteria, NormalizedFilter};
pub use plan::{ColumnRef, CompareOp, Join, JoinKind, JoinRegistry, ParamSlot, Predicate, QueryPlan};
pub use translation::TranslationStrategy;
pub use visibility::{GateState, VisibilityContext, VisibilityMode};
