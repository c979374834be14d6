//! Command execution against the content repositories.

use std::sync::Arc;

use nodecms_core::query::{FilterCriteria, FindQuery, OrderBy};
use nodecms_core::{
    ContentNode, Database, Document, Entity, Folder, LocalizedContent, NodeRepository, NodeStatus,
    PersistenceManager, Repository, RepositoryConfig, ResultCache, StaticPreview, Tag,
    Translation, TranslationRepository, UnitOfWork, VisibilityContext,
};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, info};

use crate::formatter::{format_count, format_message, format_page, format_rows, OutputFormat};
use crate::{Args, Command, EntityKind, QueryArgs};

/// CLI errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] nodecms_core::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown locale '{0}'")]
    UnknownLocale(String),

    #[error("node {0} not found")]
    NodeNotFound(i64),
}

enum Action<'a> {
    Find,
    Page,
    Count,
    Search(&'a str),
    Stream,
}

struct Session {
    db: Database,
    config: RepositoryConfig,
    cache: Arc<ResultCache>,
    format: OutputFormat,
}

/// Execute the parsed command and return what to print.
pub fn run(args: Args) -> Result<String, CliError> {
    let config = args.into_config();
    let db = Database::open(&args.database, &config)?;
    debug!(database = %args.database.display(), "database opened");

    let session = Session {
        cache: Arc::new(ResultCache::new(config.cache_capacity)),
        db,
        config,
        format: args.format,
    };

    match &args.command {
        Command::Init => {
            session.db.bootstrap()?;
            Ok(format_message(
                session.format,
                &format!("schema ready at {}", args.database.display()),
            ))
        }
        Command::Find(query) => session.dispatch(Action::Find, query),
        Command::Page(query) => session.dispatch(Action::Page, query),
        Command::Count(query) => session.dispatch(Action::Count, query),
        Command::Search { pattern, query } => session.dispatch(Action::Search(pattern), query),
        Command::Stream(query) => session.dispatch(Action::Stream, query),
        Command::Transition { id, status } => session.transition(*id, *status),
        Command::Purge => session.purge(),
    }
}

impl Session {
    fn dispatch(&self, action: Action<'_>, args: &QueryArgs) -> Result<String, CliError> {
        match args.entity {
            EntityKind::Node => self.execute::<ContentNode>(action, args),
            EntityKind::NodeSource => self.execute::<LocalizedContent>(action, args),
            EntityKind::Document => self.execute::<Document>(action, args),
            EntityKind::Tag => self.execute::<Tag>(action, args),
            EntityKind::Folder => self.execute::<Folder>(action, args),
            EntityKind::Translation => self.execute::<Translation>(action, args),
        }
    }

    fn repository<E: Entity>(&self) -> Repository<E> {
        Repository::new(self.db.clone(), self.config.clone()).with_cache(self.cache.clone())
    }

    fn execute<E: Entity>(&self, action: Action<'_>, args: &QueryArgs) -> Result<String, CliError> {
        let repo = self.repository::<E>();
        let query = self.build_query(args)?;
        let visibility = VisibilityContext::from_resolver(args.mode, &StaticPreview(args.preview));
        debug!(
            entity = E::descriptor().name,
            gate = ?visibility.gate_state(),
            "running query"
        );

        let output = match action {
            Action::Find => format_rows(self.format, &to_json(&repo.find(&query, &visibility)?)?),
            Action::Page => {
                let page = repo.paginate(&query, &visibility)?;
                format_page(
                    self.format,
                    &to_json(&page.items)?,
                    page.total,
                    page.page(),
                    page.page_count(),
                )
            }
            Action::Count => format_count(self.format, repo.count(&query, &visibility)?),
            Action::Search(pattern) => format_rows(
                self.format,
                &to_json(&repo.search(pattern, &query, &visibility)?)?,
            ),
            Action::Stream => {
                let mut cursor = repo.stream(&query, &visibility)?;
                for batch in cursor.by_ref() {
                    println!("{}", format_rows(self.format, &to_json(&batch?)?));
                }
                format_message(
                    self.format,
                    &format!("streamed {} row(s) in {} batch(es)", cursor.rows(), cursor.batches()),
                )
            }
        };
        Ok(output)
    }

    fn build_query(&self, args: &QueryArgs) -> Result<FindQuery, CliError> {
        let criteria = match &args.criteria {
            Some(raw) => FilterCriteria::from_json(&serde_json::from_str(raw)?)?,
            None => FilterCriteria::new(),
        };
        let mut query = FindQuery::new(criteria);
        if let Some(order) = &args.order {
            query = query.with_order(OrderBy::parse(order)?);
        }
        if let Some(limit) = args.limit {
            query = query.with_limit(limit);
        }
        if let Some(offset) = args.offset {
            query = query.with_offset(offset);
        }
        if let Some(locale) = &args.locale {
            let translations = TranslationRepository::new(self.db.clone(), self.config.clone());
            let translation = translations
                .find_by_locale(locale)?
                .ok_or_else(|| CliError::UnknownLocale(locale.clone()))?;
            query = query.with_translation(&translation);
        }
        if args.cached {
            query = query.with_cache();
        }
        Ok(query)
    }

    fn nodes(&self) -> NodeRepository {
        NodeRepository::from_repository(self.repository::<ContentNode>())
    }

    fn transition(&self, id: i64, status: NodeStatus) -> Result<String, CliError> {
        let nodes = self.nodes();
        let node = nodes
            .find_by_ids(&[id], &VisibilityContext::include_all())?
            .into_iter()
            .next()
            .ok_or(CliError::NodeNotFound(id))?;

        let mut uow = UnitOfWork::new(self.db.clone())
            .with_subscriber(self.cache.clone())
            .with_identity_map(Arc::clone(nodes.identity_map()));
        let updated = nodes.transition(&node, status, &mut uow)?;
        uow.flush()?;
        info!(node = id, from = %node.status, to = %updated.status, "node transitioned");
        Ok(format_message(
            self.format,
            &format!("node {} is now {}", id, updated.status),
        ))
    }

    fn purge(&self) -> Result<String, CliError> {
        let purged = self.nodes().purge_deleted()?;
        Ok(format_message(self.format, &format!("purged {} node(s)", purged)))
    }
}

fn to_json<E: Entity>(entities: &[E]) -> Result<Vec<JsonValue>, CliError> {
    entities
        .iter()
        .map(|e| serde_json::to_value(e).map_err(CliError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn seed(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("cli.db");
        let db = Database::open(&path, &RepositoryConfig::default()).unwrap();
        let mut uow = UnitOfWork::new(db);
        uow.persist(&Translation::new(1, "en").as_default());
        uow.persist(&ContentNode::new(1, "home").with_status(NodeStatus::Published));
        uow.persist(&ContentNode::new(2, "draft"));
        uow.persist(&LocalizedContent::new(1, 1, 1, "Welcome home"));
        uow.flush().unwrap();
        path
    }

    fn run_args(path: &std::path::Path, rest: &[&str]) -> Result<String, CliError> {
        let mut argv = vec!["nodecms", "--format", "json", "--database"];
        let path = path.to_string_lossy().into_owned();
        argv.push(&path);
        argv.extend_from_slice(rest);
        run(Args::parse_from(argv))
    }

    #[test]
    fn test_count_respects_mode() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        assert_eq!(run_args(&path, &["count"]).unwrap(), r#"{"count":1}"#);
        assert_eq!(
            run_args(&path, &["count", "--mode", "unpublished"]).unwrap(),
            r#"{"count":2}"#
        );
    }

    #[test]
    fn test_find_with_criteria_and_locale() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        let output = run_args(
            &path,
            &["find", "--criteria", r#"{"nodeName": ["LIKE", "ho%"]}"#, "--locale", "en"],
        )
        .unwrap();
        let rows: Vec<JsonValue> = serde_json::from_str(&output).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["node_name"], "home");

        let err = run_args(&path, &["find", "--locale", "it"]).unwrap_err();
        assert!(matches!(err, CliError::UnknownLocale(_)));
    }

    #[test]
    fn test_transition_then_find() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        run_args(&path, &["transition", "2", "published"]).unwrap();
        assert_eq!(run_args(&path, &["count"]).unwrap(), r#"{"count":2}"#);

        let err = run_args(&path, &["transition", "2", "pending"]).unwrap_err();
        assert!(matches!(
            err,
            CliError::Core(nodecms_core::Error::InvalidStatusTransition { .. })
        ));
        assert!(matches!(
            run_args(&path, &["transition", "9", "draft"]).unwrap_err(),
            CliError::NodeNotFound(9)
        ));
    }

    #[test]
    fn test_invalid_criteria_json() {
        let dir = TempDir::new().unwrap();
        let path = seed(&dir);
        let err = run_args(&path, &["find", "--criteria", "{not json"]).unwrap_err();
        assert!(matches!(err, CliError::Json(_)));
    }
}
