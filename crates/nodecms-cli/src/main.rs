//! nodecms command-line tooling.
//!
//! Thin console commands over the content repositories: schema bootstrap,
//! find/count/search/stream over any content entity, workflow transitions
//! and trash purging.

mod commands;
mod formatter;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use nodecms_core::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_CACHE_TTL_SECS, DEFAULT_DETACH_EVERY, DEFAULT_MAX_PAGE_SIZE,
};
use nodecms_core::{NodeStatus, RepositoryConfig, VisibilityMode};

use formatter::OutputFormat;

/// nodecms content tooling
#[derive(Parser, Debug)]
#[command(name = "nodecms")]
#[command(version, about = "nodecms content repository tooling", long_about = None)]
pub struct Args {
    /// Path to the SQLite database file.
    #[arg(short, long, default_value = "./nodecms.db")]
    pub database: PathBuf,

    /// Rows per streaming batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Detach streamed entities every N batches.
    #[arg(long, default_value_t = DEFAULT_DETACH_EVERY)]
    pub detach_every: usize,

    /// Largest page size honoured; larger limits are clamped.
    #[arg(long, default_value_t = DEFAULT_MAX_PAGE_SIZE)]
    pub max_page_size: usize,

    /// Result cache TTL in seconds. Set to 0 to disable caching.
    #[arg(long, default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl: u64,

    /// Output format
    #[arg(long, default_value = "table", value_enum)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    /// Convert command-line arguments to repository configuration.
    pub fn into_config(&self) -> RepositoryConfig {
        RepositoryConfig::default()
            .with_batch_size(self.batch_size)
            .with_detach_every(self.detach_every)
            .with_max_page_size(self.max_page_size)
            .with_cache_enabled(self.cache_ttl > 0)
            .with_cache_ttl(Duration::from_secs(self.cache_ttl))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create any missing tables and indexes.
    Init,
    /// List matching entities.
    Find(QueryArgs),
    /// One page of matching entities with the total count.
    Page(QueryArgs),
    /// Count matching entities.
    Count(QueryArgs),
    /// Case-insensitive substring search over searchable columns.
    Search {
        /// Text to look for.
        pattern: String,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Stream matching entities batch by batch.
    Stream(QueryArgs),
    /// Move a node through the publication workflow.
    Transition {
        /// Node id.
        id: i64,
        /// Target status (name or code).
        status: NodeStatus,
    },
    /// Permanently remove deleted nodes.
    Purge,
}

/// Content entity a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntityKind {
    Node,
    NodeSource,
    Document,
    Tag,
    Folder,
    Translation,
}

/// Criteria, ordering, window and visibility shared by query commands.
#[derive(ClapArgs, Debug, Clone)]
pub struct QueryArgs {
    /// Entity to query.
    #[arg(short, long, value_enum, default_value = "node")]
    pub entity: EntityKind,

    /// Filter criteria as a JSON object.
    #[arg(short, long)]
    pub criteria: Option<String>,

    /// Ordering, e.g. `position,nodeName:desc`.
    #[arg(short, long)]
    pub order: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub offset: Option<usize>,

    /// Visibility mode: published, unpublished or all.
    #[arg(short, long, default_value = "published")]
    pub mode: VisibilityMode,

    /// Treat the request as a preview.
    #[arg(long)]
    pub preview: bool,

    /// Restrict to one translation by locale.
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Cache this query's result.
    #[arg(long)]
    pub cached: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nodecms=info,nodecms_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match commands::run(args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_config() {
        let args = Args::parse_from([
            "nodecms",
            "--batch-size",
            "25",
            "--max-page-size",
            "50",
            "--cache-ttl",
            "0",
            "count",
        ]);
        let config = args.into_config();
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.max_page_size, 50);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_query_args() {
        let args = Args::parse_from([
            "nodecms",
            "search",
            "news",
            "--entity",
            "node-source",
            "--mode",
            "all",
            "--locale",
            "fr",
        ]);
        match args.command {
            Command::Search { pattern, query } => {
                assert_eq!(pattern, "news");
                assert_eq!(query.entity, EntityKind::NodeSource);
                assert_eq!(query.mode, VisibilityMode::IncludeAllStatuses);
                assert_eq!(query.locale.as_deref(), Some("fr"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_transition_status_parses_names_and_codes() {
        let args = Args::parse_from(["nodecms", "transition", "4", "published"]);
        assert!(matches!(
            args.command,
            Command::Transition { id: 4, status: NodeStatus::Published }
        ));
        let args = Args::parse_from(["nodecms", "transition", "4", "50"]);
        assert!(matches!(
            args.command,
            Command::Transition { status: NodeStatus::Deleted, .. }
        ));
    }
}
