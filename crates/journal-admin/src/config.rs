//! Command line and environment configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `JOURNAL_DATABASE_URL` | journals.db | SQLite database path, or `:memory:` |
//! | `ELASTICSEARCH_HOSTS` | http://localhost:9200 | Comma-separated node URLs |
//! | `ELASTICSEARCH_USER` | | Basic auth user |
//! | `ELASTICSEARCH_PASSWORD` | | Basic auth password |
//! | `BULK_CHUNKSIZE` | 1000 | Documents per bulk request |
//! | `DEFAULT_JOURNALS_ES_INDEX` | journals-main | Index used when `-i` is omitted |
//! | `JOURNAL_LOG_LEVEL` | info | Log level |

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use helios_journal_search::ResultsOrder;
use helios_journal_search::backends::elasticsearch::{ElasticsearchAuth, ElasticsearchConfig};
use helios_journal_search::sync::SyncScope;

/// Journal search administration.
#[derive(Debug, Clone, Parser)]
#[command(name = "journal-admin")]
#[command(about = "Manage journal search indices")]
pub struct AdminConfig {
    /// SQLite database path, or `:memory:`.
    #[arg(long, env = "JOURNAL_DATABASE_URL", default_value = "journals.db", global = true)]
    pub database_url: String,

    /// Elasticsearch node URLs (comma-separated).
    #[arg(
        long,
        env = "ELASTICSEARCH_HOSTS",
        default_value = "http://localhost:9200",
        global = true
    )]
    pub elasticsearch_hosts: String,

    /// Elasticsearch basic auth user.
    #[arg(long, env = "ELASTICSEARCH_USER", global = true)]
    pub elasticsearch_user: Option<String>,

    /// Elasticsearch basic auth password.
    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true, global = true)]
    pub elasticsearch_password: Option<String>,

    /// Documents per bulk request.
    #[arg(long, env = "BULK_CHUNKSIZE", default_value = "1000", global = true)]
    pub bulk_chunk_size: usize,

    /// Index used when a command's `-i` is omitted.
    #[arg(
        long,
        env = "DEFAULT_JOURNALS_ES_INDEX",
        default_value = "journals-main",
        global = true
    )]
    pub default_index: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "JOURNAL_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Administrative commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Create an index with the journal entry mapping.
    CreateIndex {
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
        /// Drop and recreate the index if it exists.
        #[arg(short, long)]
        force: bool,
    },
    /// Drop an index.
    DropIndex {
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Report whether an index exists.
    IndexExists {
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Count the documents in an index.
    DocsCount {
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Search a journal through an index.
    Search {
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
        #[command(flatten)]
        args: SearchArgs,
    },
    /// Search a journal in the relational store.
    SearchDb {
        #[command(flatten)]
        args: SearchArgs,
    },
    /// Remove indexed documents of one journal, or drop the index for `any`.
    Erase {
        /// Journal id or `any`.
        #[arg(short, long)]
        journal: SyncScope,
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Rebuild indexed documents from the relational store.
    Synchronize {
        /// Journal id or `any`.
        #[arg(short, long)]
        journal: SyncScope,
        /// Index name.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Set or clear a journal's index, then synchronize it.
    SetIndex {
        /// Journal id.
        #[arg(short, long)]
        journal: Uuid,
        /// Index name; omit to stop indexing the journal.
        #[arg(short, long)]
        index: Option<String>,
    },
    /// Check both backends.
    Health,
}

/// Options shared by the search commands.
#[derive(Debug, Clone, Args)]
pub struct SearchArgs {
    /// Journal id.
    #[arg(short, long)]
    pub journal: Uuid,

    /// Query string.
    #[arg(short, long, default_value = "")]
    pub query: String,

    /// Filter, repeatable (e.g. `-f tag:ops -f created_at:>=2024-01-01`).
    #[arg(short, long = "filter")]
    pub filters: Vec<String>,

    /// Use the query verbatim instead of extracting inline filters.
    #[arg(long)]
    pub strict: bool,

    /// Page size.
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: u64,

    /// Offset of the page.
    #[arg(short = 's', long, default_value = "0")]
    pub offset: u64,

    /// Sort direction by creation time (asc or desc).
    #[arg(long, default_value = "desc")]
    pub order: ResultsOrder,

    /// Include entry bodies in results.
    #[arg(long)]
    pub content: bool,
}

impl AdminConfig {
    /// Validates the configuration and returns any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.elasticsearch_nodes().is_empty() {
            errors.push("At least one Elasticsearch host is required".to_string());
        }

        match (&self.elasticsearch_user, &self.elasticsearch_password) {
            (Some(_), None) => {
                errors.push("ELASTICSEARCH_USER is set without ELASTICSEARCH_PASSWORD".to_string())
            }
            (None, Some(_)) => {
                errors.push("ELASTICSEARCH_PASSWORD is set without ELASTICSEARCH_USER".to_string())
            }
            _ => {}
        }

        if self.bulk_chunk_size == 0 {
            errors.push("Bulk chunk size cannot be 0".to_string());
        }

        if self.default_index.trim().is_empty() {
            errors.push("Default index cannot be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Node URLs from `ELASTICSEARCH_HOSTS`.
    pub fn elasticsearch_nodes(&self) -> Vec<String> {
        self.elasticsearch_hosts
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Backend configuration for the index.
    pub fn elasticsearch_config(&self) -> ElasticsearchConfig {
        let auth = match (&self.elasticsearch_user, &self.elasticsearch_password) {
            (Some(username), Some(password)) => Some(ElasticsearchAuth::Basic {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        ElasticsearchConfig {
            nodes: self.elasticsearch_nodes(),
            auth,
            bulk_chunk_size: self.bulk_chunk_size,
            ..Default::default()
        }
    }

    /// The given index, or the default one.
    pub fn index_or_default(&self, index: Option<&str>) -> String {
        index.unwrap_or(&self.default_index).to_string()
    }
}
