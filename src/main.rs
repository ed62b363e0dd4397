//! # Semantic Recall CLI (`recall`)
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and run schema migrations |
//! | `recall store` | Store an analysis and embed its source text |
//! | `recall search "<query>"` | Rank stored analyses by similarity |
//! | `recall context "<text>"` | Print past analyses of a project/category |
//! | `recall get <id>` | Print one stored analysis |
//! | `recall embed pending` | Backfill missing or stale embeddings |
//! | `recall embed rebuild` | Delete and regenerate all embeddings |
//! | `recall stats` | Record and embedding counts |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use semantic_recall::search::SearchArgs;
use semantic_recall::{config, embed_cmd, get, migrate, search, stats, store_cmd, NewAnalysis};

/// Semantic Recall: local embedding and similarity search over analysis
/// records.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recall.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Semantic Recall: local embedding and similarity search over analysis records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Store an analysis result and embed its source text.
    ///
    /// The record is kept even if no model is available; embed it later with
    /// `recall embed pending`.
    Store {
        #[arg(long)]
        recording: String,

        #[arg(long)]
        project: String,

        /// Analysis category (sentiment, financial, risk, competitive,
        /// summary, themes, or any custom name).
        #[arg(long)]
        category: String,

        /// Generated analysis text.
        #[arg(long)]
        content: String,

        /// Source text the analysis was produced from. This is what gets embedded.
        #[arg(long)]
        text: String,

        /// Reuse an id; storing an id that already exists changes nothing.
        #[arg(long)]
        id: Option<i64>,

        #[arg(long)]
        confidence: Option<f64>,

        #[arg(long)]
        processing_time_ms: Option<i64>,
    },

    /// Rank stored analyses by similarity to a query.
    Search {
        query: String,

        #[arg(long)]
        project: Option<String>,

        /// Restrict to these categories (repeatable or comma-separated).
        #[arg(long = "category", value_delimiter = ',')]
        categories: Vec<String>,

        /// Only analyses created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// Only analyses created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Maximum number of results (defaults to `search.default_top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Drop results scoring below this (defaults to `search.min_score`).
        #[arg(long)]
        min_score: Option<f32>,

        #[arg(long)]
        json: bool,
    },

    /// Print similar past analyses of one project and category.
    Context {
        text: String,

        #[arg(long)]
        project: String,

        #[arg(long)]
        category: String,

        /// Maximum analyses to include (defaults to `search.context_size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Retrieve an analysis by id.
    Get {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Manage embedding vectors.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Show record and embedding counts.
    Stats,
}

#[derive(Subcommand)]
enum EmbedAction {
    /// Embed records with no embedding from the configured model.
    Pending {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete every embedding and re-embed all records.
    Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Store {
            recording,
            project,
            category,
            content,
            text,
            id,
            confidence,
            processing_time_ms,
        } => {
            let mut new = NewAnalysis::new(recording, project, category.as_str(), content, text);
            new.id = id;
            new.confidence_score = confidence;
            new.processing_time_ms = processing_time_ms;
            store_cmd::run_store(&cfg, new).await?;
        }
        Commands::Search {
            query,
            project,
            categories,
            since,
            until,
            limit,
            min_score,
            json,
        } => {
            let args = SearchArgs {
                project,
                categories,
                since,
                until,
                limit,
                min_score,
                json,
            };
            search::run_search(&cfg, &query, args).await?;
        }
        Commands::Context {
            text,
            project,
            category,
            size,
        } => {
            search::run_context(&cfg, &text, &project, &category, size).await?;
        }
        Commands::Get { id, json } => {
            get::run_get(&cfg, id, json).await?;
        }
        Commands::Embed { action } => match action {
            EmbedAction::Pending { limit } => {
                embed_cmd::run_embed_pending(&cfg, limit).await?;
            }
            EmbedAction::Rebuild => {
                embed_cmd::run_embed_rebuild(&cfg).await?;
            }
        },
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
