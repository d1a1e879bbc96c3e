//! CLI argument parsing and configuration mapping.
//!
//! Grounded on `svql_cli::args::Args`: a `clap` derive struct with a
//! `to_config()`-style mapping method, here split across an ingest and a
//! query subcommand.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args as ClapArgs, Parser, Subcommand};
use skg_common::UserId;
use skg_pipeline::IngestConfig;

/// The simplicial knowledge graph core's command-line front end.
#[derive(Parser, Debug)]
#[command(name = "skg")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Raises the tracing filter to `debug` regardless of `RUST_LOG`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest an activity history file into the knowledge graph.
    Ingest(IngestArgs),
    /// Query the knowledge graph and print formatted context.
    Query(QueryArgs),
}

/// Arguments for `skg ingest`.
#[derive(ClapArgs, Debug)]
pub struct IngestArgs {
    /// Path to the activity JSON array.
    #[arg(default_value = "activities.json")]
    pub input: PathBuf,

    /// Path to the SQLite database file.
    #[arg(long, default_value = "knowledge_graph.db")]
    pub db: String,

    /// Path to the checkpoint file.
    #[arg(long, default_value = "checkpoint.json")]
    pub checkpoint: PathBuf,

    /// Tenant partition key.
    #[arg(long, default_value_t = 1)]
    pub user_id: UserId,

    /// Cap on the number of entries to process.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Temporal witness window, in minutes.
    #[arg(long, default_value_t = 30)]
    pub window: i64,

    /// Delay between extractor calls, in seconds (rate limiting).
    #[arg(long, default_value_t = 0.1)]
    pub delay: f64,

    /// Ignore any existing checkpoint and start fresh.
    #[arg(long, default_value_t = false)]
    pub no_resume: bool,

    /// Use the deterministic offline mock extractor instead of a live
    /// backend. No live extractor ships in this workspace, so this flag is
    /// currently the only way to run ingestion end-to-end.
    #[arg(long, default_value_t = false)]
    pub mock_extractor: bool,

    /// Name of the environment variable carrying the extractor API key,
    /// checked at startup even though no live backend consumes it yet.
    #[arg(long, default_value = "SKG_EXTRACTOR_API_KEY")]
    pub api_key_var: String,
}

impl IngestArgs {
    /// Converts parsed arguments into an [`IngestConfig`].
    #[must_use]
    pub fn to_config(&self) -> IngestConfig {
        IngestConfig {
            input_path: self.input.clone(),
            db_path: self.db.clone(),
            checkpoint_path: self.checkpoint.clone(),
            user_id: self.user_id,
            limit: self.limit,
            window_minutes: self.window,
            delay: Duration::from_secs_f64(self.delay.max(0.0)),
            resume: !self.no_resume,
        }
    }
}

/// Arguments for `skg query`.
#[derive(ClapArgs, Debug)]
pub struct QueryArgs {
    /// The natural-language query text.
    pub query: String,

    /// Path to the SQLite database file.
    #[arg(long, default_value = "knowledge_graph.db")]
    pub db: String,

    /// Tenant partition key.
    #[arg(long, default_value_t = 1)]
    pub user_id: UserId,

    /// Maximum number of vertices to match.
    #[arg(long, default_value_t = 10)]
    pub top_k: usize,

    /// Minimum cosine similarity for vertex matching.
    #[arg(long, default_value_t = 0.3)]
    pub threshold: f32,

    /// Use the deterministic offline mock extractor instead of a live
    /// backend. See [`IngestArgs::mock_extractor`].
    #[arg(long, default_value_t = false)]
    pub mock_extractor: bool,

    /// Name of the environment variable carrying the extractor API key.
    #[arg(long, default_value = "SKG_EXTRACTOR_API_KEY")]
    pub api_key_var: String,
}
