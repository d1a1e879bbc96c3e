//! Command-line front end: parses arguments, wires up tracing and
//! interruption handling, and dispatches to the ingest or query pipeline.
//!
//! Grounded on `svql_cli::main`'s init-then-dispatch shape.

mod args;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rusqlite::Connection;
use skg_common::testing::MockExtractor;
use skg_pipeline::{run_ingest, KnowledgeRetriever};
use tracing::info;
use tracing_subscriber::EnvFilter;

use args::{Args, Command, IngestArgs, QueryArgs};

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Ingest(ingest_args) => run_ingest_command(&ingest_args),
        Command::Query(query_args) => run_query_command(&query_args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Resolves an extractor handle for the current process. Only the mock
/// extractor is shipped, so this currently requires `--mock-extractor` and
/// fails closed otherwise rather than silently running against nothing.
fn resolve_extractor(mock_extractor: bool, api_key_var: &str) -> Result<MockExtractor> {
    if !mock_extractor {
        skg_common::config::ExtractorConfig::from_env(api_key_var)
            .context("no live extractor backend is wired into this build")?;
        bail!(
            "no live extractor backend is available; pass --mock-extractor to run against \
             the deterministic offline extractor"
        );
    }
    Ok(MockExtractor::new())
}

fn run_ingest_command(ingest_args: &IngestArgs) -> Result<()> {
    let extractor = resolve_extractor(ingest_args.mock_extractor, &ingest_args.api_key_var)?;
    let config = ingest_args.to_config();

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;

    let summary = run_ingest(&config, &extractor, &interrupted).context("ingest run failed")?;

    if summary.interrupted {
        info!(entries_with_vertices = summary.entries_with_vertices, "ingest interrupted, checkpoint saved");
    } else {
        info!(entries_with_vertices = summary.entries_with_vertices, "ingest finished");
    }
    Ok(())
}

fn run_query_command(query_args: &QueryArgs) -> Result<()> {
    let extractor = resolve_extractor(query_args.mock_extractor, &query_args.api_key_var)?;

    let conn = Connection::open(&query_args.db).with_context(|| format!("failed to open database {}", query_args.db))?;
    skg_store::init_schema(&conn).context("failed to initialize schema")?;

    let retriever = KnowledgeRetriever::new(&conn, query_args.user_id, &extractor);
    let result = retriever
        .retrieve(&query_args.query, query_args.top_k, query_args.threshold)
        .context("retrieval failed")?;

    if result.matched_vertices.is_empty() {
        println!("No matching entities found.");
        return Ok(());
    }

    println!("{}", skg_pipeline::format_context(&result));
    Ok(())
}
