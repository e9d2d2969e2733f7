//! # hashdex CLI
//!
//! Opens (and optionally truncates) the index store, then runs at most one
//! of: an ingestion run over a directory, or a read query.
//!
//! ## Examples
//!
//! ```bash
//! # Index ~/Pictures under the source tag "laptop"
//! hashdex --db photos.db -s laptop -i ~/Pictures
//!
//! # Start over, then index a backup drive
//! hashdex --db photos.db -t -s backup -i /mnt/backup
//!
//! # Files whose content exists on both
//! hashdex --db photos.db -q "select hash, count(distinct source) as n from files group by hash having n > 1"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hashdex::config::{self, Config};
use hashdex::progress::ProgressMode;
use hashdex::query::{self, OutputFormat};
use hashdex::{IngestOptions, Ingestor, SqliteStore};

/// Index files by content fingerprint and query the index with SQL.
#[derive(Parser)]
#[command(name = "hashdex", version)]
struct Cli {
    /// Path to an optional configuration file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Index store file. Overrides `[db].path`.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Delete the index store before opening it.
    #[arg(short = 't', long)]
    truncate: bool,

    /// Source tag recorded with every ingested file.
    #[arg(short = 's', long, default_value = "")]
    source: String,

    /// Directory to ingest.
    #[arg(short = 'i', long, value_name = "DIR", conflicts_with = "query")]
    include: Option<PathBuf>,

    /// Read query to run against the `files` table.
    #[arg(short = 'q', long, value_name = "SQL")]
    query: Option<String>,

    /// Query output format: `table` or `json`.
    #[arg(long, default_value = "table")]
    format: OutputFormat,

    /// Ingestion progress on stderr: `auto`, `human`, `json` or `off`.
    #[arg(long, default_value = "auto")]
    progress: ProgressMode,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => Config::default(),
    };

    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cfg.log.level.clone()
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    let db_path = cli.db.clone().unwrap_or_else(|| cfg.db.path.clone());
    let store = Arc::new(SqliteStore::open(&db_path, cli.truncate).await?);

    let outcome = run(&cli, &cfg, Arc::clone(&store)).await;

    let closed = match Arc::try_unwrap(store) {
        Ok(store) => store.close().await,
        Err(_) => {
            tracing::warn!("index store still in use at shutdown; not closed cleanly");
            Ok(())
        }
    };

    finish(outcome, closed)
}

/// Combine the run outcome with the store close result.
///
/// A run error wins; a close error that follows it is logged, not returned.
fn finish(outcome: anyhow::Result<()>, closed: hashdex::Result<()>) -> anyhow::Result<()> {
    match (outcome, closed) {
        (Err(run_err), Err(close_err)) => {
            tracing::error!(error = %close_err, "failed to close index store");
            Err(run_err)
        }
        (Err(run_err), Ok(())) => Err(run_err),
        (Ok(()), closed) => closed.map_err(anyhow::Error::from),
    }
}

async fn run(cli: &Cli, cfg: &Config, store: Arc<SqliteStore>) -> anyhow::Result<()> {
    if let Some(sql) = &cli.query {
        let rendered = query::run_query(&*store, sql, cli.format).await?;
        print!("{}", rendered);
        if cli.format == OutputFormat::Json {
            println!();
        }
        return Ok(());
    }

    let Some(dir) = &cli.include else {
        return Ok(());
    };

    let options = IngestOptions {
        follow_symlinks: cfg.ingest.follow_symlinks,
        max_concurrency: Some(cfg.ingest.max_concurrency),
        exclude_globs: cfg.ingest.exclude_globs.clone(),
        exclude: Vec::new(),
    };
    let report = Ingestor::new(store)
        .with_options(options)
        .with_progress(cli.progress.reporter())
        .ingest(&cli.source, dir)
        .await
        .with_context(|| format!("Failed to ingest {}", dir.display()))?;

    println!("ingest {}", report.source);
    println!("  discovered: {}", report.discovered);
    println!("  inserted: {}", report.inserted);
    println!("  failed: {}", report.failed());
    if report.cancelled > 0 {
        println!("  cancelled: {}", report.cancelled);
    }
    println!("ok");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashdex::IndexError;

    #[test]
    fn run_error_survives_close_error() {
        let outcome = Err(anyhow::anyhow!("no such column: nope"));
        let closed = Err(IndexError::StoreClose("database is locked".to_string()));

        let err = finish(outcome, closed).unwrap_err();
        assert!(err.to_string().contains("no such column"));
    }

    #[test]
    fn close_error_surfaces_after_clean_run() {
        let closed = Err(IndexError::StoreClose("database is locked".to_string()));

        let err = finish(Ok(()), closed).unwrap_err();
        assert!(err.to_string().contains("database is locked"));
        assert!(finish(Ok(()), Ok(())).is_ok());
    }
}
