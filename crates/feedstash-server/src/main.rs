//! feedstash server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), brings the
//! items database schema up to date, catches the search index up with the
//! store, and serves the JSON API over HTTP.
//!
//! ```text
//! feedstash                 # same as `feedstash serve`
//! feedstash migrate         # apply pending migrations and exit
//! feedstash sync            # run one index synchronization pass and exit
//! feedstash status          # show migration and index state
//! ```

use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use feedstash_core::sync::{self, IndexSynchronizer, SyncReport};
use feedstash_server::{Index, ServerConfig, migrate, open_index, open_migrated_store};
use feedstash_store_sqlite::{MigrationManager, SqliteStore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "feedstash item archive server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: std::path::PathBuf,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
  /// Migrate, synchronize the index, then serve HTTP (default).
  Serve,
  /// Apply pending schema migrations.
  Migrate,
  /// Push items missing from the search index.
  Sync,
  /// Show applied and pending migrations and the index high-water mark.
  Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  match cli.command.unwrap_or(Command::Serve) {
    Command::Serve => serve(&cfg).await,
    Command::Migrate => {
      let report = migrate(&cfg).await?;
      if report.applied.is_empty() {
        println!("database schema is up to date");
      }
      for name in &report.applied {
        println!("applied {name}");
      }
      for path in &report.backups {
        println!("backup  {}", path.display());
      }
      Ok(())
    }
    Command::Sync => {
      let (store, _) = open_migrated_store(&cfg).await?;
      let index = open_index(&cfg).await?;
      let report = synchronize(&cfg, &store, &index).await?;
      print_sync_report(&report);
      if report.aborted() {
        anyhow::bail!("synchronization stopped at a failed batch");
      }
      Ok(())
    }
    Command::Status => status(&cfg).await,
  }
}

async fn serve(cfg: &ServerConfig) -> anyhow::Result<()> {
  let (store, _) = open_migrated_store(cfg).await?;
  let index = open_index(cfg).await?;

  match synchronize(cfg, &store, &index).await {
    Ok(report) if report.aborted() => {
      tracing::warn!("index catch-up incomplete, remaining items will be pushed on next start");
    }
    Ok(_) => {}
    Err(e) => tracing::error!(error = %e, "index catch-up failed, continuing without it"),
  }

  let app = feedstash_server::router(Arc::new(store), Arc::new(index));
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn synchronize(
  cfg: &ServerConfig,
  store: &SqliteStore,
  index: &Index,
) -> anyhow::Result<SyncReport> {
  IndexSynchronizer::new(store, index)
    .with_batch_size(cfg.embed_batch_size)
    .synchronize()
    .await
    .context("index synchronization failed")
}

async fn status(cfg: &ServerConfig) -> anyhow::Result<()> {
  let manager = MigrationManager::new(&cfg.database_path, &cfg.migrations_dir);
  let applied = manager.applied().await.context("failed to read applied migrations")?;
  let pending = manager.pending().await.context("failed to list pending migrations")?;

  println!("database:   {}", cfg.database_path.display());
  for name in &applied {
    println!("  applied   {name}");
  }
  for m in &pending {
    println!("  pending   {}", m.filename());
  }

  let index_exists = tokio::fs::try_exists(&cfg.index_path)
    .await
    .with_context(|| format!("failed to inspect {:?}", cfg.index_path))?;
  if !index_exists {
    println!("index:      {} (not created)", cfg.index_path.display());
    return Ok(());
  }
  let index = open_index(cfg).await?;
  let mark = sync::high_water_mark(&index)
    .await
    .context("failed to read index metadata")?;
  println!("index:      {}", cfg.index_path.display());
  match mark {
    Some(id) => println!("  high-water mark {id}"),
    None => println!("  empty"),
  }
  Ok(())
}

fn print_sync_report(report: &SyncReport) {
  match report.starting_mark {
    Some(id) => println!("resumed after item {id}"),
    None => println!("started from the beginning"),
  }
  println!(
    "pushed {} items in {} batches, skipped {} empty",
    report.pushed, report.batches, report.skipped_empty
  );
  if let Some(id) = report.failed_batch_start {
    println!("stopped at the batch starting with item {id}");
  }
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
