//! Server wiring for feedstash: configuration, the HTTP embedder, and the
//! top-level router.

pub mod embedder;

pub use embedder::{EmbedError, HttpEmbedder};

use std::{
  collections::HashMap,
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::Router;
use feedstash_core::{index::SearchIndex, store::ItemStore, sync::DEFAULT_BATCH_SIZE};
use anyhow::Context as _;
use feedstash_store_sqlite::{MigrationManager, MigrationReport, SqliteIndex, SqliteStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

/// The search index used by the server.
pub type Index = SqliteIndex<HttpEmbedder>;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FEEDSTASH_*` environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub database_path:      PathBuf,
  pub migrations_dir:     PathBuf,
  pub index_path:         PathBuf,
  pub embeddings_url:     String,
  /// Upper bound on documents per embedding request.
  pub embed_batch_size:   usize,
  pub embed_timeout_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:               "0.0.0.0".into(),
      port:               5000,
      database_path:      PathBuf::from("data/items.db"),
      migrations_dir:     PathBuf::from("migrations"),
      index_path:         PathBuf::from("data/index.db"),
      embeddings_url:     "http://localhost:8080".into(),
      embed_batch_size:   DEFAULT_BATCH_SIZE,
      embed_timeout_secs: 30,
    }
  }
}

impl ServerConfig {
  /// Load from an optional TOML file overlaid by the process environment.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    Self::load_with_env(path, None)
  }

  /// Like [`load`](Self::load), reading variables from `env` instead of the
  /// process environment when given.
  pub fn load_with_env(
    path: &Path,
    env: Option<HashMap<String, String>>,
  ) -> Result<Self, config::ConfigError> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("FEEDSTASH")
          .try_parsing(true)
          .source(env),
      )
      .build()?
      .try_deserialize()?;
    Ok(cfg.expand_paths())
  }

  fn expand_paths(mut self) -> Self {
    self.database_path = expand_tilde(&self.database_path);
    self.migrations_dir = expand_tilde(&self.migrations_dir);
    self.index_path = expand_tilde(&self.index_path);
    self
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn embed_timeout(&self) -> Duration { Duration::from_secs(self.embed_timeout_secs) }

  pub fn embedder(&self) -> Result<HttpEmbedder, EmbedError> {
    HttpEmbedder::new(&self.embeddings_url, self.embed_batch_size, self.embed_timeout())
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Database ─────────────────────────────────────────────────────────────────

/// Apply pending migrations to the configured items database.
pub async fn migrate(cfg: &ServerConfig) -> anyhow::Result<MigrationReport> {
  ensure_parent_dir(&cfg.database_path).await?;
  MigrationManager::new(&cfg.database_path, &cfg.migrations_dir)
    .apply_all_pending()
    .await
    .with_context(|| format!("failed to migrate {:?}", cfg.database_path))
}

/// Migrate, then open the store. The store is never opened on a database
/// with pending migrations.
pub async fn open_migrated_store(
  cfg: &ServerConfig,
) -> anyhow::Result<(SqliteStore, MigrationReport)> {
  let report = migrate(cfg).await?;
  let store = SqliteStore::open(&cfg.database_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.database_path))?;
  Ok((store, report))
}

pub async fn open_index(cfg: &ServerConfig) -> anyhow::Result<Index> {
  ensure_parent_dir(&cfg.index_path).await?;
  let embedder = cfg.embedder().context("failed to build embedding client")?;
  Index::open(&cfg.index_path, embedder)
    .await
    .with_context(|| format!("failed to open index at {:?}", cfg.index_path))
}

async fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create directory {parent:?}"))?;
  }
  Ok(())
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API with request tracing.
pub fn router<S, I>(store: Arc<S>, index: Arc<I>) -> Router
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  feedstash_api::api_router(store, index).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use feedstash_core::item::{InsertOutcome, NewItem};
  use tower::ServiceExt as _;

  use super::*;

  fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
  }

  #[test]
  fn defaults_without_file_or_env() {
    let cfg = ServerConfig::load_with_env(Path::new("does-not-exist.toml"), env(&[])).unwrap();
    assert_eq!(cfg, ServerConfig::default());
    assert_eq!(cfg.address(), "0.0.0.0:5000");
    assert_eq!(cfg.embed_batch_size, 32);
  }

  #[test]
  fn file_then_env_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
      &path,
      "port = 6000\nembeddings_url = \"http://embed:80\"\nindex_path = \"/srv/index.db\"\n",
    )
    .unwrap();

    let cfg = ServerConfig::load_with_env(
      &path,
      env(&[("FEEDSTASH_PORT", "7000"), ("FEEDSTASH_EMBED_BATCH_SIZE", "8")]),
    )
    .unwrap();

    assert_eq!(cfg.port, 7000);
    assert_eq!(cfg.embed_batch_size, 8);
    assert_eq!(cfg.embeddings_url, "http://embed:80");
    assert_eq!(cfg.index_path, PathBuf::from("/srv/index.db"));
    assert_eq!(cfg.database_path, PathBuf::from("data/items.db"));
  }

  #[test]
  fn tilde_expansion() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(
      expand_tilde(Path::new("~/feeds/items.db")),
      PathBuf::from(home).join("feeds/items.db")
    );
    assert_eq!(expand_tilde(Path::new("data/items.db")), PathBuf::from("data/items.db"));
    assert_eq!(expand_tilde(Path::new("/abs/~/x")), PathBuf::from("/abs/~/x"));
  }

  #[tokio::test]
  async fn store_opens_only_after_legacy_database_is_migrated() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
      database_path: dir.path().join("items.db"),
      migrations_dir: Path::new(env!("CARGO_MANIFEST_DIR")).join("../../migrations"),
      ..Default::default()
    };
    {
      let conn = rusqlite::Connection::open(&cfg.database_path).unwrap();
      conn
        .execute_batch(
          "CREATE TABLE items (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             source_identity TEXT, source_reference TEXT, raw_timestamp TEXT,
             parsed_timestamp TEXT, body_text TEXT,
             received_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
           );
           INSERT INTO items (source_identity, source_reference, raw_timestamp, body_text) VALUES
             ('alice', 'l1', '2025-01-01', 'hello'),
             ('alice', 'l1', '2025-01-01', 'hello'),
             ('bob', NULL, '2025-01-02', 'legacy null');",
        )
        .unwrap();
    }

    let (store, report) = open_migrated_store(&cfg).await.unwrap();
    assert_eq!(report.applied.len(), 2);

    // The first backup is the untouched legacy database.
    let pre = rusqlite::Connection::open(dir.path().join("items_001_add_unique_constraint.db")).unwrap();
    let indexes: i64 = pre
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_items_%'",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(indexes, 0);

    // Legacy rows are readable and the natural key is enforced.
    let items = store.items_after(None, 10).await.unwrap();
    assert_eq!(items.len(), 2);
    let dup = NewItem {
      source_identity:  "alice".into(),
      source_reference: "l1".into(),
      raw_timestamp:    "2025-01-01".into(),
      parsed_timestamp: None,
      body_text:        "hello".into(),
    };
    assert_eq!(store.insert(dup).await.unwrap(), InsertOutcome::AlreadyExists);

    let (_, again) = open_migrated_store(&cfg).await.unwrap();
    assert!(again.applied.is_empty());
  }

  #[tokio::test]
  async fn router_serves_health() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig {
      embeddings_url: "http://127.0.0.1:9".into(),
      ..Default::default()
    };
    let store = SqliteStore::open(dir.path().join("items.db")).await.unwrap();
    let index = Index::open(dir.path().join("index.db"), cfg.embedder().unwrap())
      .await
      .unwrap();

    let resp = router(Arc::new(store), Arc::new(index))
      .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
