//! Error type for `feedstash-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// The database file's existence could not be determined.
  #[error("cannot inspect database file {path:?}: {source}")]
  DatabaseFile {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The migrations directory could not be listed.
  #[error("cannot read migrations directory {path:?}: {source}")]
  MigrationsDir {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// A migration script could not be read from disk.
  #[error("cannot read migration script {path:?}: {source}")]
  ReadScript {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  /// The pre-migration backup could not be written. No schema change was
  /// attempted.
  #[error("backup before migration {migration} failed, writing {path:?}: {source}")]
  Backup {
    migration: String,
    path:      PathBuf,
    #[source]
    source:    std::io::Error,
  },

  /// A migration script failed. It has not been recorded as applied.
  #[error("migration {migration} failed: {source}")]
  Migration {
    migration: String,
    #[source]
    source:    tokio_rusqlite::Error,
  },

  /// A migration script finished with a transaction still open.
  #[error("migration {0} left a transaction open")]
  UnterminatedTransaction(String),

  #[error("batch of {size} documents exceeds the index limit of {max}")]
  BatchTooLarge { size: usize, max: usize },

  #[error("embedding error: {0}")]
  Embedding(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("embedder returned {got} vectors for {expected} texts")]
  EmbeddingCount { expected: usize, got: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
