//! Error types for `feedstash-core`.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The relational store failed.
  #[error("store error: {0}")]
  Store(#[source] BoxError),

  /// The search index failed.
  #[error("index error: {0}")]
  Index(#[source] BoxError),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub fn index<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Index(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
