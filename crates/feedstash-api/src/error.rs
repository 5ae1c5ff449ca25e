//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] BoxError),

  /// The search index (or the embedder behind it) failed.
  #[error("search index error: {0}")]
  Index(#[source] BoxError),
}

impl ApiError {
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

impl From<feedstash_core::Error> for ApiError {
  fn from(e: feedstash_core::Error) -> Self {
    match e {
      feedstash_core::Error::Store(e) => Self::Store(e),
      feedstash_core::Error::Index(e) => Self::Index(e),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
      ApiError::Index(_) => StatusCode::BAD_GATEWAY,
    };
    let message = match &self {
      ApiError::BadRequest(m) => m.clone(),
      ApiError::Store(e) | ApiError::Index(e) => {
        tracing::error!(error = %e, "request failed");
        e.to_string()
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
