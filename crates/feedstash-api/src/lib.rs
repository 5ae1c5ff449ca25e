//! JSON REST API for feedstash.
//!
//! Exposes an axum [`Router`] backed by any [`ItemStore`] and
//! [`SearchIndex`]. Binding, TLS, and request tracing are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = feedstash_api::api_router(Arc::new(store), Arc::new(index));
//! ```

pub mod error;
pub mod items;
pub mod semantic;

use std::sync::Arc;

use axum::{
  Json, Router,
  routing::{get, post},
};
use feedstash_core::{index::SearchIndex, store::ItemStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct AppState<S, I> {
  pub store: Arc<S>,
  pub index: Arc<I>,
}

// Derived `Clone` would require `S: Clone` and `I: Clone`.
impl<S, I> Clone for AppState<S, I> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), index: Arc::clone(&self.index) }
  }
}

/// Build the API router for `store` and `index`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, I>(store: Arc<S>, index: Arc<I>) -> Router<()>
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  Router::new()
    .route("/items", post(items::create::<S, I>))
    .route("/items/latest", get(items::latest::<S, I>))
    .route("/items/search", get(items::search::<S, I>))
    .route("/items/semantic-search", get(semantic::handler::<S, I>))
    .route("/health", get(health))
    .route("/", get(home))
    .with_state(AppState { store, index })
}

/// `GET /`: server identity and the route table.
async fn home() -> Json<Value> {
  Json(json!({
    "message": "feedstash item archive is running",
    "version": env!("CARGO_PKG_VERSION"),
    "endpoints": {
      "create_item": "/items (POST)",
      "latest_items": "/items/latest (GET)",
      "search_items": "/items/search (GET)",
      "semantic_search_items": "/items/semantic-search (GET)",
      "health": "/health (GET)",
      "home": "/ (GET)",
    },
    "timestamp": chrono::Utc::now().to_rfc3339(),
  }))
}

/// `GET /health`
async fn health() -> Json<Value> {
  Json(json!({
    "status": "healthy",
    "timestamp": chrono::Utc::now().to_rfc3339(),
  }))
}
