//! Handlers for `/items`: ingestion, recency listing and text search.

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use feedstash_core::{
  index::SearchIndex,
  ingest::ingest,
  item::{IncomingItem, InsertOutcome, Item},
  query::{ItemQuery, Limit},
  store::ItemStore,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError};

/// Query-string parameters shared by the listing endpoints.
///
/// `limit` is kept as text so that a malformed value falls back to the
/// default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub query: Option<String>,
  pub limit: Option<String>,
}

impl ListParams {
  pub fn limit(&self) -> Limit {
    self.limit.as_deref().map_or(Limit::DEFAULT, Limit::parse_or_default)
  }

  /// The `query` parameter, or a 400 when it is missing or blank.
  pub fn required_query(&self) -> Result<&str, ApiError> {
    self
      .query
      .as_deref()
      .filter(|q| !q.trim().is_empty())
      .ok_or_else(|| ApiError::BadRequest("query parameter is required".into()))
  }
}

#[derive(Debug, Serialize)]
pub struct SearchEcho {
  pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ItemList {
  pub items:         Vec<Item>,
  pub count:         usize,
  pub limit:         Limit,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub search_params: Option<SearchEcho>,
}

/// `POST /items`
///
/// `201 Created` for a new item, `200 OK` for a duplicate.
pub async fn create<S, I>(
  State(state): State<AppState<S, I>>,
  Json(incoming): Json<IncomingItem>,
) -> Result<(StatusCode, Json<InsertOutcome>), ApiError>
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  let outcome = ingest(&*state.store, &*state.index, incoming).await?;
  let status = match outcome {
    InsertOutcome::Inserted { .. } => StatusCode::CREATED,
    InsertOutcome::AlreadyExists => StatusCode::OK,
  };
  Ok((status, Json(outcome)))
}

/// `GET /items/latest[?limit=...]`
pub async fn latest<S, I>(
  State(state): State<AppState<S, I>>,
  Query(params): Query<ListParams>,
) -> Result<Json<ItemList>, ApiError>
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  let limit = params.limit();
  let items = state
    .store
    .query(&ItemQuery::latest(limit))
    .await
    .map_err(ApiError::store)?;

  Ok(Json(ItemList { count: items.len(), items, limit, search_params: None }))
}

/// `GET /items/search?query=...[&limit=...]`
///
/// A `from:` prefix searches author names instead of item text.
pub async fn search<S, I>(
  State(state): State<AppState<S, I>>,
  Query(params): Query<ListParams>,
) -> Result<Json<ItemList>, ApiError>
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  let text = params.required_query()?;
  let limit = params.limit();
  let items = state
    .store
    .query(&ItemQuery::search(text, limit))
    .await
    .map_err(ApiError::store)?;

  Ok(Json(ItemList {
    count: items.len(),
    items,
    limit,
    search_params: Some(SearchEcho { query: text.to_owned() }),
  }))
}
