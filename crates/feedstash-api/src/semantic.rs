//! Handler for `GET /items/semantic-search`.

use axum::{
  Json,
  extract::{Query, State},
};
use feedstash_core::{
  index::{IndexMatch, ItemMetadata, SearchIndex},
  query::Limit,
  store::ItemStore,
};
use serde::Serialize;

use crate::{
  AppState,
  error::ApiError,
  items::{ListParams, SearchEcho},
};

/// One similarity hit. Lower `distance` is more relevant.
#[derive(Debug, Serialize)]
pub struct SemanticHit {
  #[serde(flatten)]
  pub metadata:  ItemMetadata,
  pub body_text: String,
  pub distance:  f32,
}

impl From<IndexMatch> for SemanticHit {
  fn from(m: IndexMatch) -> Self {
    Self { metadata: m.metadata, body_text: m.text, distance: m.distance }
  }
}

#[derive(Debug, Serialize)]
pub struct SemanticList {
  pub items:         Vec<SemanticHit>,
  pub count:         usize,
  pub limit:         Limit,
  pub search_params: SearchEcho,
}

/// `GET /items/semantic-search?query=...[&limit=...]`
pub async fn handler<S, I>(
  State(state): State<AppState<S, I>>,
  Query(params): Query<ListParams>,
) -> Result<Json<SemanticList>, ApiError>
where
  S: ItemStore + 'static,
  I: SearchIndex + 'static,
{
  let text = params.required_query()?;
  let limit = params.limit();

  let items: Vec<SemanticHit> = state
    .index
    .query(text, limit.get() as usize)
    .await
    .map_err(ApiError::index)?
    .into_iter()
    .map(SemanticHit::from)
    .collect();

  Ok(Json(SemanticList {
    count: items.len(),
    items,
    limit,
    search_params: SearchEcho { query: text.to_owned() },
  }))
}
