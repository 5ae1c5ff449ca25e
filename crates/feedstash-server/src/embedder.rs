//! [`HttpEmbedder`]: an [`Embedder`] backed by a text-embeddings HTTP server.
//!
//! Sends `POST <base>/embed` with `{"inputs": [...]}`. The server answers
//! with one vector per input; a bare vector is accepted for a single input.

use std::time::Duration;

use feedstash_core::index::Embedder;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
  #[error("embedding request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("embedding server returned {status}: {body}")]
  Status { status: reqwest::StatusCode, body: String },

  #[error("unexpected embedding response: {0}")]
  Response(#[from] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbedResponse {
  Batch(Vec<Vec<f32>>),
  Single(Vec<f32>),
}

fn parse_embeddings(bytes: &[u8]) -> Result<Vec<Vec<f32>>, EmbedError> {
  Ok(match serde_json::from_slice(bytes)? {
    EmbedResponse::Batch(vectors) => vectors,
    EmbedResponse::Single(vector) => vec![vector],
  })
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
  client:    Client,
  endpoint:  String,
  max_batch: usize,
}

impl HttpEmbedder {
  pub fn new(base_url: &str, max_batch: usize, timeout: Duration) -> Result<Self, EmbedError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self {
      client,
      endpoint: format!("{}/embed", base_url.trim_end_matches('/')),
      max_batch: max_batch.max(1),
    })
  }

  pub fn endpoint(&self) -> &str { &self.endpoint }
}

impl Embedder for HttpEmbedder {
  type Error = EmbedError;

  fn max_batch_size(&self) -> usize { self.max_batch }

  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }

    let resp = self
      .client
      .post(&self.endpoint)
      .json(&json!({ "inputs": texts }))
      .send()
      .await?;

    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(EmbedError::Status { status, body });
    }

    let bytes = resp.bytes().await?;
    let vectors = parse_embeddings(&bytes)?;
    tracing::debug!(count = vectors.len(), "received embeddings");
    Ok(vectors)
  }
}
