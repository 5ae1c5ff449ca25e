//! The search-index side: documents, matches, and the `SearchIndex` and
//! `Embedder` traits.
//!
//! The index is a derived projection of the item store. Every document
//! carries the id of the item it came from in its metadata, which is what
//! the synchronizer scans to find out how far the index has been filled.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::item::{Item, ItemId};

// ─── Documents ───────────────────────────────────────────────────────────────

/// Metadata stored next to each indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
  pub item_id:          ItemId,
  pub source_identity:  String,
  pub source_reference: String,
  pub raw_timestamp:    String,
  pub parsed_timestamp: Option<String>,
}

/// A document to be upserted into the index, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDocument {
  pub id:       String,
  pub text:     String,
  pub metadata: ItemMetadata,
}

impl From<&Item> for IndexDocument {
  fn from(item: &Item) -> Self {
    Self {
      id:       item.id.to_string(),
      text:     item.body_text.clone(),
      metadata: ItemMetadata {
        item_id:          item.id,
        source_identity:  item.source_identity.clone(),
        source_reference: item.source_reference.clone(),
        raw_timestamp:    item.raw_timestamp.clone(),
        parsed_timestamp: item.parsed_timestamp.clone(),
      },
    }
  }
}

/// A similarity-search hit. Lower `distance` means more relevant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMatch {
  pub id:       String,
  pub text:     String,
  pub metadata: ItemMetadata,
  pub distance: f32,
}

/// Whether `text` carries anything worth embedding.
pub fn is_indexable(text: &str) -> bool { !text.trim().is_empty() }

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Abstraction over an embedding/similarity-search service.
pub trait SearchIndex: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The largest batch [`add_documents`](Self::add_documents) accepts.
  fn max_batch_size(&self) -> usize;

  /// Upsert documents by id. Re-adding an existing id overwrites it.
  ///
  /// Batches larger than [`max_batch_size`](Self::max_batch_size) are
  /// rejected.
  fn add_documents(
    &self,
    documents: Vec<IndexDocument>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Metadata of every stored document.
  fn stored_metadata(
    &self,
  ) -> impl Future<Output = Result<Vec<ItemMetadata>, Self::Error>> + Send + '_;

  /// Up to `limit` documents most similar to `text`, most relevant first.
  fn query<'a>(
    &'a self,
    text: &'a str,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<IndexMatch>, Self::Error>> + Send + 'a;
}

/// Turns text into embedding vectors.
pub trait Embedder: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The largest number of texts a single [`embed`](Self::embed) call accepts.
  fn max_batch_size(&self) -> usize;

  /// Embed `texts`, returning one vector per input in the same order.
  fn embed<'a>(
    &'a self,
    texts: &'a [String],
  ) -> impl Future<Output = Result<Vec<Vec<f32>>, Self::Error>> + Send + 'a;
}
