//! The `ItemStore` trait.
//!
//! Implemented by storage backends (e.g. `feedstash-store-sqlite`). The
//! synchronizer, the ingestion path and the HTTP layer depend on this
//! abstraction, not on any concrete backend.

use std::future::Future;

use crate::{
  item::{InsertOutcome, Item, ItemId, NewItem},
  query::ItemQuery,
};

/// Abstraction over the relational record store.
///
/// The store, not the caller, enforces uniqueness of the natural key
/// `(source_identity, source_reference, body_text)`.
pub trait ItemStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Insert an item. A duplicate natural key yields
  /// [`InsertOutcome::AlreadyExists`], not an error.
  fn insert(
    &self,
    item: NewItem,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// List items, newest first. Items without a parsed timestamp are ordered
  /// by their raw timestamp.
  fn query<'a>(
    &'a self,
    query: &'a ItemQuery,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + 'a;

  /// Return up to `limit` items with id strictly greater than `after`
  /// (or from the beginning when `after` is `None`), ascending by id.
  ///
  /// Calling again with the last returned id continues the sequence.
  fn items_after(
    &self,
    after: Option<ItemId>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Item>, Self::Error>> + Send + '_;
}
