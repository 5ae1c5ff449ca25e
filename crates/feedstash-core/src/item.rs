//! Item types: the records ingested from the external feed.
//!
//! An item is immutable once stored. Its identity is the store-assigned
//! [`ItemId`]; its natural key is the `(source_identity, source_reference,
//! body_text)` triple, which the store keeps unique.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::timestamp::parse_timestamp;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Surrogate id assigned by the store on insert. Monotonically increasing.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

// ─── Input ───────────────────────────────────────────────────────────────────

/// An item ready to be written to the store. The caller has already parsed
/// `raw_timestamp`; the store assigns `id` and `received_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
  pub source_identity:  String,
  pub source_reference: String,
  pub raw_timestamp:    String,
  pub parsed_timestamp: Option<String>,
  pub body_text:        String,
}

impl NewItem {
  /// Build a new item, parsing `raw_timestamp` on a best-effort basis.
  pub fn new(
    source_identity: impl Into<String>,
    source_reference: impl Into<String>,
    raw_timestamp: impl Into<String>,
    body_text: impl Into<String>,
  ) -> Self {
    let raw_timestamp = raw_timestamp.into();
    Self {
      source_identity: source_identity.into(),
      source_reference: source_reference.into(),
      parsed_timestamp: parse_timestamp(&raw_timestamp),
      raw_timestamp,
      body_text: body_text.into(),
    }
  }
}

/// A record as delivered by the feed.
///
/// Accepts the feed's own field names (`UserName`, `LinkToTweet`,
/// `CreatedAt`, `Text`) as aliases. Missing fields are treated as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncomingItem {
  #[serde(default, alias = "UserName")]
  pub source_identity:  String,
  #[serde(default, alias = "LinkToTweet")]
  pub source_reference: String,
  #[serde(default, alias = "CreatedAt")]
  pub raw_timestamp:    String,
  #[serde(default, alias = "Text")]
  pub body_text:        String,
}

impl IncomingItem {
  pub fn into_new_item(self) -> NewItem {
    NewItem::new(
      self.source_identity,
      self.source_reference,
      self.raw_timestamp,
      self.body_text,
    )
  }
}

// ─── Stored ──────────────────────────────────────────────────────────────────

/// A persisted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  pub id:               ItemId,
  pub source_identity:  String,
  pub source_reference: String,
  pub raw_timestamp:    String,
  pub parsed_timestamp: Option<String>,
  pub body_text:        String,
  /// Insertion time, assigned by the store.
  pub received_at:      NaiveDateTime,
}

/// Result of [`ItemStore::insert`](crate::store::ItemStore::insert).
///
/// A duplicate natural key is not an error: the item is already stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsertOutcome {
  Inserted { id: ItemId },
  #[serde(rename = "duplicate")]
  AlreadyExists,
}

impl InsertOutcome {
  pub fn inserted_id(&self) -> Option<ItemId> {
    match self {
      Self::Inserted { id } => Some(*id),
      Self::AlreadyExists => None,
    }
  }
}
