//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! `received_at` is filled by SQLite's `CURRENT_TIMESTAMP`
//! (`YYYY-MM-DD HH:MM:SS`, UTC). Index metadata is compact JSON; embeddings
//! are little-endian `f32` blobs.

use chrono::NaiveDateTime;
use feedstash_core::{
  index::ItemMetadata,
  item::{Item, ItemId},
};

use crate::{Error, Result};

// ─── received_at ─────────────────────────────────────────────────────────────

const SQLITE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

pub fn decode_received_at(s: &str) -> Result<NaiveDateTime> {
  NaiveDateTime::parse_from_str(s, SQLITE_TIMESTAMP)
    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Item rows ───────────────────────────────────────────────────────────────

/// Column list matching [`RawItem::from_row`].
pub const ITEM_COLUMNS: &str = "id, source_identity, source_reference, raw_timestamp, \
                                parsed_timestamp, body_text, received_at";

/// An `items` row as read from SQLite, before timestamp decoding.
pub struct RawItem {
  pub id:               i64,
  pub source_identity:  String,
  pub source_reference: String,
  pub raw_timestamp:    String,
  pub parsed_timestamp: Option<String>,
  pub body_text:        String,
  pub received_at:      String,
}

impl RawItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      source_identity:  row.get(1)?,
      source_reference: row.get(2)?,
      raw_timestamp:    row.get(3)?,
      parsed_timestamp: row.get(4)?,
      body_text:        row.get(5)?,
      received_at:      row.get(6)?,
    })
  }

  pub fn into_item(self) -> Result<Item> {
    Ok(Item {
      id:               ItemId(self.id),
      source_identity:  self.source_identity,
      source_reference: self.source_reference,
      raw_timestamp:    self.raw_timestamp,
      parsed_timestamp: self.parsed_timestamp,
      body_text:        self.body_text,
      received_at:      decode_received_at(&self.received_at)?,
    })
  }
}

// ─── Index metadata ──────────────────────────────────────────────────────────

pub fn encode_metadata(m: &ItemMetadata) -> Result<String> {
  Ok(serde_json::to_string(m)?)
}

pub fn decode_metadata(s: &str) -> Result<ItemMetadata> {
  Ok(serde_json::from_str(s)?)
}

// ─── Embeddings ──────────────────────────────────────────────────────────────

pub fn encode_embedding(v: &[f32]) -> Vec<u8> {
  v.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub fn decode_embedding(blob: &[u8]) -> Vec<f32> {
  blob
    .chunks_exact(4)
    .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    .collect()
}
