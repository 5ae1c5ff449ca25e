//! Query types for [`ItemStore::query`](crate::store::ItemStore::query).
//!
//! Search text is parsed once into an [`ItemFilter`] so that storage
//! backends never inspect raw query strings.

use serde::{Deserialize, Serialize};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Prefix that turns a search into a fuzzy match on `source_identity`.
pub const AUTHOR_PREFIX: &str = "from:";

/// What a search matches against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ItemFilter {
  /// Substring match on `body_text`.
  Text(String),
  /// Substring match on `source_identity`.
  Author(String),
}

impl ItemFilter {
  /// Parse user-supplied search text. Blank input means "no filter".
  pub fn parse(input: &str) -> Option<Self> {
    if input.trim().is_empty() {
      return None;
    }
    match input.strip_prefix(AUTHOR_PREFIX) {
      Some(rest) => Some(Self::Author(rest.trim().to_owned())),
      None => Some(Self::Text(input.to_owned())),
    }
  }
}

// ─── Limit ───────────────────────────────────────────────────────────────────

/// A result-count limit, always within `MIN..=MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Limit(u32);

impl Limit {
  pub const MIN: u32 = 1;
  pub const MAX: u32 = 100;
  pub const DEFAULT: Limit = Limit(10);

  /// Clamp any requested value into range.
  pub fn new(requested: i64) -> Self {
    Self(requested.clamp(Self::MIN as i64, Self::MAX as i64) as u32)
  }

  /// Parse a query-string value, falling back to [`Limit::DEFAULT`] when it is
  /// not an integer.
  pub fn parse_or_default(raw: &str) -> Self {
    raw.trim().parse::<i64>().map(Self::new).unwrap_or(Self::DEFAULT)
  }

  pub fn get(self) -> u32 { self.0 }
}

impl Default for Limit {
  fn default() -> Self { Self::DEFAULT }
}

// ─── Query ───────────────────────────────────────────────────────────────────

/// Parameters for an item listing. No filter means "most recent items".
#[derive(Debug, Clone, Default)]
pub struct ItemQuery {
  pub filter: Option<ItemFilter>,
  pub limit:  Limit,
}

impl ItemQuery {
  pub fn latest(limit: Limit) -> Self { Self { filter: None, limit } }

  pub fn search(text: &str, limit: Limit) -> Self {
    Self { filter: ItemFilter::parse(text), limit }
  }
}
