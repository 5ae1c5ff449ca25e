//! [`SqliteStore`]: the SQLite implementation of [`ItemStore`].

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use rusqlite::OptionalExtension as _;

use feedstash_core::{
  item::{InsertOutcome, Item, ItemId, NewItem},
  query::{ItemFilter, ItemQuery},
  store::ItemStore,
};

use crate::{
  Result,
  encode::{ITEM_COLUMNS, RawItem},
  schema::ITEMS_SCHEMA,
};

/// How long a writer waits on SQLite's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ─── Store ───────────────────────────────────────────────────────────────────

/// The item repository, backed by a single SQLite file.
///
/// Only the path is held; each operation opens its own connection and closes
/// it before returning. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  path: PathBuf,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and make sure the items table exists.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let store = Self { path: path.as_ref().to_path_buf() };
    store.ensure_schema().await?;
    Ok(store)
  }

  pub fn path(&self) -> &Path { &self.path }

  /// Create the items table, with its uniqueness constraint, if absent.
  pub async fn ensure_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(ITEMS_SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `f` on a fresh connection, closing it afterwards.
  async fn call<F, R>(&self, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let conn = tokio_rusqlite::Connection::open(&self.path).await?;
    let out = conn
      .call(move |conn| {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        f(conn)
      })
      .await?;
    conn.close().await?;
    Ok(out)
  }

  /// Fetch a single item by id.
  pub async fn get(&self, id: ItemId) -> Result<Option<Item>> {
    let raw: Option<RawItem> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
              rusqlite::params![id.0],
              RawItem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawItem::into_item).transpose()
  }

  /// Number of stored items.
  pub async fn count(&self) -> Result<u64> {
    let n: i64 = self
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }
}

/// Wrap `s` for a substring `LIKE` match, escaping its wildcards.
fn like_pattern(s: &str) -> String {
  let mut out = String::with_capacity(s.len() + 2);
  out.push('%');
  for c in s.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── ItemStore impl ──────────────────────────────────────────────────────────

impl ItemStore for SqliteStore {
  type Error = crate::Error;

  async fn insert(&self, item: NewItem) -> Result<InsertOutcome> {
    self
      .call(move |conn| {
        let changed = conn.execute(
          "INSERT INTO items (
             source_identity, source_reference, raw_timestamp, parsed_timestamp, body_text
           ) VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (source_identity, source_reference, body_text) DO NOTHING",
          rusqlite::params![
            item.source_identity,
            item.source_reference,
            item.raw_timestamp,
            item.parsed_timestamp,
            item.body_text,
          ],
        )?;

        if changed == 0 {
          Ok(InsertOutcome::AlreadyExists)
        } else {
          Ok(InsertOutcome::Inserted { id: ItemId(conn.last_insert_rowid()) })
        }
      })
      .await
  }

  async fn query(&self, query: &ItemQuery) -> Result<Vec<Item>> {
    let (where_clause, pattern) = match &query.filter {
      None => ("", None),
      Some(ItemFilter::Text(t)) => {
        ("WHERE body_text LIKE ?1 ESCAPE '\\'", Some(like_pattern(t)))
      }
      Some(ItemFilter::Author(a)) => {
        ("WHERE source_identity LIKE ?1 ESCAPE '\\'", Some(like_pattern(a)))
      }
    };
    let limit = i64::from(query.limit.get());

    // Items without a parsed timestamp sort by their raw timestamp.
    let sql = format!(
      "SELECT {ITEM_COLUMNS}
       FROM items
       {where_clause}
       ORDER BY COALESCE(parsed_timestamp, raw_timestamp) DESC, id DESC
       LIMIT ?2"
    );

    let raws: Vec<RawItem> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![pattern, limit], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawItem::into_item).collect()
  }

  async fn items_after(&self, after: Option<ItemId>, limit: usize) -> Result<Vec<Item>> {
    let after = after.map_or(i64::MIN, |id| id.0);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawItem> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ITEM_COLUMNS} FROM items WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![after, limit], RawItem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawItem::into_item).collect()
  }
}

#[cfg(test)]
mod tests {
  use super::like_pattern;

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("abc"), "%abc%");
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
  }
}
