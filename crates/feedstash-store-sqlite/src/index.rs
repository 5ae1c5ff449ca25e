//! [`SqliteIndex`]: a similarity-search index kept in its own SQLite file.
//!
//! Each document row holds the text, its metadata as JSON and the embedding
//! as a little-endian `f32` blob. Queries embed the query text and rank every
//! stored document by cosine distance, which is adequate for the size of a
//! personal feed archive.

use std::{cmp::Ordering, path::Path};

use feedstash_core::index::{Embedder, IndexDocument, IndexMatch, ItemMetadata, SearchIndex};

use crate::{
  Error, Result,
  encode::{decode_embedding, decode_metadata, encode_embedding, encode_metadata},
  schema::INDEX_SCHEMA,
};

pub struct SqliteIndex<E> {
  conn:     tokio_rusqlite::Connection,
  embedder: E,
}

impl<E: Embedder> SqliteIndex<E> {
  /// Open (or create) an index at `path`.
  pub async fn open(path: impl AsRef<Path>, embedder: E) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, embedder).await
  }

  pub async fn open_in_memory(embedder: E) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, embedder).await
  }

  async fn init(conn: tokio_rusqlite::Connection, embedder: E) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(INDEX_SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self { conn, embedder })
  }

  /// Number of stored documents.
  pub async fn len(&self) -> Result<usize> {
    let n: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or(0))
  }

  async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = self
      .embedder
      .embed(texts)
      .await
      .map_err(|e| Error::Embedding(Box::new(e)))?;
    if vectors.len() != texts.len() {
      return Err(Error::EmbeddingCount { expected: texts.len(), got: vectors.len() });
    }
    Ok(vectors)
  }
}

/// `1 - cosine similarity`. Zero vectors are maximally distant from
/// everything.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
  let (mut dot, mut na, mut nb) = (0.0_f32, 0.0_f32, 0.0_f32);
  for (x, y) in a.iter().zip(b) {
    dot += x * y;
    na += x * x;
    nb += y * y;
  }
  if na == 0.0 || nb == 0.0 {
    return 1.0;
  }
  1.0 - dot / (na.sqrt() * nb.sqrt())
}

struct StoredDocument {
  id:        String,
  text:      String,
  metadata:  String,
  embedding: Vec<u8>,
}

impl<E: Embedder> SearchIndex for SqliteIndex<E> {
  type Error = Error;

  fn max_batch_size(&self) -> usize { self.embedder.max_batch_size() }

  async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<()> {
    if documents.is_empty() {
      return Ok(());
    }
    let max = self.max_batch_size();
    if documents.len() > max {
      return Err(Error::BatchTooLarge { size: documents.len(), max });
    }

    let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();
    let vectors = self.embed(&texts).await?;

    let rows = documents
      .into_iter()
      .zip(vectors)
      .map(|(doc, v)| {
        Ok(StoredDocument {
          metadata:  encode_metadata(&doc.metadata)?,
          embedding: encode_embedding(&v),
          id:        doc.id,
          text:      doc.text,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    let count = rows.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO documents (doc_id, body, metadata_json, embedding)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (doc_id) DO UPDATE SET
               body          = excluded.body,
               metadata_json = excluded.metadata_json,
               embedding     = excluded.embedding",
          )?;
          for row in &rows {
            stmt.execute(rusqlite::params![row.id, row.text, row.metadata, row.embedding])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    tracing::debug!(count, "documents upserted into index");
    Ok(())
  }

  async fn stored_metadata(&self) -> Result<Vec<ItemMetadata>> {
    let raw: Vec<(String, String)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare("SELECT doc_id, metadata_json FROM documents")?;
        let rows = stmt
          .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    Ok(
      raw
        .into_iter()
        .filter_map(|(doc_id, json)| match decode_metadata(&json) {
          Ok(m) => Some(m),
          Err(e) => {
            tracing::warn!(%doc_id, error = %e, "skipping document with unreadable metadata");
            None
          }
        })
        .collect(),
    )
  }

  async fn query(&self, text: &str, limit: usize) -> Result<Vec<IndexMatch>> {
    if limit == 0 {
      return Ok(Vec::new());
    }
    let query = self
      .embed(&[text.to_owned()])
      .await?
      .pop()
      .ok_or(Error::EmbeddingCount { expected: 1, got: 0 })?;

    let stored: Vec<StoredDocument> = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT doc_id, body, metadata_json, embedding FROM documents")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(StoredDocument {
              id:        row.get(0)?,
              text:      row.get(1)?,
              metadata:  row.get(2)?,
              embedding: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut matches = Vec::with_capacity(stored.len());
    for doc in stored {
      let metadata = match decode_metadata(&doc.metadata) {
        Ok(m) => m,
        Err(e) => {
          tracing::warn!(doc_id = %doc.id, error = %e, "skipping document with unreadable metadata");
          continue;
        }
      };
      let distance = cosine_distance(&query, &decode_embedding(&doc.embedding));
      matches.push(IndexMatch { id: doc.id, text: doc.text, metadata, distance });
    }

    matches.sort_by(|a, b| {
      a.distance
        .partial_cmp(&b.distance)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.id.cmp(&b.id))
    });
    matches.truncate(limit);
    Ok(matches)
  }
}
