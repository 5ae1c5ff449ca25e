//! Steady-state ingestion: store the item, then mirror it into the index.
//!
//! The relational store is authoritative. A failed index push is logged and
//! left for the next synchronization pass; it never fails the ingestion.

use crate::{
  Error, Result,
  index::{IndexDocument, ItemMetadata, SearchIndex, is_indexable},
  item::{IncomingItem, InsertOutcome, NewItem},
  store::ItemStore,
};

/// Ingest one feed record.
pub async fn ingest<S, I>(store: &S, index: &I, incoming: IncomingItem) -> Result<InsertOutcome>
where
  S: ItemStore,
  I: SearchIndex,
{
  insert_and_mirror(store, index, incoming.into_new_item()).await
}

/// Insert an already-parsed item and, if it is new, push it to the index.
pub async fn insert_and_mirror<S, I>(store: &S, index: &I, item: NewItem) -> Result<InsertOutcome>
where
  S: ItemStore,
  I: SearchIndex,
{
  let outcome = store.insert(item.clone()).await.map_err(Error::store)?;

  let id = match outcome {
    InsertOutcome::Inserted { id } => id,
    InsertOutcome::AlreadyExists => {
      tracing::info!(
        source_identity = %item.source_identity,
        "duplicate item prevented by store constraint"
      );
      return Ok(outcome);
    }
  };
  tracing::info!(%id, "item saved");

  if !is_indexable(&item.body_text) {
    return Ok(outcome);
  }

  let document = IndexDocument {
    id:       id.to_string(),
    text:     item.body_text,
    metadata: ItemMetadata {
      item_id:          id,
      source_identity:  item.source_identity,
      source_reference: item.source_reference,
      raw_timestamp:    item.raw_timestamp,
      parsed_timestamp: item.parsed_timestamp,
    },
  };

  match index.add_documents(vec![document]).await {
    Ok(()) => tracing::debug!(%id, "item added to index"),
    Err(e) => tracing::warn!(%id, error = %e, "failed to add item to index, leaving it for the next sync"),
  }

  Ok(outcome)
}
