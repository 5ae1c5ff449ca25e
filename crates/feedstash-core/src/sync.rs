//! Incremental projection of stored items into the search index.
//!
//! The index's own metadata is the only record of how far synchronization
//! has progressed. Each pass recomputes the high-water mark (the largest
//! item id present in the index), pages through newer items in id order,
//! and pushes them in batches no larger than the index accepts. Pushes are
//! upserts keyed by item id, so re-pushing after a partial failure is
//! harmless.

use serde::Serialize;

use crate::{
  Error, Result,
  index::{IndexDocument, SearchIndex, is_indexable},
  item::ItemId,
  store::ItemStore,
};

/// Batch size used when none is configured. Matches the usual limit of
/// hosted text-embedding servers.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// Outcome of one [`IndexSynchronizer::synchronize`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
  /// High-water mark observed at the start of the pass.
  pub starting_mark:      Option<ItemId>,
  /// Documents successfully pushed.
  pub pushed:             usize,
  /// Items skipped because they have no text.
  pub skipped_empty:      usize,
  /// Batches successfully pushed.
  pub batches:            usize,
  /// First item id of the batch that failed, if the pass stopped early.
  pub failed_batch_start: Option<ItemId>,
}

impl SyncReport {
  pub fn aborted(&self) -> bool { self.failed_batch_start.is_some() }
}

/// The largest item id present in `index`, or `None` if it is empty.
///
/// Recomputed from the index contents on every call.
pub async fn high_water_mark<I: SearchIndex>(index: &I) -> Result<Option<ItemId>> {
  let metadata = index.stored_metadata().await.map_err(Error::index)?;
  Ok(metadata.iter().map(|m| m.item_id).max())
}

/// Catches a [`SearchIndex`] up with an [`ItemStore`].
///
/// Owns no state of its own beyond the configured batch size.
pub struct IndexSynchronizer<'a, S, I> {
  store:      &'a S,
  index:      &'a I,
  batch_size: usize,
}

impl<'a, S, I> IndexSynchronizer<'a, S, I>
where
  S: ItemStore,
  I: SearchIndex,
{
  pub fn new(store: &'a S, index: &'a I) -> Self {
    Self { store, index, batch_size: DEFAULT_BATCH_SIZE }
  }

  /// Use at most `batch_size` documents per push. The index's own limit
  /// still applies.
  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  fn effective_batch_size(&self) -> usize {
    self.batch_size.min(self.index.max_batch_size()).max(1)
  }

  /// See [`high_water_mark`].
  pub async fn high_water_mark(&self) -> Result<Option<ItemId>> {
    high_water_mark(self.index).await
  }

  /// Push every item newer than the high-water mark into the index.
  ///
  /// A failed batch stops the pass; the report says where. Nothing already
  /// pushed is removed, and the next pass resumes from the true mark.
  /// Only store failures are returned as errors.
  pub async fn synchronize(&self) -> Result<SyncReport> {
    let starting_mark = match self.high_water_mark().await {
      Ok(mark) => mark,
      Err(e) => {
        tracing::warn!(error = %e, "failed to read index high-water mark, starting from the beginning");
        None
      }
    };

    match starting_mark {
      Some(mark) => tracing::info!(%mark, "index contains items up to high-water mark, resuming"),
      None => tracing::info!("index is empty, populating from the beginning"),
    }

    let batch_size = self.effective_batch_size();
    let mut report = SyncReport { starting_mark, ..Default::default() };
    let mut cursor = starting_mark;
    let mut exhausted = false;
    let mut queued: Vec<IndexDocument> = Vec::new();

    loop {
      // Top the queue up to a full batch; items without text don't count.
      while !exhausted && queued.len() < batch_size {
        let page = self
          .store
          .items_after(cursor, batch_size)
          .await
          .map_err(Error::store)?;

        exhausted = page.len() < batch_size;
        let Some(last) = page.last() else { break };
        cursor = Some(last.id);

        let before = queued.len();
        queued.extend(
          page
            .iter()
            .filter(|item| is_indexable(&item.body_text))
            .map(IndexDocument::from),
        );
        report.skipped_empty += page.len() - (queued.len() - before);
      }

      if queued.is_empty() {
        break;
      }

      let batch: Vec<IndexDocument> = queued.drain(..queued.len().min(batch_size)).collect();
      let first = batch[0].metadata.item_id;
      let count = batch.len();
      if let Err(e) = self.index.add_documents(batch).await {
        tracing::error!(
          error = %e,
          first_item = %first,
          count,
          "failed to push batch to index, stopping this pass"
        );
        report.failed_batch_start = Some(first);
        return Ok(report);
      }
      report.batches += 1;
      report.pushed += count;
      tracing::debug!(first_item = %first, count, "pushed batch to index");
    }

    if report.pushed == 0 {
      tracing::info!("no new items to add to the index");
    } else {
      tracing::info!(
        pushed = report.pushed,
        batches = report.batches,
        "added new items to the index"
      );
    }
    Ok(report)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeIndex, FakeStore, item};

  fn ids(range: std::ops::RangeInclusive<i64>) -> Vec<ItemId> {
    range.map(ItemId).collect()
  }

  #[tokio::test]
  async fn empty_index_has_no_high_water_mark() {
    let store = FakeStore::with_items((1..=3).map(|i| item(i, "text")));
    let index = FakeIndex::new(32);
    let sync = IndexSynchronizer::new(&store, &index);
    assert_eq!(sync.high_water_mark().await.unwrap(), None);
  }

  #[tokio::test]
  async fn resumes_from_high_water_mark() {
    let store = FakeStore::with_items((1..=10).map(|i| item(i, "text")));
    let index = FakeIndex::new(32);
    index.preload((1..=7).map(|i| item(i, "text")));

    let sync = IndexSynchronizer::new(&store, &index);
    assert_eq!(sync.high_water_mark().await.unwrap(), Some(ItemId(7)));

    let report = sync.synchronize().await.unwrap();
    assert_eq!(report.starting_mark, Some(ItemId(7)));
    assert_eq!(report.pushed, 3);
    assert_eq!(index.pushed_ids(), ids(8..=10));

    // A second pass is a no-op.
    let report = sync.synchronize().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.starting_mark, Some(ItemId(10)));
    assert_eq!(index.pushed_ids(), ids(8..=10));
  }

  #[tokio::test]
  async fn batches_respect_index_limit() {
    let store = FakeStore::with_items((1..=70).map(|i| item(i, "text")));
    let index = FakeIndex::new(32);

    let report = IndexSynchronizer::new(&store, &index)
      .with_batch_size(100)
      .synchronize()
      .await
      .unwrap();

    assert_eq!(report.pushed, 70);
    assert_eq!(report.batches, 3);
    assert_eq!(index.batch_sizes(), vec![32, 32, 6]);
    assert_eq!(index.pushed_ids(), ids(1..=70));
  }

  #[tokio::test]
  async fn configured_batch_size_below_index_limit_is_used() {
    let store = FakeStore::with_items((1..=10).map(|i| item(i, "text")));
    let index = FakeIndex::new(32);

    IndexSynchronizer::new(&store, &index)
      .with_batch_size(4)
      .synchronize()
      .await
      .unwrap();

    assert_eq!(index.batch_sizes(), vec![4, 4, 2]);
  }

  #[tokio::test]
  async fn skips_items_without_text() {
    let store = FakeStore::with_items(vec![
      item(1, "one"),
      item(2, ""),
      item(3, "   "),
      item(4, "four"),
    ]);
    let index = FakeIndex::new(32);

    let report = IndexSynchronizer::new(&store, &index).synchronize().await.unwrap();
    assert_eq!(report.pushed, 2);
    assert_eq!(report.skipped_empty, 2);
    assert_eq!(index.pushed_ids(), vec![ItemId(1), ItemId(4)]);
  }

  #[tokio::test]
  async fn batches_are_filled_past_empty_items() {
    let store = FakeStore::with_items((1..=12).map(|i| {
      if matches!(i, 2 | 3 | 6) { item(i, "") } else { item(i, "text") }
    }));
    let index = FakeIndex::new(4);

    let report = IndexSynchronizer::new(&store, &index).synchronize().await.unwrap();
    assert_eq!(report.skipped_empty, 3);
    assert_eq!(report.pushed, 9);
    assert_eq!(index.batch_sizes(), vec![4, 4, 1]);
    assert_eq!(
      index.pushed_ids(),
      [1, 4, 5, 7, 8, 9, 10, 11, 12].map(ItemId).to_vec()
    );
  }

  #[tokio::test]
  async fn high_water_mark_is_largest_indexed_id() {
    let store = FakeStore::with_items(std::iter::empty());
    let index = FakeIndex::new(32);
    assert_eq!(high_water_mark(&index).await.unwrap(), None);

    index.preload([item(3, "c"), item(9, "i"), item(5, "e")]);
    assert_eq!(high_water_mark(&index).await.unwrap(), Some(ItemId(9)));
    assert_eq!(
      IndexSynchronizer::new(&store, &index).high_water_mark().await.unwrap(),
      Some(ItemId(9))
    );
  }

  #[tokio::test]
  async fn failed_batch_stops_pass_and_next_pass_resumes() {
    let store = FakeStore::with_items((1..=10).map(|i| item(i, "text")));
    let index = FakeIndex::new(4);
    index.fail_on_push(2);

    let sync = IndexSynchronizer::new(&store, &index);
    let report = sync.synchronize().await.unwrap();
    assert!(report.aborted());
    assert_eq!(report.failed_batch_start, Some(ItemId(5)));
    assert_eq!(report.pushed, 4);
    assert_eq!(index.stored_ids(), ids(1..=4));

    let report = sync.synchronize().await.unwrap();
    assert!(!report.aborted());
    assert_eq!(report.starting_mark, Some(ItemId(4)));
    assert_eq!(report.pushed, 6);
    assert_eq!(index.stored_ids(), ids(1..=10));
  }

  #[tokio::test]
  async fn unreadable_index_restarts_from_beginning_without_duplicates() {
    let store = FakeStore::with_items((1..=5).map(|i| item(i, "text")));
    let index = FakeIndex::new(32);
    index.preload((1..=3).map(|i| item(i, "text")));
    index.fail_metadata_scan();

    let report = IndexSynchronizer::new(&store, &index).synchronize().await.unwrap();
    assert_eq!(report.starting_mark, None);
    assert_eq!(report.pushed, 5);
    assert_eq!(index.stored_ids(), ids(1..=5));
  }

  #[tokio::test]
  async fn store_failure_is_an_error() {
    let store = FakeStore::with_items((1..=5).map(|i| item(i, "text")));
    store.fail_reads();
    let index = FakeIndex::new(32);

    let err = IndexSynchronizer::new(&store, &index).synchronize().await.unwrap_err();
    assert!(matches!(err, Error::Store(_)));
    assert!(index.stored_ids().is_empty());
  }
}
