//! In-memory fakes for the store and index traits, used by unit tests.

use std::{
  collections::BTreeMap,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
  index::{IndexDocument, IndexMatch, ItemMetadata, SearchIndex},
  item::{InsertOutcome, Item, ItemId, NewItem},
  query::{ItemFilter, ItemQuery},
  store::ItemStore,
};

#[derive(Debug, thiserror::Error)]
#[error("fake failure: {0}")]
pub struct FakeError(&'static str);

fn epoch() -> NaiveDateTime {
  NaiveDate::from_ymd_opt(2024, 1, 1)
    .and_then(|d| d.and_hms_opt(0, 0, 0))
    .unwrap()
}

pub fn item(id: i64, body: &str) -> Item {
  Item {
    id:               ItemId(id),
    source_identity:  format!("user{id}"),
    source_reference: format!("https://example.com/{id}"),
    raw_timestamp:    "2024-01-01".into(),
    parsed_timestamp: Some("2024-01-01T00:00:00".into()),
    body_text:        body.into(),
    received_at:      epoch(),
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeStore {
  items:      Mutex<Vec<Item>>,
  fail_reads: AtomicBool,
}

impl FakeStore {
  pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
    Self { items: Mutex::new(items.into_iter().collect()), ..Default::default() }
  }

  pub fn fail_reads(&self) { self.fail_reads.store(true, Ordering::SeqCst); }

  pub fn len(&self) -> usize { self.items.lock().unwrap().len() }
}

impl ItemStore for FakeStore {
  type Error = FakeError;

  async fn insert(&self, new: NewItem) -> Result<InsertOutcome, FakeError> {
    let mut items = self.items.lock().unwrap();
    let duplicate = items.iter().any(|i| {
      i.source_identity == new.source_identity
        && i.source_reference == new.source_reference
        && i.body_text == new.body_text
    });
    if duplicate {
      return Ok(InsertOutcome::AlreadyExists);
    }
    let id = ItemId(items.iter().map(|i| i.id.0).max().unwrap_or(0) + 1);
    items.push(Item {
      id,
      source_identity: new.source_identity,
      source_reference: new.source_reference,
      raw_timestamp: new.raw_timestamp,
      parsed_timestamp: new.parsed_timestamp,
      body_text: new.body_text,
      received_at: epoch(),
    });
    Ok(InsertOutcome::Inserted { id })
  }

  async fn query(&self, query: &ItemQuery) -> Result<Vec<Item>, FakeError> {
    let items = self.items.lock().unwrap();
    Ok(
      items
        .iter()
        .filter(|i| match &query.filter {
          None => true,
          Some(ItemFilter::Text(t)) => i.body_text.contains(t.as_str()),
          Some(ItemFilter::Author(a)) => i.source_identity.contains(a.as_str()),
        })
        .take(query.limit.get() as usize)
        .cloned()
        .collect(),
    )
  }

  async fn items_after(
    &self,
    after: Option<ItemId>,
    limit: usize,
  ) -> Result<Vec<Item>, FakeError> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(FakeError("store read"));
    }
    let mut items: Vec<Item> = self
      .items
      .lock()
      .unwrap()
      .iter()
      .filter(|i| after.is_none_or(|a| i.id > a))
      .cloned()
      .collect();
    items.sort_by_key(|i| i.id);
    items.truncate(limit);
    Ok(items)
  }
}

// ─── Index ───────────────────────────────────────────────────────────────────

pub struct FakeIndex {
  max_batch:     usize,
  docs:          Mutex<BTreeMap<ItemId, IndexDocument>>,
  pushes:        Mutex<Vec<Vec<ItemId>>>,
  calls:         AtomicUsize,
  fail_on_call:  Mutex<Option<usize>>,
  fail_metadata: AtomicBool,
  fail_all:      AtomicBool,
}

impl FakeIndex {
  pub fn new(max_batch: usize) -> Self {
    Self {
      max_batch,
      docs: Mutex::default(),
      pushes: Mutex::default(),
      calls: AtomicUsize::new(0),
      fail_on_call: Mutex::new(None),
      fail_metadata: AtomicBool::new(false),
      fail_all: AtomicBool::new(false),
    }
  }

  /// Store documents directly, without recording a push.
  pub fn preload(&self, items: impl IntoIterator<Item = Item>) {
    let mut docs = self.docs.lock().unwrap();
    for item in items {
      docs.insert(item.id, IndexDocument::from(&item));
    }
  }

  /// Fail the `n`th push (1-based), once.
  pub fn fail_on_push(&self, n: usize) { *self.fail_on_call.lock().unwrap() = Some(n); }

  pub fn fail_every_push(&self) { self.fail_all.store(true, Ordering::SeqCst); }

  pub fn fail_metadata_scan(&self) { self.fail_metadata.store(true, Ordering::SeqCst); }

  pub fn pushed_ids(&self) -> Vec<ItemId> {
    self.pushes.lock().unwrap().iter().flatten().copied().collect()
  }

  pub fn batch_sizes(&self) -> Vec<usize> {
    self.pushes.lock().unwrap().iter().map(Vec::len).collect()
  }

  pub fn stored_ids(&self) -> Vec<ItemId> {
    self.docs.lock().unwrap().keys().copied().collect()
  }
}

impl SearchIndex for FakeIndex {
  type Error = FakeError;

  fn max_batch_size(&self) -> usize { self.max_batch }

  async fn add_documents(&self, documents: Vec<IndexDocument>) -> Result<(), FakeError> {
    let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
    if documents.len() > self.max_batch {
      return Err(FakeError("batch too large"));
    }
    if self.fail_all.load(Ordering::SeqCst) {
      return Err(FakeError("push"));
    }
    {
      let mut fail_on = self.fail_on_call.lock().unwrap();
      if *fail_on == Some(call) {
        *fail_on = None;
        return Err(FakeError("push"));
      }
    }

    let ids = documents.iter().map(|d| d.metadata.item_id).collect();
    let mut docs = self.docs.lock().unwrap();
    for doc in documents {
      docs.insert(doc.metadata.item_id, doc);
    }
    self.pushes.lock().unwrap().push(ids);
    Ok(())
  }

  async fn stored_metadata(&self) -> Result<Vec<ItemMetadata>, FakeError> {
    if self.fail_metadata.swap(false, Ordering::SeqCst) {
      return Err(FakeError("metadata scan"));
    }
    Ok(self.docs.lock().unwrap().values().map(|d| d.metadata.clone()).collect())
  }

  async fn query(&self, text: &str, limit: usize) -> Result<Vec<IndexMatch>, FakeError> {
    Ok(
      self
        .docs
        .lock()
        .unwrap()
        .values()
        .filter(|d| d.text.contains(text))
        .take(limit)
        .map(|d| IndexMatch {
          id:       d.id.clone(),
          text:     d.text.clone(),
          metadata: d.metadata.clone(),
          distance: 0.0,
        })
        .collect(),
    )
  }
}
