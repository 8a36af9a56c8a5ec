//! Process-local document store.
//!
//! Databases live in a process-wide registry keyed by `host/database`, so
//! every driver dialed with the same configuration sees the same documents
//! until the process exits. Useful for tests and for running the service
//! without a database on disk.

use std::{
  collections::HashMap,
  sync::{Arc, LazyLock, Mutex},
};

use rand_core::{OsRng, RngCore as _};
use serde_json::Value;
use tokio::sync::RwLock;
use warden_core::{
  document::{Document, Filter, ID_FIELD, Patch, unique_key_filter},
  store::{DocumentStore, StoreConfig, StoreError, validate_collection},
};

type Collections = HashMap<String, Vec<Document>>;
type Database = Arc<RwLock<Collections>>;

static REGISTRY: LazyLock<Mutex<HashMap<String, Database>>> =
  LazyLock::new(|| Mutex::new(HashMap::new()));

fn registry_key(config: &StoreConfig) -> String {
  format!("{}/{}", config.host, config.database)
}

fn doc_id(doc: &Document) -> Option<&str> { doc.get(ID_FIELD).and_then(Value::as_str) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// A [`DocumentStore`] holding documents in process memory.
pub struct MemoryDocStore {
  config: StoreConfig,
  db:     Option<Database>,
}

impl MemoryDocStore {
  pub fn new(config: StoreConfig) -> Self { Self { config, db: None } }

  fn db(&self) -> Result<&Database, StoreError> {
    self.db.as_ref().ok_or(StoreError::NotConnected)
  }

  /// Insert under the write guard, refusing a clash on `unique` when set.
  async fn insert_guarded(
    &self,
    collection: &str,
    mut document: Document,
    unique: Option<&str>,
  ) -> Result<u64, StoreError> {
    validate_collection(collection)?;
    if document.is_empty() {
      return Err(StoreError::InvalidDocument("empty document".into()));
    }
    let clash = unique.map(|key| unique_key_filter(&document, key)).transpose()?;
    let id = match document.get(ID_FIELD) {
      None => {
        let id = uuid::Uuid::new_v4().hyphenated().to_string();
        document.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
        id
      }
      Some(Value::String(id)) if !id.is_empty() => id.clone(),
      Some(_) => {
        return Err(StoreError::InvalidDocument("_id must be a non-empty string".into()));
      }
    };

    let mut db = self.db()?.write().await;
    let docs = db.entry(collection.to_owned()).or_default();
    if docs.iter().any(|d| doc_id(d) == Some(id.as_str())) {
      return Err(StoreError::Query {
        operation:  "insert",
        collection: collection.to_owned(),
        source:     format!("duplicate _id {id:?}").into(),
      });
    }
    if let (Some(key), Some(clash)) = (unique, &clash)
      && docs.iter().any(|d| clash.matches(d))
    {
      return Err(StoreError::Duplicate { collection: collection.to_owned(), key: key.to_owned() });
    }
    docs.push(document);
    Ok(1)
  }
}

/// Uniform draw from `0..bound` by rejection, avoiding modulo bias.
fn uniform_below(bound: usize) -> usize {
  let bound = bound as u64;
  let zone = u64::MAX - u64::MAX % bound;
  loop {
    let v = OsRng.next_u64();
    if v < zone {
      return (v % bound) as usize;
    }
  }
}

impl DocumentStore for MemoryDocStore {
  type Error = StoreError;

  async fn connect(&mut self) -> Result<(), StoreError> {
    validate_collection(&self.config.collection)?;
    validate_collection(&self.config.archive)?;
    if self.db.is_some() {
      return Ok(());
    }

    let db = {
      let mut registry = REGISTRY
        .lock()
        .map_err(|_| StoreError::Connection("memory registry poisoned".into()))?;
      registry.entry(registry_key(&self.config)).or_default().clone()
    };
    self.db = Some(db);
    tracing::debug!(key = %registry_key(&self.config), "memory document store connected");
    Ok(())
  }

  fn disconnect(&mut self) {
    if self.db.take().is_some() {
      tracing::debug!(key = %registry_key(&self.config), "memory document store disconnected");
    }
  }

  fn is_connected(&self) -> bool { self.db.is_some() }

  fn config(&self) -> &StoreConfig { &self.config }

  async fn insert(&self, collection: &str, document: Document) -> Result<u64, StoreError> {
    self.insert_guarded(collection, document, None).await
  }

  async fn insert_unique(
    &self,
    collection: &str,
    document: Document,
    key: &str,
  ) -> Result<u64, StoreError> {
    self.insert_guarded(collection, document, Some(key)).await
  }

  async fn update(
    &self,
    collection: &str,
    filter: &Filter,
    patch: &Patch,
  ) -> Result<u64, StoreError> {
    validate_collection(collection)?;
    patch.validate()?;
    filter.validate()?;

    let mut db = self.db()?.write().await;
    let Some(docs) = db.get_mut(collection) else {
      return Ok(0);
    };
    let mut updated = 0;
    for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
      patch.apply(doc);
      updated += 1;
    }
    Ok(updated)
  }

  async fn remove(&self, collection: &str, id: &str, soft_delete: bool) -> Result<u64, StoreError> {
    validate_collection(collection)?;
    if id.is_empty() {
      return Err(StoreError::InvalidFilter("empty document id".into()));
    }

    // One write guard covers both steps, so readers never observe the
    // document in both collections or in neither.
    let mut db = self.db()?.write().await;
    let Some(pos) = db
      .get(collection)
      .and_then(|docs| docs.iter().position(|d| doc_id(d) == Some(id)))
    else {
      return Ok(0);
    };

    if soft_delete {
      let copy = db[collection][pos].clone();
      let archive = db.entry(self.config.archive.clone()).or_default();
      archive.retain(|d| doc_id(d) != Some(id));
      archive.push(copy);
    }
    if let Some(docs) = db.get_mut(collection) {
      docs.remove(pos);
    }
    tracing::debug!(collection, soft_delete, "document removed");
    Ok(1)
  }

  async fn find_one(
    &self,
    collection: &str,
    filter: &Filter,
  ) -> Result<Option<Document>, StoreError> {
    validate_collection(collection)?;
    filter.validate()?;
    let db = self.db()?.read().await;
    Ok(
      db.get(collection)
        .and_then(|docs| docs.iter().find(|d| filter.matches(d)))
        .cloned(),
    )
  }

  async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
    validate_collection(collection)?;
    filter.validate()?;
    let db = self.db()?.read().await;
    Ok(
      db.get(collection)
        .map(|docs| docs.iter().filter(|d| filter.matches(d)).count() as u64)
        .unwrap_or(0),
    )
  }

  async fn sample(&self, collection: &str, size: i64) -> Result<Vec<String>, StoreError> {
    validate_collection(collection)?;
    let db = self.db()?.read().await;
    if size <= 0 {
      return Ok(vec![]);
    }

    let mut ids: Vec<String> = db
      .get(collection)
      .map(|docs| docs.iter().filter_map(doc_id).map(str::to_owned).collect())
      .unwrap_or_default();
    // Partial Fisher-Yates over the first `size` slots.
    let take = ids.len().min(size as usize);
    for i in 0..take {
      let j = i + uniform_below(ids.len() - i);
      ids.swap(i, j);
    }
    ids.truncate(take);
    Ok(ids)
  }

  async fn filter_ids(&self, collection: &str, filter: &Filter) -> Result<Vec<String>, StoreError> {
    validate_collection(collection)?;
    filter.validate()?;
    let db = self.db()?.read().await;
    let ids: Vec<String> = db
      .get(collection)
      .map(|docs| {
        docs
          .iter()
          .filter(|d| filter.matches(d))
          .filter_map(doc_id)
          .map(str::to_owned)
          .collect()
      })
      .unwrap_or_default();

    if ids.is_empty() {
      return Err(StoreError::EmptyResult { collection: collection.to_owned() });
    }
    Ok(ids)
  }
}
