//! Driver factory.
//!
//! [`create_and_connect`] turns a [`StoreConfig`] into a connected driver
//! wrapped in a [`Lease`]. The lease disconnects when it goes out of scope,
//! so every exit path of a request releases its connection.

use std::ops::Deref;

use warden_core::{
  document::{Document, Filter, Patch},
  store::{DocumentStore, DriverKind, StoreConfig, StoreError},
};
use warden_store_memory::MemoryDocStore;
use warden_store_sqlite::SqliteDocStore;

// ─── AnyStore ────────────────────────────────────────────────────────────────

/// Every driver this build knows about, selected by [`DriverKind`].
pub enum AnyStore {
  Sqlite(SqliteDocStore),
  Memory(MemoryDocStore),
}

impl AnyStore {
  /// Build the driver named by `config.driver`, disconnected.
  pub fn new(config: StoreConfig) -> Self {
    match config.driver {
      DriverKind::Sqlite => Self::Sqlite(SqliteDocStore::new(config)),
      DriverKind::Memory => Self::Memory(MemoryDocStore::new(config)),
    }
  }

  pub fn kind(&self) -> DriverKind {
    match self {
      Self::Sqlite(_) => DriverKind::Sqlite,
      Self::Memory(_) => DriverKind::Memory,
    }
  }
}

/// Forward a call to whichever driver is active, normalising its error.
macro_rules! dispatch {
  ($self:ident, $store:ident => $call:expr) => {
    match $self {
      AnyStore::Sqlite($store) => $call.await.map_err(Into::<StoreError>::into),
      AnyStore::Memory($store) => $call.await,
    }
  };
}

impl DocumentStore for AnyStore {
  type Error = StoreError;

  async fn connect(&mut self) -> Result<(), StoreError> {
    dispatch!(self, s => s.connect())
  }

  fn disconnect(&mut self) {
    match self {
      Self::Sqlite(s) => s.disconnect(),
      Self::Memory(s) => s.disconnect(),
    }
  }

  fn is_connected(&self) -> bool {
    match self {
      Self::Sqlite(s) => s.is_connected(),
      Self::Memory(s) => s.is_connected(),
    }
  }

  fn config(&self) -> &StoreConfig {
    match self {
      Self::Sqlite(s) => s.config(),
      Self::Memory(s) => s.config(),
    }
  }

  async fn insert(&self, collection: &str, document: Document) -> Result<u64, StoreError> {
    dispatch!(self, s => s.insert(collection, document))
  }

  async fn insert_unique(
    &self,
    collection: &str,
    document: Document,
    key: &str,
  ) -> Result<u64, StoreError> {
    dispatch!(self, s => s.insert_unique(collection, document, key))
  }

  async fn update(
    &self,
    collection: &str,
    filter: &Filter,
    patch: &Patch,
  ) -> Result<u64, StoreError> {
    dispatch!(self, s => s.update(collection, filter, patch))
  }

  async fn remove(&self, collection: &str, id: &str, soft_delete: bool) -> Result<u64, StoreError> {
    dispatch!(self, s => s.remove(collection, id, soft_delete))
  }

  async fn find_one(
    &self,
    collection: &str,
    filter: &Filter,
  ) -> Result<Option<Document>, StoreError> {
    dispatch!(self, s => s.find_one(collection, filter))
  }

  async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
    dispatch!(self, s => s.count(collection, filter))
  }

  async fn sample(&self, collection: &str, size: i64) -> Result<Vec<String>, StoreError> {
    dispatch!(self, s => s.sample(collection, size))
  }

  async fn filter_ids(&self, collection: &str, filter: &Filter) -> Result<Vec<String>, StoreError> {
    dispatch!(self, s => s.filter_ids(collection, filter))
  }
}

// ─── Lease ───────────────────────────────────────────────────────────────────

/// A connected driver that disconnects when dropped.
pub struct Lease<S: DocumentStore> {
  store: S,
}

impl<S: DocumentStore> Lease<S> {
  /// Dial `store`. On failure the driver is dropped and only the error is
  /// returned.
  pub async fn acquire(mut store: S) -> Result<Self, StoreError> {
    store.connect().await.map_err(Into::<StoreError>::into)?;
    Ok(Self { store })
  }

  /// Disconnect now rather than at end of scope.
  pub fn release(self) { drop(self) }
}

impl<S: DocumentStore> Deref for Lease<S> {
  type Target = S;

  fn deref(&self) -> &S { &self.store }
}

impl<S: DocumentStore> Drop for Lease<S> {
  fn drop(&mut self) {
    self.store.disconnect();
    tracing::trace!(host = %self.store.config().host, "store lease released");
  }
}

/// Build the configured driver and dial it.
pub async fn create_and_connect(config: &StoreConfig) -> Result<Lease<AnyStore>, StoreError> {
  Lease::acquire(AnyStore::new(config.clone()))
    .await
    .inspect_err(|e| tracing::warn!(driver = ?config.driver, error = %e, "store dial failed"))
}
