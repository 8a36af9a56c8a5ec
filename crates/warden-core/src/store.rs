//! The `DocumentStore` trait, its configuration, and the shared error kinds.
//!
//! The trait is implemented by storage drivers (`warden-store-sqlite`,
//! `warden-store-memory`). The account service depends on this abstraction,
//! not on any concrete driver.

use std::{fmt, future::Future, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::document::{Document, Filter, Patch};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Driver-independent failure kinds.
///
/// Every driver error converts into one of these, so callers can branch on
/// the kind without knowing which driver is configured.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("invalid collection name {0:?}")]
  InvalidCollection(String),

  #[error("invalid document: {0}")]
  InvalidDocument(String),

  #[error("invalid filter: {0}")]
  InvalidFilter(String),

  #[error("store is not connected")]
  NotConnected,

  #[error("connection failed: {0}")]
  Connection(String),

  #[error("{operation} timed out")]
  Timeout { operation: &'static str },

  /// Another document already holds the value of a unique key.
  #[error("{collection:?} already holds a document with this {key}")]
  Duplicate { collection: String, key: String },

  /// A well-formed query that matched nothing, where the caller needs to
  /// tell that apart from a failure.
  #[error("no documents in {collection:?} matched")]
  EmptyResult { collection: String },

  #[error("{operation} on {collection:?} failed: {source}")]
  Query {
    operation:  &'static str,
    collection: String,
    #[source]
    source:     Box<dyn std::error::Error + Send + Sync>,
  },
}

/// Collection names are non-empty runs of `[A-Za-z0-9_]`; drivers may use
/// them verbatim as table or namespace identifiers.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
  if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
    Ok(())
  } else {
    Err(StoreError::InvalidCollection(name.to_owned()))
  }
}

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which concrete driver the factory should build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
  /// Documents stored as JSON rows in an SQLite database file.
  #[default]
  Sqlite,
  /// Process-local in-memory document store.
  Memory,
}

fn default_timeout_secs() -> u64 { 3 }

/// Everything a driver needs to dial its backend. Loaded once at startup and
/// never mutated afterwards.
#[derive(Clone, Deserialize)]
pub struct StoreConfig {
  #[serde(default)]
  pub driver:       DriverKind,
  /// Server address, directory, or `:memory:`, depending on the driver.
  pub host:         String,
  pub database:     String,
  #[serde(default)]
  pub username:     String,
  #[serde(default)]
  pub password:     String,
  /// Live collection.
  pub collection:   String,
  /// Archive collection receiving soft-deleted documents.
  pub archive:      String,
  /// Upper bound for dialing and for each individual query.
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl StoreConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl fmt::Debug for StoreConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreConfig")
      .field("driver", &self.driver)
      .field("host", &self.host)
      .field("database", &self.database)
      .field("username", &self.username)
      .field("password", &"<redacted>")
      .field("collection", &self.collection)
      .field("archive", &self.archive)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a document database driver.
///
/// A driver is constructed from a [`StoreConfig`] in a disconnected state,
/// dialed once with [`connect`](Self::connect), and released with
/// [`disconnect`](Self::disconnect). Every query issued while disconnected
/// fails with [`StoreError::NotConnected`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait DocumentStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static + Into<StoreError>;

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// Establish a live session. Fails with a connection error if the target
  /// is unreachable within the configured timeout.
  fn connect(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Release all resources. A no-op on a closed connection.
  fn disconnect(&mut self);

  fn is_connected(&self) -> bool;

  /// The configuration this driver was built from.
  fn config(&self) -> &StoreConfig;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert one document and return the number inserted. The driver assigns
  /// `_id` when the document does not carry one.
  fn insert<'a>(
    &'a self,
    collection: &'a str,
    document: Document,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Insert one document unless another document in `collection` already
  /// holds the same value at the top-level field `key`. The check and the
  /// write are atomic; a clash is [`StoreError::Duplicate`] and writes
  /// nothing.
  fn insert_unique<'a>(
    &'a self,
    collection: &'a str,
    document: Document,
    key: &'a str,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Overwrite the patched fields of every document matching `filter`.
  /// Returns the number of documents matched.
  fn update<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
    patch: &'a Patch,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Delete the document with the given id.
  ///
  /// With `soft_delete`, a verbatim copy is written to the archive
  /// collection first and the live delete only happens once that write has
  /// succeeded. A missing id affects nothing and returns `Ok(0)`.
  fn remove<'a>(
    &'a self,
    collection: &'a str,
    id: &'a str,
    soft_delete: bool,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The first document matching `filter`, or `None`.
  fn find_one<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + 'a;

  fn count<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + 'a;

  /// Up to `size` randomly chosen document ids. A `size` of zero or less
  /// yields an empty sample, not an error.
  fn sample<'a>(
    &'a self,
    collection: &'a str,
    size: i64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;

  /// Ids of every document matching `filter`. An empty match set is
  /// reported as [`StoreError::EmptyResult`].
  fn filter_ids<'a>(
    &'a self,
    collection: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + 'a;
}
