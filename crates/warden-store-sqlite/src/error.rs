//! Error type for `warden-store-sqlite`.

use thiserror::Error;
use warden_core::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
  /// Argument validation and connection-state failures.
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("failed to open database {path}: {source}")]
  Open {
    path:   String,
    #[source]
    source: tokio_rusqlite::Error,
  },

  #[error("database error during {operation} on {collection:?}: {source}")]
  Database {
    operation:  &'static str,
    collection: String,
    #[source]
    source:     tokio_rusqlite::Error,
  },

  #[error("{operation} timed out")]
  Timeout { operation: &'static str },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for StoreError {
  fn from(e: Error) -> Self {
    match e {
      Error::Store(inner) => inner,
      Error::Open { path, source } => {
        StoreError::Connection(format!("{path}: {source}"))
      }
      Error::Database { operation, collection, source } => StoreError::Query {
        operation,
        collection,
        source: Box::new(source),
      },
      Error::Timeout { operation } => StoreError::Timeout { operation },
      Error::Json(source) => StoreError::Query {
        operation:  "decode",
        collection: String::new(),
        source:     Box::new(source),
      },
    }
  }
}
