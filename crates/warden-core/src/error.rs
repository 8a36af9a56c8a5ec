//! Error types for `warden-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The clear-text password does not reduce to the stored hash.
  #[error("password does not match")]
  Mismatch,

  /// The stored credential is not a parseable PHC string.
  #[error("malformed credential hash: {0}")]
  MalformedHash(String),

  #[error("password hashing failed: {0}")]
  Hashing(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
