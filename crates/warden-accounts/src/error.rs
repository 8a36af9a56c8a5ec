//! Error type for `warden-accounts`.
//!
//! Every failure carries a stable [`ErrorKind`] and a short message that is
//! safe to show to clients. The `Display` output may contain driver detail
//! and is meant for logs only.

use thiserror::Error;
use warden_core::store::StoreError;

/// The stable classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  InvalidParam,
  NotFound,
  DuplicateResource,
  Unauthorized,
  InvalidToken,
  ConnectionFailure,
  QueryFailure,
  EmptyResult,
  Binding,
  Internal,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid parameter: {0}")]
  InvalidParam(String),

  #[error("{0} not found")]
  NotFound(String),

  #[error("account {0:?} already exists")]
  DuplicateResource(String),

  /// The clear-text password did not match the stored credential.
  #[error("credentials rejected")]
  Unauthorized,

  #[error("invalid token: {0}")]
  InvalidToken(String),

  /// An insert succeeded but the record could not be read back.
  #[error("inserted account {email:?} could not be read back")]
  Consistency { email: String },

  #[error("stored account cannot be decoded: {0}")]
  Binding(String),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error("internal error: {0}")]
  Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidParam(_) | Self::Consistency { .. } => ErrorKind::InvalidParam,
      Self::NotFound(_) => ErrorKind::NotFound,
      Self::DuplicateResource(_) => ErrorKind::DuplicateResource,
      Self::Unauthorized => ErrorKind::Unauthorized,
      Self::InvalidToken(_) => ErrorKind::InvalidToken,
      Self::Binding(_) => ErrorKind::Binding,
      Self::Internal(_) => ErrorKind::Internal,
      Self::Store(e) => match e {
        StoreError::InvalidCollection(_)
        | StoreError::InvalidDocument(_)
        | StoreError::InvalidFilter(_) => ErrorKind::InvalidParam,
        StoreError::NotConnected | StoreError::Connection(_) | StoreError::Timeout { .. } => {
          ErrorKind::ConnectionFailure
        }
        StoreError::EmptyResult { .. } => ErrorKind::EmptyResult,
        StoreError::Duplicate { .. } => ErrorKind::DuplicateResource,
        StoreError::Query { .. } => ErrorKind::QueryFailure,
      },
    }
  }

  /// A short message that never includes driver errors or credentials.
  pub fn client_message(&self) -> String {
    match self {
      Self::InvalidParam(m) => m.clone(),
      Self::NotFound(what) => format!("{what} not found"),
      Self::DuplicateResource(_) => "an account with this email already exists".into(),
      Self::Unauthorized => "invalid email or password".into(),
      Self::InvalidToken(_) => "invalid or expired token".into(),
      Self::Consistency { .. } => "account could not be created".into(),
      Self::Binding(_) => "stored account is unreadable".into(),
      Self::Internal(_) => "internal error".into(),
      Self::Store(_) => match self.kind() {
        ErrorKind::InvalidParam => "invalid request".into(),
        ErrorKind::ConnectionFailure => "account database unavailable".into(),
        ErrorKind::EmptyResult => "no matching accounts".into(),
        ErrorKind::DuplicateResource => "an account with this email already exists".into(),
        _ => "account database query failed".into(),
      },
    }
  }
}

impl From<warden_core::Error> for Error {
  fn from(e: warden_core::Error) -> Self {
    use warden_core::Error as Core;
    match e {
      Core::Mismatch => Self::Unauthorized,
      Core::Serialization(e) => Self::Binding(e.to_string()),
      Core::MalformedHash(m) => Self::Internal(format!("stored credential: {m}")),
      Core::Hashing(m) => Self::Internal(m),
    }
  }
}

/// Lift a driver error into the account error space.
pub(crate) fn store<E: Into<StoreError>>(e: E) -> Error { Error::Store(e.into()) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn store_errors_keep_their_kind() {
    let e = Error::from(StoreError::EmptyResult { collection: "users".into() });
    assert_eq!(e.kind(), ErrorKind::EmptyResult);

    let e = Error::from(StoreError::Duplicate { collection: "users".into(), key: "email".into() });
    assert_eq!(e.kind(), ErrorKind::DuplicateResource);

    let e = Error::from(StoreError::Timeout { operation: "find_one" });
    assert_eq!(e.kind(), ErrorKind::ConnectionFailure);

    let e = Error::from(StoreError::Query {
      operation:  "insert",
      collection: "users".into(),
      source:     "disk I/O error at /var/lib/warden".into(),
    });
    assert_eq!(e.kind(), ErrorKind::QueryFailure);
    assert!(!e.client_message().contains("/var/lib"));
  }

  #[test]
  fn consistency_failure_surfaces_as_invalid_param() {
    let e = Error::Consistency { email: "john@doe.com".into() };
    assert_eq!(e.kind(), ErrorKind::InvalidParam);
  }

  #[test]
  fn password_mismatch_is_unauthorized() {
    assert_eq!(Error::from(warden_core::Error::Mismatch).kind(), ErrorKind::Unauthorized);
  }
}
