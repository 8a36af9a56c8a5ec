//! Documents and the value types used to query and patch them.
//!
//! A [`Filter`] is a plain predicate value rather than a callback: call sites
//! build a fresh one per invocation, drivers translate it into their native
//! query language, and it can be evaluated directly against a [`Document`]
//! for drivers (and tests) that have no query language of their own.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::StoreError;

/// A schemaless JSON document as held by a store.
pub type Document = serde_json::Map<String, Value>;

/// The field carrying the store-assigned identifier of every document.
pub const ID_FIELD: &str = "_id";

/// A dotted path is one or more non-empty segments of `[A-Za-z0-9_]`.
pub fn is_valid_field_path(path: &str) -> bool {
  !path.is_empty() && path.split('.').all(is_valid_field_name)
}

/// A single path segment; also the rule for top-level patch keys.
pub fn is_valid_field_name(name: &str) -> bool {
  !name.is_empty()
    && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Resolve a dotted path inside `doc`.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
  let mut segments = path.split('.');
  let mut current = doc.get(segments.next()?)?;
  for segment in segments {
    current = current.as_object()?.get(segment)?;
  }
  Some(current)
}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A predicate over documents.
///
/// Equality treats a missing field as `null` and compares numbers by value,
/// so `1` and `1.0` are equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
  /// Matches every document.
  All,
  Eq { field: String, value: Value },
  Ne { field: String, value: Value },
  In { field: String, values: Vec<Value> },
  And { clauses: Vec<Filter> },
  Or { clauses: Vec<Filter> },
  Not { clause: Box<Filter> },
}

impl Filter {
  pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::Eq { field: field.into(), value: value.into() }
  }

  pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
    Self::Ne { field: field.into(), value: value.into() }
  }

  pub fn is_in<V: Into<Value>>(
    field: impl Into<String>,
    values: impl IntoIterator<Item = V>,
  ) -> Self {
    Self::In {
      field:  field.into(),
      values: values.into_iter().map(Into::into).collect(),
    }
  }

  /// Match the document whose `_id` is `id`.
  pub fn by_id(id: impl Into<String>) -> Self { Self::eq(ID_FIELD, id.into()) }

  pub fn and(self, other: Filter) -> Self {
    match self {
      Self::And { mut clauses } => {
        clauses.push(other);
        Self::And { clauses }
      }
      first => Self::And { clauses: vec![first, other] },
    }
  }

  pub fn or(self, other: Filter) -> Self {
    match self {
      Self::Or { mut clauses } => {
        clauses.push(other);
        Self::Or { clauses }
      }
      first => Self::Or { clauses: vec![first, other] },
    }
  }

  #[allow(clippy::should_implement_trait)]
  pub fn not(self) -> Self { Self::Not { clause: Box::new(self) } }

  /// Reject empty combinators and malformed field paths.
  pub fn validate(&self) -> Result<(), StoreError> {
    match self {
      Self::All => Ok(()),
      Self::Eq { field, .. } | Self::Ne { field, .. } | Self::In { field, .. } => {
        if is_valid_field_path(field) {
          Ok(())
        } else {
          Err(StoreError::InvalidFilter(format!("invalid field path {field:?}")))
        }
      }
      Self::And { clauses } | Self::Or { clauses } => {
        if clauses.is_empty() {
          return Err(StoreError::InvalidFilter("empty combinator".into()));
        }
        clauses.iter().try_for_each(Filter::validate)
      }
      Self::Not { clause } => clause.validate(),
    }
  }

  /// Evaluate the predicate against `doc`.
  pub fn matches(&self, doc: &Document) -> bool {
    match self {
      Self::All => true,
      Self::Eq { field, value } => values_equal(lookup(doc, field), value),
      Self::Ne { field, value } => !values_equal(lookup(doc, field), value),
      Self::In { field, values } => {
        let found = lookup(doc, field);
        values.iter().any(|v| values_equal(found, v))
      }
      Self::And { clauses } => clauses.iter().all(|c| c.matches(doc)),
      Self::Or { clauses } => clauses.iter().any(|c| c.matches(doc)),
      Self::Not { clause } => !clause.matches(doc),
    }
  }
}

fn values_equal(found: Option<&Value>, expected: &Value) -> bool {
  match (found, expected) {
    (None | Some(Value::Null), Value::Null) => true,
    (None, _) => false,
    (Some(Value::Number(a)), Value::Number(b)) => a.as_f64() == b.as_f64(),
    (Some(a), b) => a == b,
  }
}

/// The filter matching every document that shares `doc`'s value at the
/// top-level field `key`. Drivers use it to enforce unique keys.
pub fn unique_key_filter(doc: &Document, key: &str) -> Result<Filter, StoreError> {
  if !is_valid_field_name(key) {
    return Err(StoreError::InvalidFilter(format!("bad unique key {key:?}")));
  }
  match doc.get(key) {
    None | Some(Value::Null) => {
      Err(StoreError::InvalidDocument(format!("missing unique key {key:?}")))
    }
    Some(value) => Ok(Filter::eq(key, value.clone())),
  }
}

// ─── Patch ───────────────────────────────────────────────────────────────────

/// A set-style partial update: each listed top-level field is overwritten,
/// every other field is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch {
  set: Document,
}

impl Patch {
  pub fn new() -> Self { Self::default() }

  pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(field, value);
    self
  }

  pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
    self.set.insert(field.into(), value.into());
  }

  pub fn is_empty(&self) -> bool { self.set.is_empty() }

  pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> { self.set.iter() }

  /// A patch must name at least one plain top-level field and may not touch
  /// the identifier.
  pub fn validate(&self) -> Result<(), StoreError> {
    if self.set.is_empty() {
      return Err(StoreError::InvalidDocument("empty patch".into()));
    }
    for field in self.set.keys() {
      if field == ID_FIELD {
        return Err(StoreError::InvalidDocument("patch may not change _id".into()));
      }
      if !is_valid_field_name(field) {
        return Err(StoreError::InvalidDocument(format!(
          "invalid patch field {field:?}"
        )));
      }
    }
    Ok(())
  }

  pub fn apply(&self, doc: &mut Document) {
    for (field, value) in &self.set {
      doc.insert(field.clone(), value.clone());
    }
  }
}
