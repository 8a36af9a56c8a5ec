//! Encoding helpers between document-store values and the SQL text and
//! parameters sent to SQLite.
//!
//! Filters compile to JSON1 expressions over the `doc` column. Field paths
//! and values are always bound as parameters; only validated collection
//! names are ever interpolated into SQL text.

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use serde_json::Value;
use uuid::Uuid;
use warden_core::document::{Document, Filter, ID_FIELD, Patch};
use warden_core::store::StoreError;

use crate::{Error, Result};

// ─── Ids and timestamps ──────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

/// Take the document's `_id`, assigning a fresh one when it has none.
pub fn ensure_doc_id(doc: &mut Document) -> Result<String> {
  match doc.get(ID_FIELD) {
    None => {
      let id = encode_uuid(Uuid::new_v4());
      doc.insert(ID_FIELD.to_owned(), Value::String(id.clone()));
      Ok(id)
    }
    Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
    Some(_) => Err(Error::Store(StoreError::InvalidDocument(
      "_id must be a non-empty string".into(),
    ))),
  }
}

// ─── Documents ───────────────────────────────────────────────────────────────

pub fn encode_doc(doc: &Document) -> Result<String> { Ok(serde_json::to_string(doc)?) }

pub fn decode_doc(s: &str) -> Result<Document> { Ok(serde_json::from_str(s)?) }

// ─── Filters ─────────────────────────────────────────────────────────────────

fn json_path(field: &str) -> String { format!("$.{field}") }

/// Compile `filter` into a boolean SQL expression, appending its bind
/// parameters (positional `?`) to `params` in textual order.
pub fn compile_filter(filter: &Filter, params: &mut Vec<SqlValue>) -> String {
  match filter {
    Filter::All => "1".to_owned(),
    Filter::Eq { field, value } => eq_clause(field, value, params),
    Filter::Ne { field, value } => negate(&eq_clause(field, value, params)),
    Filter::In { field, values } => {
      if values.is_empty() {
        return "0".to_owned();
      }
      let parts: Vec<String> = values
        .iter()
        .map(|v| format!("({})", eq_clause(field, v, params)))
        .collect();
      parts.join(" OR ")
    }
    Filter::And { clauses } => join(clauses, " AND ", params),
    Filter::Or { clauses } => join(clauses, " OR ", params),
    Filter::Not { clause } => negate(&compile_filter(clause, params)),
  }
}

fn join(clauses: &[Filter], op: &str, params: &mut Vec<SqlValue>) -> String {
  let parts: Vec<String> = clauses
    .iter()
    .map(|c| format!("({})", compile_filter(c, params)))
    .collect();
  parts.join(op)
}

// Comparisons against a missing path yield NULL; treat that as false before
// negating so `Ne` matches documents that lack the field.
fn negate(expr: &str) -> String { format!("NOT COALESCE(({expr}), 0)") }

fn eq_clause(field: &str, value: &Value, params: &mut Vec<SqlValue>) -> String {
  let path = json_path(field);
  match value {
    Value::Null => {
      params.push(SqlValue::Text(path));
      "json_extract(doc, ?) IS NULL".to_owned()
    }
    Value::Bool(b) => {
      params.push(SqlValue::Text(path));
      params.push(SqlValue::Text(if *b { "true" } else { "false" }.to_owned()));
      "json_type(doc, ?) = ?".to_owned()
    }
    Value::Number(n) => {
      params.push(SqlValue::Text(path.clone()));
      params.push(SqlValue::Text(path));
      params.push(match n.as_i64() {
        Some(i) => SqlValue::Integer(i),
        None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
      });
      "json_type(doc, ?) IN ('integer', 'real') AND json_extract(doc, ?) = ?".to_owned()
    }
    Value::String(s) => {
      params.push(SqlValue::Text(path.clone()));
      params.push(SqlValue::Text(path));
      params.push(SqlValue::Text(s.clone()));
      "json_type(doc, ?) = 'text' AND json_extract(doc, ?) = ?".to_owned()
    }
    Value::Array(_) | Value::Object(_) => {
      params.push(SqlValue::Text(path.clone()));
      params.push(SqlValue::Text(path));
      params.push(SqlValue::Text(value.to_string()));
      "json_type(doc, ?) IN ('array', 'object') AND json_extract(doc, ?) = json(?)"
        .to_owned()
    }
  }
}

// ─── Patches ─────────────────────────────────────────────────────────────────

/// Compile a validated patch into a `json_set(doc, ...)` expression.
pub fn compile_patch(patch: &Patch, params: &mut Vec<SqlValue>) -> String {
  let mut expr = String::from("json_set(doc");
  for (field, value) in patch.fields() {
    expr.push_str(", ?, json(?)");
    params.push(SqlValue::Text(json_path(field)));
    params.push(SqlValue::Text(value.to_string()));
  }
  expr.push(')');
  expr
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn eq_string_binds_path_twice_then_value() {
    let mut params = vec![];
    let sql = compile_filter(&Filter::eq("email", "a@b.co"), &mut params);
    assert_eq!(sql, "json_type(doc, ?) = 'text' AND json_extract(doc, ?) = ?");
    assert_eq!(params, vec![
      SqlValue::Text("$.email".into()),
      SqlValue::Text("$.email".into()),
      SqlValue::Text("a@b.co".into()),
    ]);
  }

  #[test]
  fn empty_in_matches_nothing() {
    let mut params = vec![];
    let sql = compile_filter(
      &Filter::In { field: "role".into(), values: vec![] },
      &mut params,
    );
    assert_eq!(sql, "0");
    assert!(params.is_empty());
  }

  #[test]
  fn patch_binds_json_text() {
    let mut params = vec![];
    let sql = compile_patch(&Patch::new().set("name", "Jane"), &mut params);
    assert_eq!(sql, "json_set(doc, ?, json(?))");
    assert_eq!(params[1], SqlValue::Text("\"Jane\"".into()));
  }

  #[test]
  fn ids_are_assigned_once() {
    let mut doc = Document::new();
    let id = ensure_doc_id(&mut doc).unwrap();
    assert_eq!(ensure_doc_id(&mut doc).unwrap(), id);

    let mut bad = Document::new();
    bad.insert(ID_FIELD.into(), Value::from(7));
    assert!(ensure_doc_id(&mut bad).is_err());
  }
}
