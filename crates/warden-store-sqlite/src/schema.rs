//! SQL schema for the SQLite document store.
//!
//! Collections are created lazily: every statement that touches a collection
//! first runs its idempotent DDL on the same connection.

/// Connection-level settings, applied once after dialing.
pub const PRAGMAS: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;
";

/// DDL for one collection. `name` must already have passed
/// [`warden_core::store::validate_collection`].
///
/// `seq` preserves insertion order; `doc_id` mirrors the document's `_id`.
pub fn collection_ddl(name: &str) -> String {
  format!(
    "CREATE TABLE IF NOT EXISTS \"{name}\" (
        seq        INTEGER PRIMARY KEY AUTOINCREMENT,
        doc_id     TEXT    NOT NULL UNIQUE,
        doc        TEXT    NOT NULL,   -- JSON object, includes _id
        written_at TEXT    NOT NULL    -- RFC 3339 UTC
    );"
  )
}

/// Unique expression index over the top-level field `key`. Documents lacking
/// the field index as NULL and never clash.
pub fn unique_index_ddl(collection: &str, key: &str) -> String {
  format!(
    "CREATE UNIQUE INDEX IF NOT EXISTS \"{collection}__{key}\"
        ON \"{collection}\" (json_extract(doc, '$.{key}'));"
  )
}
