//! [`SqliteDocStore`]: documents as JSON rows in SQLite tables.

use std::path::PathBuf;

use chrono::Utc;
use rusqlite::{
  OptionalExtension as _, TransactionBehavior, params_from_iter, types::Value as SqlValue,
};
use warden_core::{
  document::{Document, Filter, Patch, unique_key_filter},
  store::{DocumentStore, StoreConfig, StoreError, validate_collection},
};

use crate::{
  Error, Result,
  encode::{compile_filter, compile_patch, decode_doc, encode_doc, encode_dt, ensure_doc_id},
  schema::{PRAGMAS, collection_ddl, unique_index_ddl},
};

/// `host` value that selects a private in-memory database.
pub const IN_MEMORY: &str = ":memory:";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A document store backed by one SQLite database file.
///
/// `host` names the directory holding the database and `database` its file
/// stem (`<host>/<database>.sqlite3`). SQLite has no user accounts, so the
/// configured credentials are ignored.
pub struct SqliteDocStore {
  config: StoreConfig,
  conn:   Option<tokio_rusqlite::Connection>,
}

impl SqliteDocStore {
  /// Build a disconnected driver.
  pub fn new(config: StoreConfig) -> Self { Self { config, conn: None } }

  /// Build and connect a private in-memory store.
  pub async fn open_in_memory(collection: &str, archive: &str) -> Result<Self> {
    let mut store = Self::new(StoreConfig {
      driver:       warden_core::store::DriverKind::Sqlite,
      host:         IN_MEMORY.to_owned(),
      database:     String::new(),
      username:     String::new(),
      password:     String::new(),
      collection:   collection.to_owned(),
      archive:      archive.to_owned(),
      timeout_secs: 3,
    });
    store.connect().await?;
    Ok(store)
  }

  fn database_path(&self) -> Option<PathBuf> {
    if self.config.host == IN_MEMORY {
      None
    } else {
      Some(PathBuf::from(&self.config.host).join(format!("{}.sqlite3", self.config.database)))
    }
  }

  async fn dial(&self) -> Result<tokio_rusqlite::Connection> {
    let path = self.database_path();
    let label = path
      .as_ref()
      .map(|p| p.display().to_string())
      .unwrap_or_else(|| IN_MEMORY.to_owned());

    let open = async {
      match &path {
        Some(p) => tokio_rusqlite::Connection::open(p).await,
        None => tokio_rusqlite::Connection::open_in_memory().await,
      }
    };

    let conn = tokio::time::timeout(self.config.timeout(), open)
      .await
      .map_err(|_| {
        StoreError::Connection(format!(
          "dialing {label} timed out after {}s",
          self.config.timeout_secs
        ))
      })?
      .map_err(|source| Error::Open { path: label.clone(), source })?;

    let busy = self.config.timeout();
    let live = collection_ddl(&self.config.collection);
    let archive = collection_ddl(&self.config.archive);
    conn
      .call(move |conn| {
        conn.busy_timeout(busy)?;
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(&live)?;
        conn.execute_batch(&archive)?;
        Ok(())
      })
      .await
      .map_err(|source| Error::Open { path: label, source })?;

    Ok(conn)
  }

  /// Run `f` on the connection thread, bounded by the configured timeout.
  async fn call<F, R>(&self, operation: &'static str, collection: &str, f: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R> + Send + 'static,
    R: Send + 'static,
  {
    let conn = self.conn.as_ref().ok_or(StoreError::NotConnected)?;
    match tokio::time::timeout(self.config.timeout(), conn.call(f)).await {
      Ok(Ok(value)) => Ok(value),
      Ok(Err(source)) => Err(Error::Database {
        operation,
        collection: collection.to_owned(),
        source,
      }),
      Err(_) => Err(Error::Timeout { operation }),
    }
  }

  fn where_clause(filter: &Filter, params: &mut Vec<SqlValue>) -> Result<String> {
    filter.validate()?;
    Ok(compile_filter(filter, params))
  }

  /// Run raw SQL on the connection; lets tests rig failures.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
    let sql = sql.to_owned();
    self.call("execute_batch", "", move |conn| Ok(conn.execute_batch(&sql)?)).await
  }
}

// ─── DocumentStore impl ──────────────────────────────────────────────────────

impl DocumentStore for SqliteDocStore {
  type Error = Error;

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  async fn connect(&mut self) -> Result<()> {
    validate_collection(&self.config.collection)?;
    validate_collection(&self.config.archive)?;
    if self.conn.is_some() {
      return Ok(());
    }
    if !self.config.username.is_empty() {
      tracing::debug!("sqlite driver ignores configured credentials");
    }

    let conn = self.dial().await?;
    self.conn = Some(conn);
    tracing::debug!(
      host = %self.config.host,
      database = %self.config.database,
      "sqlite document store connected"
    );
    Ok(())
  }

  fn disconnect(&mut self) {
    // Dropping the last handle stops the connection thread and closes the
    // database.
    if self.conn.take().is_some() {
      tracing::debug!(host = %self.config.host, "sqlite document store disconnected");
    }
  }

  fn is_connected(&self) -> bool { self.conn.is_some() }

  fn config(&self) -> &StoreConfig { &self.config }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn insert(&self, collection: &str, mut document: Document) -> Result<u64> {
    validate_collection(collection)?;
    if document.is_empty() {
      return Err(StoreError::InvalidDocument("empty document".into()).into());
    }

    let doc_id = ensure_doc_id(&mut document)?;
    let doc_str = encode_doc(&document)?;
    let at_str = encode_dt(Utc::now());
    let ddl = collection_ddl(collection);
    let sql = format!("INSERT INTO \"{collection}\" (doc_id, doc, written_at) VALUES (?1, ?2, ?3)");

    let inserted = self
      .call("insert", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(conn.execute(&sql, rusqlite::params![doc_id, doc_str, at_str])?)
      })
      .await?;
    Ok(inserted as u64)
  }

  async fn insert_unique(
    &self,
    collection: &str,
    mut document: Document,
    key: &str,
  ) -> Result<u64> {
    validate_collection(collection)?;
    if document.is_empty() {
      return Err(StoreError::InvalidDocument("empty document".into()).into());
    }

    let clash = unique_key_filter(&document, key)?;
    let mut params = vec![];
    let where_sql = Self::where_clause(&clash, &mut params)?;
    let doc_id = ensure_doc_id(&mut document)?;
    let doc_str = encode_doc(&document)?;
    let at_str = encode_dt(Utc::now());
    let ddl = format!("{}\n{}", collection_ddl(collection), unique_index_ddl(collection, key));
    let check_sql = format!("SELECT COUNT(*) FROM \"{collection}\" WHERE {where_sql}");
    let sql = format!("INSERT INTO \"{collection}\" (doc_id, doc, written_at) VALUES (?1, ?2, ?3)");

    let inserted = self
      .call("insert_unique", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        // IMMEDIATE takes the write lock up front, so no other connection can
        // insert between the check and the write.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let taken: i64 = tx.query_row(&check_sql, params_from_iter(params), |r| r.get(0))?;
        if taken > 0 {
          return Ok(None);
        }
        let n = tx.execute(&sql, rusqlite::params![doc_id, doc_str, at_str])?;
        tx.commit()?;
        Ok(Some(n))
      })
      .await?;

    match inserted {
      Some(n) => Ok(n as u64),
      None => Err(
        StoreError::Duplicate { collection: collection.to_owned(), key: key.to_owned() }.into(),
      ),
    }
  }

  async fn update(&self, collection: &str, filter: &Filter, patch: &Patch) -> Result<u64> {
    validate_collection(collection)?;
    patch.validate()?;

    let mut params = vec![];
    let set_expr = compile_patch(patch, &mut params);
    let where_sql = Self::where_clause(filter, &mut params)?;
    let ddl = collection_ddl(collection);
    let sql = format!("UPDATE \"{collection}\" SET doc = {set_expr} WHERE {where_sql}");

    let updated = self
      .call("update", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(conn.execute(&sql, params_from_iter(params))?)
      })
      .await?;
    Ok(updated as u64)
  }

  async fn remove(&self, collection: &str, id: &str, soft_delete: bool) -> Result<u64> {
    validate_collection(collection)?;
    if id.is_empty() {
      return Err(StoreError::InvalidFilter("empty document id".into()).into());
    }

    let archive = self.config.archive.clone();
    let live_ddl = collection_ddl(collection);
    let archive_ddl = collection_ddl(&archive);
    let select_sql = format!("SELECT doc FROM \"{collection}\" WHERE doc_id = ?1");
    let archive_sql = format!(
      "INSERT OR REPLACE INTO \"{archive}\" (doc_id, doc, written_at) VALUES (?1, ?2, ?3)"
    );
    let delete_sql = format!("DELETE FROM \"{collection}\" WHERE doc_id = ?1");
    let id = id.to_owned();
    let at_str = encode_dt(Utc::now());

    let removed = self
      .call("remove", collection, move |conn| {
        conn.execute_batch(&live_ddl)?;
        conn.execute_batch(&archive_ddl)?;

        let tx = conn.transaction()?;
        if soft_delete {
          let doc: Option<String> = tx
            .query_row(&select_sql, rusqlite::params![id], |r| r.get(0))
            .optional()?;
          let Some(doc) = doc else {
            return Ok(0);
          };
          // Archive first; an error here returns before the live row is
          // touched and the transaction rolls back on drop.
          tx.execute(&archive_sql, rusqlite::params![id, doc, at_str])?;
        }
        let deleted = tx.execute(&delete_sql, rusqlite::params![id])?;
        tx.commit()?;
        Ok(deleted)
      })
      .await?;

    if removed > 0 {
      tracing::debug!(collection, soft_delete, "document removed");
    }
    Ok(removed as u64)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
    validate_collection(collection)?;
    let mut params = vec![];
    let where_sql = Self::where_clause(filter, &mut params)?;
    let ddl = collection_ddl(collection);
    let sql = format!("SELECT doc FROM \"{collection}\" WHERE {where_sql} ORDER BY seq LIMIT 1");

    let raw: Option<String> = self
      .call("find_one", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(conn
          .query_row(&sql, params_from_iter(params), |row| row.get(0))
          .optional()?)
      })
      .await?;

    raw.as_deref().map(decode_doc).transpose()
  }

  async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
    validate_collection(collection)?;
    let mut params = vec![];
    let where_sql = Self::where_clause(filter, &mut params)?;
    let ddl = collection_ddl(collection);
    let sql = format!("SELECT COUNT(*) FROM \"{collection}\" WHERE {where_sql}");

    let n: i64 = self
      .call("count", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?)
      })
      .await?;
    Ok(n.max(0) as u64)
  }

  async fn sample(&self, collection: &str, size: i64) -> Result<Vec<String>> {
    validate_collection(collection)?;
    if self.conn.is_none() {
      return Err(StoreError::NotConnected.into());
    }
    if size <= 0 {
      return Ok(vec![]);
    }

    let ddl = collection_ddl(collection);
    let sql = format!("SELECT doc_id FROM \"{collection}\" ORDER BY RANDOM() LIMIT ?1");
    self
      .call("sample", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
          .query_map(rusqlite::params![size], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
      })
      .await
  }

  async fn filter_ids(&self, collection: &str, filter: &Filter) -> Result<Vec<String>> {
    validate_collection(collection)?;
    let mut params = vec![];
    let where_sql = Self::where_clause(filter, &mut params)?;
    let ddl = collection_ddl(collection);
    let sql = format!("SELECT doc_id FROM \"{collection}\" WHERE {where_sql} ORDER BY seq");

    let ids: Vec<String> = self
      .call("filter_ids", collection, move |conn| {
        conn.execute_batch(&ddl)?;
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
          .query_map(params_from_iter(params), |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
      })
      .await?;

    if ids.is_empty() {
      return Err(StoreError::EmptyResult { collection: collection.to_owned() }.into());
    }
    Ok(ids)
  }
}
