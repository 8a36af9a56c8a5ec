//! Integration tests for `SqliteDocStore` against an in-memory database.

use serde_json::{Value, json};
use warden_core::{
  document::{Document, Filter, ID_FIELD, Patch},
  store::{DocumentStore, DriverKind, StoreConfig, StoreError},
};

use crate::{Error, SqliteDocStore};

const LIVE: &str = "users";
const ARCHIVE: &str = "users_archive";

async fn store() -> SqliteDocStore {
  SqliteDocStore::open_in_memory(LIVE, ARCHIVE)
    .await
    .expect("in-memory store")
}

fn doc(v: Value) -> Document { v.as_object().cloned().unwrap() }

fn user(name: &str, email: &str, role: &str) -> Document {
  doc(json!({ "name": name, "email": email, "role": role }))
}

fn kind(e: Error) -> StoreError { e.into() }

async fn id_of(s: &SqliteDocStore, email: &str) -> String {
  let found = s
    .find_one(LIVE, &Filter::eq("email", email))
    .await
    .unwrap()
    .expect("document present");
  found[ID_FIELD].as_str().unwrap().to_owned()
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn queries_fail_when_disconnected() {
  let mut s = store().await;
  assert!(s.is_connected());
  s.disconnect();
  s.disconnect();
  assert!(!s.is_connected());

  let err = s.count(LIVE, &Filter::All).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::NotConnected));
}

#[tokio::test]
async fn dialing_a_missing_directory_is_a_connection_error() {
  let mut s = SqliteDocStore::new(StoreConfig {
    driver:       DriverKind::Sqlite,
    host:         "/nonexistent/warden/dir".into(),
    database:     "accounts".into(),
    username:     String::new(),
    password:     String::new(),
    collection:   LIVE.into(),
    archive:      ARCHIVE.into(),
    timeout_secs: 3,
  });
  let err = s.connect().await.unwrap_err();
  assert!(matches!(kind(err), StoreError::Connection(_)));
  assert!(!s.is_connected());
}

// ─── Insert / find ───────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_assigns_id_and_find_one_returns_it() {
  let s = store().await;
  let n = s.insert(LIVE, user("John Doe", "john@doe.com", "end_user")).await.unwrap();
  assert_eq!(n, 1);

  let found = s
    .find_one(LIVE, &Filter::eq("email", "john@doe.com"))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(found["name"], "John Doe");
  let id = found[ID_FIELD].as_str().unwrap();
  assert!(uuid::Uuid::parse_str(id).is_ok());

  let by_id = s.find_one(LIVE, &Filter::by_id(id)).await.unwrap().unwrap();
  assert_eq!(by_id, found);
}

#[tokio::test]
async fn find_one_missing_returns_none() {
  let s = store().await;
  let found = s.find_one(LIVE, &Filter::eq("email", "nobody@x.com")).await.unwrap();
  assert!(found.is_none());
}

#[tokio::test]
async fn insert_rejects_bad_arguments() {
  let s = store().await;
  let err = s.insert("", user("A", "a@b.co", "guest")).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidCollection(_)));

  let err = s.insert(LIVE, Document::new()).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidDocument(_)));

  let err = s.insert("users\"; --", user("A", "a@b.co", "guest")).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidCollection(_)));
}

#[tokio::test]
async fn duplicate_ids_are_a_query_failure() {
  let s = store().await;
  let mut d = user("A", "a@b.co", "guest");
  d.insert(ID_FIELD.into(), "fixed-id".into());
  s.insert(LIVE, d.clone()).await.unwrap();
  let err = s.insert(LIVE, d).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::Query { operation: "insert", .. }));
}

#[tokio::test]
async fn unique_insert_refuses_a_taken_key() {
  let s = store().await;
  s.insert_unique(LIVE, user("John Doe", "john@doe.com", "end_user"), "email").await.unwrap();

  let err = s
    .insert_unique(LIVE, user("Johnny", "john@doe.com", "admin"), "email")
    .await
    .unwrap_err();
  assert!(matches!(kind(err), StoreError::Duplicate { .. }));
  assert_eq!(s.count(LIVE, &Filter::eq("email", "john@doe.com")).await.unwrap(), 1);

  s.insert_unique(LIVE, user("Jane Roe", "jane@roe.com", "end_user"), "email").await.unwrap();
  let err = s.insert_unique(LIVE, user("No Key", "", "guest"), "phone").await.unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidDocument(_)));
}

#[tokio::test]
async fn unique_index_also_guards_plain_inserts() {
  let s = store().await;
  s.insert_unique(LIVE, user("John Doe", "john@doe.com", "end_user"), "email").await.unwrap();
  let err = s.insert(LIVE, user("Johnny", "john@doe.com", "admin")).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::Query { operation: "insert", .. }));
}

#[tokio::test]
async fn concurrent_unique_inserts_keep_one() {
  let s = store().await;
  let (a, b) = tokio::join!(
    s.insert_unique(LIVE, user("John Doe", "john@doe.com", "end_user"), "email"),
    s.insert_unique(LIVE, user("John Doe", "john@doe.com", "end_user"), "email"),
  );
  assert!(a.is_ok() ^ b.is_ok());
  assert_eq!(s.count(LIVE, &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn malformed_filter_is_rejected_before_querying() {
  let s = store().await;
  let err = s.find_one(LIVE, &Filter::eq("", "x")).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidFilter(_)));
}

// ─── Filters ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn filter_semantics_match_in_process_evaluation() {
  let s = store().await;
  let docs = [
    doc(json!({ "name": "Ann", "role": "admin", "telegid": 5, "active": true })),
    doc(json!({ "name": "Bob", "role": "end_user", "telegid": 5.0, "address": { "state": "Goa" } })),
    doc(json!({ "name": "Cid", "role": "guest", "active": false })),
  ];
  for d in &docs {
    s.insert(LIVE, d.clone()).await.unwrap();
  }

  let filters = [
    Filter::All,
    Filter::eq("telegid", 5),
    Filter::eq("active", true),
    Filter::eq("active", false),
    Filter::eq("telegid", Value::Null),
    Filter::ne("role", "admin"),
    Filter::is_in("role", ["admin", "guest"]),
    Filter::eq("address.state", "Goa"),
    Filter::eq("address", json!({ "state": "Goa" })),
    Filter::eq("role", "admin").or(Filter::eq("name", "Cid")),
    Filter::eq("role", "admin").not(),
    Filter::eq("name", "5"),
  ];

  for f in &filters {
    let expected = docs.iter().filter(|d| f.matches(d)).count() as u64;
    let got = s.count(LIVE, f).await.unwrap();
    assert_eq!(got, expected, "filter {f:?}");
  }
}

#[tokio::test]
async fn filter_ids_distinguishes_empty_result() {
  let s = store().await;
  s.insert(LIVE, user("Ann", "ann@x.com", "admin")).await.unwrap();
  s.insert(LIVE, user("Bob", "bob@x.com", "end_user")).await.unwrap();

  let admins = s.filter_ids(LIVE, &Filter::eq("role", "admin")).await.unwrap();
  assert_eq!(admins, vec![id_of(&s, "ann@x.com").await]);

  let err = s.filter_ids(LIVE, &Filter::eq("role", "guest")).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::EmptyResult { .. }));
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_sets_fields_on_every_match() {
  let s = store().await;
  s.insert(LIVE, user("Ann", "ann@x.com", "guest")).await.unwrap();
  s.insert(LIVE, user("Bob", "bob@x.com", "guest")).await.unwrap();
  s.insert(LIVE, user("Cid", "cid@x.com", "admin")).await.unwrap();

  let patch = Patch::new().set("role", "end_user").set("telegid", 77);
  let n = s.update(LIVE, &Filter::eq("role", "guest"), &patch).await.unwrap();
  assert_eq!(n, 2);

  let ann = s.find_one(LIVE, &Filter::eq("email", "ann@x.com")).await.unwrap().unwrap();
  assert_eq!(ann["role"], "end_user");
  assert_eq!(ann["telegid"], 77);
  assert_eq!(ann["name"], "Ann");

  let cid = s.find_one(LIVE, &Filter::eq("email", "cid@x.com")).await.unwrap().unwrap();
  assert_eq!(cid["role"], "admin");
  assert!(cid.get("telegid").is_none());
}

#[tokio::test]
async fn update_rejects_id_patch() {
  let s = store().await;
  let err = s
    .update(LIVE, &Filter::All, &Patch::new().set(ID_FIELD, "x"))
    .await
    .unwrap_err();
  assert!(matches!(kind(err), StoreError::InvalidDocument(_)));
}

// ─── Sample ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sample_returns_at_most_size_distinct_ids() {
  let s = store().await;
  for i in 0..5 {
    s.insert(LIVE, user("Ann", &format!("ann{i}@x.com"), "guest")).await.unwrap();
  }

  let ids = s.sample(LIVE, 3).await.unwrap();
  assert_eq!(ids.len(), 3);
  let mut unique = ids.clone();
  unique.sort();
  unique.dedup();
  assert_eq!(unique.len(), 3);

  assert_eq!(s.sample(LIVE, 50).await.unwrap().len(), 5);
}

#[tokio::test]
async fn non_positive_sample_is_empty_not_an_error() {
  let s = store().await;
  s.insert(LIVE, user("Ann", "ann@x.com", "guest")).await.unwrap();
  assert!(s.sample(LIVE, 0).await.unwrap().is_empty());
  assert!(s.sample(LIVE, -4).await.unwrap().is_empty());
}

// ─── Remove ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn soft_delete_archives_verbatim_copy_before_removing() {
  let s = store().await;
  s.insert(LIVE, user("John Doe", "john@doe.com", "end_user")).await.unwrap();
  let id = id_of(&s, "john@doe.com").await;
  let original = s.find_one(LIVE, &Filter::by_id(id.clone())).await.unwrap().unwrap();

  let n = s.remove(LIVE, &id, true).await.unwrap();
  assert_eq!(n, 1);

  assert!(s.find_one(LIVE, &Filter::by_id(id.clone())).await.unwrap().is_none());
  let archived = s.find_one(ARCHIVE, &Filter::by_id(id)).await.unwrap().unwrap();
  assert_eq!(archived, original);
  assert_eq!(s.count(ARCHIVE, &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_archive_write_leaves_live_document() {
  let s = store().await;
  s.insert(LIVE, user("John Doe", "john@doe.com", "end_user")).await.unwrap();
  let id = id_of(&s, "john@doe.com").await;
  s.execute_batch(&format!(
    "CREATE TRIGGER refuse_archive BEFORE INSERT ON \"{ARCHIVE}\"
     BEGIN SELECT RAISE(ABORT, 'archive unavailable'); END;"
  ))
  .await
  .unwrap();

  let err = s.remove(LIVE, &id, true).await.unwrap_err();
  assert!(matches!(kind(err), StoreError::Query { operation: "remove", .. }));
  assert!(s.find_one(LIVE, &Filter::by_id(&id)).await.unwrap().is_some());
  assert_eq!(s.count(ARCHIVE, &Filter::All).await.unwrap(), 0);

  // Hard delete never touches the archive.
  assert_eq!(s.remove(LIVE, &id, false).await.unwrap(), 1);
}

#[tokio::test]
async fn hard_delete_skips_archive() {
  let s = store().await;
  s.insert(LIVE, user("John Doe", "john@doe.com", "end_user")).await.unwrap();
  let id = id_of(&s, "john@doe.com").await;

  assert_eq!(s.remove(LIVE, &id, false).await.unwrap(), 1);
  assert_eq!(s.count(LIVE, &Filter::All).await.unwrap(), 0);
  assert_eq!(s.count(ARCHIVE, &Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn removing_missing_id_affects_nothing() {
  let s = store().await;
  assert_eq!(s.remove(LIVE, "no-such-id", true).await.unwrap(), 0);
  assert_eq!(s.remove(LIVE, "no-such-id", false).await.unwrap(), 0);
  assert_eq!(s.count(ARCHIVE, &Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn repeated_soft_delete_of_reinserted_id_keeps_one_archive_copy() {
  let s = store().await;
  let mut d = user("John Doe", "john@doe.com", "end_user");
  d.insert(ID_FIELD.into(), "fixed-id".into());

  s.insert(LIVE, d.clone()).await.unwrap();
  s.remove(LIVE, "fixed-id", true).await.unwrap();
  s.insert(LIVE, d).await.unwrap();
  assert_eq!(s.remove(LIVE, "fixed-id", true).await.unwrap(), 1);

  assert_eq!(s.count(ARCHIVE, &Filter::All).await.unwrap(), 1);
  assert_eq!(s.count(LIVE, &Filter::All).await.unwrap(), 0);
}
