//! Repository and session tests against both drivers.

use warden_core::{
  account::{Address, Role},
  document::{Filter, Patch},
  store::{DocumentStore, DriverKind, StoreConfig},
};
use warden_store_sqlite::SqliteDocStore;

use crate::{
  ErrorKind,
  driver::{AnyStore, Lease, create_and_connect},
  repo::{AccountEdit, Accounts, NewAccount},
  session::{Sessions, TokenConfig},
};

const LIVE: &str = "users";
const ARCHIVE: &str = "users_archive";

async fn memory(database: &str) -> Lease<AnyStore> {
  create_and_connect(&StoreConfig {
    driver:       DriverKind::Memory,
    host:         "account-tests".into(),
    database:     database.into(),
    username:     String::new(),
    password:     String::new(),
    collection:   LIVE.into(),
    archive:      ARCHIVE.into(),
    timeout_secs: 3,
  })
  .await
  .unwrap()
}

async fn sqlite() -> SqliteDocStore {
  SqliteDocStore::open_in_memory(LIVE, ARCHIVE).await.unwrap()
}

fn sessions() -> Sessions {
  Sessions::new(&TokenConfig {
    secret:   "test-secret".into(),
    issuer:   "warden-test".into(),
    ttl_secs: 600,
  })
  .unwrap()
}

fn john() -> NewAccount {
  NewAccount {
    name: "John Doe".into(),
    email: "john@doe.com".into(),
    password: "Abcd1234!".into(),
    ..NewAccount::default()
  }
}

fn person(name: &str, email: &str) -> NewAccount {
  NewAccount {
    name: name.into(),
    email: email.into(),
    password: "Passw0rd_1".into(),
    ..NewAccount::default()
  }
}

async fn stored_hash<S: DocumentStore>(accounts: &Accounts<'_, S>, email: &str) -> String {
  accounts.find_by_email(email).await.unwrap().credential_hash
}

// ─── Scenario ────────────────────────────────────────────────────────────────

async fn john_doe_scenario<S: DocumentStore>(store: &S) {
  let accounts = Accounts::new(store);
  let sessions = sessions();

  let created = accounts.register(john(), Address::default()).await.unwrap();
  let view = created.view();
  assert!(!view.id.is_empty());
  assert_eq!(view.role, Role::EndUser);
  let json = serde_json::to_value(&view).unwrap();
  assert!(json.get("credential_hash").is_none());
  assert!(!json.to_string().contains("Abcd1234!"));
  assert_ne!(created.credential_hash, "Abcd1234!");

  let dup = accounts.register(john(), Address::default()).await.unwrap_err();
  assert_eq!(dup.kind(), ErrorKind::DuplicateResource);

  let login = sessions.authenticate(&accounts, "john@doe.com", "Abcd1234!").await.unwrap();
  assert_eq!(login.account.id, view.id);
  let claims = sessions.authorize(&login.token).unwrap();
  assert_eq!(claims.sub, "john@doe.com");
  assert_eq!(claims.role, Role::EndUser);

  let wrong = sessions.authenticate(&accounts, "john@doe.com", "Wrong1234!").await.unwrap_err();
  assert_eq!(wrong.kind(), ErrorKind::Unauthorized);

  accounts.delete("john@doe.com", true).await.unwrap();
  assert_eq!(accounts.find(&view.id).await.unwrap_err().kind(), ErrorKind::NotFound);
  let archived = store
    .count(ARCHIVE, &Filter::eq("email", "john@doe.com"))
    .await
    .map_err(Into::<warden_core::store::StoreError>::into)
    .unwrap();
  assert_eq!(archived, 1);
}

#[tokio::test]
async fn john_doe_on_memory_driver() {
  let lease = memory("john").await;
  john_doe_scenario(&*lease).await;
}

#[tokio::test]
async fn john_doe_on_sqlite_driver() {
  john_doe_scenario(&sqlite().await).await;
}

// ─── Registration ────────────────────────────────────────────────────────────

#[tokio::test]
async fn registration_validates_every_field() {
  let lease = memory("validate").await;
  let accounts = Accounts::new(&*lease);

  let cases = [
    NewAccount { name: "J0hn".into(), ..john() },
    NewAccount { email: "john@doe".into(), ..john() },
    NewAccount { password: "short".into(), ..john() },
    NewAccount { password: "Abcd1234!~".into(), ..john() },
    NewAccount { pincode: Some("12ab56".into()), ..john() },
    NewAccount { post_office: Some("a very long post office".into()), ..john() },
  ];
  for case in cases {
    let err = accounts.register(case, Address::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParam);
  }
  assert_eq!(lease.count(LIVE, &Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn duplicate_email_wins_over_other_differences() {
  let lease = memory("duplicate").await;
  let accounts = Accounts::new(&*lease);
  accounts.register(john(), Address::default()).await.unwrap();

  let other = NewAccount {
    name: "Jane Roe".into(),
    password: "Zyxw9876#".into(),
    external_contact_id: Some(77),
    ..john()
  };
  let err = accounts.register(other, Address::default()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::DuplicateResource);
  assert_eq!(lease.count(LIVE, &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_registrations_keep_email_unique() {
  let (a, b) = (memory("race").await, memory("race").await);
  let (acc_a, acc_b) = (Accounts::new(&*a), Accounts::new(&*b));
  let (first, second) = tokio::join!(
    acc_a.register(john(), Address::default()),
    acc_b.register(john(), Address::default()),
  );
  let kinds: Vec<_> = [first, second].into_iter().filter_map(|r| r.err().map(|e| e.kind())).collect();
  assert_eq!(kinds, [ErrorKind::DuplicateResource]);
  assert_eq!(a.count(LIVE, &Filter::eq("email", "john@doe.com")).await.unwrap(), 1);

  // The surviving account can still log in.
  let accounts = Accounts::new(&*a);
  sessions().authenticate(&accounts, "john@doe.com", "Abcd1234!").await.unwrap();
}

#[tokio::test]
async fn concurrent_registrations_on_sqlite_keep_email_unique() {
  let store = sqlite().await;
  let accounts = Accounts::new(&store);
  let (first, second) = tokio::join!(
    accounts.register(john(), Address::default()),
    accounts.register(john(), Address::default()),
  );
  assert!(first.is_ok() ^ second.is_ok());
  assert_eq!(store.count(LIVE, &Filter::All).await.unwrap(), 1);
}

#[tokio::test]
async fn registered_account_keeps_address_and_contact() {
  let lease = memory("address").await;
  let accounts = Accounts::new(&*lease);
  let candidate = NewAccount {
    external_contact_id: Some(5550100),
    pincode: Some("411007".into()),
    ..john()
  };
  let address = Address {
    post_office: "Aundh".into(),
    state: "Maharashtra".into(),
    pincode: "411007".into(),
    ..Address::default()
  };
  let created = accounts.register(candidate, address).await.unwrap();
  let found = accounts.find(&created.view().id).await.unwrap();
  assert_eq!(found.external_contact_id, Some(5550100));
  assert_eq!(found.address.post_office, "Aundh");
  assert_eq!(found.address.pincode, "411007");
}

// ─── Edit ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn edit_missing_account_is_not_found_and_creates_nothing() {
  let lease = memory("edit-missing").await;
  let accounts = Accounts::new(&*lease);
  let edit = AccountEdit { name: Some("Ghost".into()), ..AccountEdit::default() };

  let by_email = accounts.edit("ghost@x.com", edit.clone()).await.unwrap_err();
  assert_eq!(by_email.kind(), ErrorKind::NotFound);
  let by_id = accounts
    .edit(&uuid::Uuid::new_v4().to_string(), edit.clone())
    .await
    .unwrap_err();
  assert_eq!(by_id.kind(), ErrorKind::NotFound);
  let bad = accounts.edit("not an id", edit).await.unwrap_err();
  assert_eq!(bad.kind(), ErrorKind::InvalidParam);

  assert_eq!(lease.count(LIVE, &Filter::All).await.unwrap(), 0);
}

#[tokio::test]
async fn edit_password_rules() {
  let lease = memory("edit-password").await;
  let accounts = Accounts::new(&*lease);
  let sessions = sessions();
  accounts.register(john(), Address::default()).await.unwrap();
  let original = stored_hash(&accounts, "john@doe.com").await;

  // Empty password leaves the hash alone.
  let edit = AccountEdit {
    name: Some("Johnny Doe".into()),
    password: Some(String::new()),
    ..AccountEdit::default()
  };
  accounts.edit("john@doe.com", edit).await.unwrap();
  assert_eq!(stored_hash(&accounts, "john@doe.com").await, original);
  assert_eq!(accounts.find_by_email("john@doe.com").await.unwrap().name, "Johnny Doe");

  // Invalid password is refused and leaves the hash alone.
  let edit = AccountEdit { password: Some("bad".into()), ..AccountEdit::default() };
  let err = accounts.edit("john@doe.com", edit).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::InvalidParam);
  assert_eq!(stored_hash(&accounts, "john@doe.com").await, original);

  // A valid password is re-hashed and takes effect.
  let id = accounts.find_by_email("john@doe.com").await.unwrap().view().id;
  let edit = AccountEdit { password: Some("NewPass_99".into()), ..AccountEdit::default() };
  accounts.edit(&id, edit).await.unwrap();
  assert_ne!(stored_hash(&accounts, "john@doe.com").await, original);
  sessions.authenticate(&accounts, "john@doe.com", "NewPass_99").await.unwrap();
  let old = sessions.authenticate(&accounts, "john@doe.com", "Abcd1234!").await.unwrap_err();
  assert_eq!(old.kind(), ErrorKind::Unauthorized);
}

#[tokio::test]
async fn zero_contact_id_is_not_written() {
  let lease = memory("edit-contact").await;
  let accounts = Accounts::new(&*lease);
  accounts
    .register(NewAccount { external_contact_id: Some(9), ..john() }, Address::default())
    .await
    .unwrap();

  let edit = AccountEdit { external_contact_id: Some(0), ..AccountEdit::default() };
  accounts.edit("john@doe.com", edit).await.unwrap();
  let found = accounts.find_by_email("john@doe.com").await.unwrap();
  assert_eq!(found.external_contact_id, Some(9));
}

// ─── Delete / find ───────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_by_id_and_missing() {
  let lease = memory("delete").await;
  let accounts = Accounts::new(&*lease);
  let id = accounts.register(john(), Address::default()).await.unwrap().view().id;

  accounts.delete(&id, false).await.unwrap();
  assert_eq!(lease.count(ARCHIVE, &Filter::All).await.unwrap(), 0);
  assert_eq!(accounts.delete(&id, true).await.unwrap_err().kind(), ErrorKind::NotFound);
  assert_eq!(
    accounts.delete("nobody@x.com", true).await.unwrap_err().kind(),
    ErrorKind::NotFound
  );
}

#[tokio::test]
async fn find_classifies_failures() {
  let lease = memory("find").await;
  let accounts = Accounts::new(&*lease);

  assert_eq!(accounts.find("xyz").await.unwrap_err().kind(), ErrorKind::InvalidParam);
  let missing = uuid::Uuid::new_v4().to_string();
  assert_eq!(accounts.find(&missing).await.unwrap_err().kind(), ErrorKind::NotFound);

  // A record that cannot decode into an account.
  let mut doc = warden_core::document::Document::new();
  doc.insert("_id".into(), missing.clone().into());
  doc.insert("email".into(), 42.into());
  lease.insert(LIVE, doc).await.unwrap();
  assert_eq!(accounts.find(&missing).await.unwrap_err().kind(), ErrorKind::Binding);
}

#[tokio::test]
async fn authenticate_unknown_email_is_not_found() {
  let lease = memory("auth-missing").await;
  let accounts = Accounts::new(&*lease);
  let err = sessions().authenticate(&accounts, "ghost@x.com", "Abcd1234!").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let err = sessions().authenticate(&accounts, "not-an-email", "Abcd1234!").await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ─── Sampling ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sample_and_role_queries() {
  let lease = memory("sample").await;
  let accounts = Accounts::new(&*lease);
  for (name, email) in [("Ann Lee", "ann@x.com"), ("Bob Ray", "bob@x.com"), ("Cid Moe", "cid@x.com")] {
    accounts.register(person(name, email), Address::default()).await.unwrap();
  }

  assert!(accounts.sample_ids(0).await.unwrap().is_empty());
  assert!(accounts.sample_ids(-3).await.unwrap().is_empty());
  assert_eq!(accounts.sample_ids(2).await.unwrap().len(), 2);

  assert_eq!(accounts.ids_with_role(Role::EndUser).await.unwrap().len(), 3);
  let none = accounts.ids_with_role(Role::Admin).await.unwrap_err();
  assert_eq!(none.kind(), ErrorKind::EmptyResult);

  lease
    .update(LIVE, &Filter::eq("email", "ann@x.com"), &Patch::new().set("role", "admin"))
    .await
    .unwrap();
  assert_eq!(accounts.ids_with_role(Role::Admin).await.unwrap().len(), 1);
}
