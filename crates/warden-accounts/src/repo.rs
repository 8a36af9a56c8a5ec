//! [`Accounts`]: registration, lookup, edit and deletion of account records
//! over any [`DocumentStore`].

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;
use warden_core::{
  account::{Account, Address, EMAIL_FIELD, Role},
  credential,
  document::{Filter, ID_FIELD, Patch},
  store::{DocumentStore, StoreError},
};

use crate::{
  Error, Result,
  address::is_valid_pincode,
  error::store,
};

// ─── Inputs ──────────────────────────────────────────────────────────────────

/// A self-registration request. It has no role field; new accounts always
/// start as [`Role::EndUser`].
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
  pub name:                String,
  pub email:               String,
  pub password:            String,
  pub external_contact_id: Option<i64>,
  pub pincode:             Option<String>,
  /// Fragment of the preferred post office name, used to pick among the
  /// offices sharing a pincode.
  pub post_office:         Option<String>,
}

impl NewAccount {
  /// Check every field against its format rule.
  pub fn validate(&self) -> Result<()> {
    if !credential::validate_name(&self.name) {
      return Err(Error::InvalidParam("name may contain only letters and spaces".into()));
    }
    if !credential::validate_email(&self.email) {
      return Err(Error::InvalidParam("email is not valid".into()));
    }
    if !credential::validate_password(&self.password) {
      return Err(Error::InvalidParam(format!(
        "password must be {}-{} characters of letters, digits or {}",
        credential::PASSWORD_MIN_LEN,
        credential::PASSWORD_MAX_LEN,
        credential::PASSWORD_SYMBOLS,
      )));
    }
    if let Some(pincode) = &self.pincode
      && !is_valid_pincode(pincode)
    {
      return Err(Error::InvalidParam("pincode must be six digits".into()));
    }
    if let Some(hint) = &self.post_office
      && !credential::validate_title(hint)
    {
      return Err(Error::InvalidParam("post office name is not valid".into()));
    }
    Ok(())
  }
}

/// A partial update. Empty strings and a zero contact id leave the stored
/// value untouched.
#[derive(Debug, Clone, Default)]
pub struct AccountEdit {
  pub name:                Option<String>,
  pub password:            Option<String>,
  pub external_contact_id: Option<i64>,
}

impl AccountEdit {
  fn name(&self) -> Option<&str> { self.name.as_deref().filter(|s| !s.is_empty()) }

  fn password(&self) -> Option<&str> { self.password.as_deref().filter(|s| !s.is_empty()) }

  fn external_contact_id(&self) -> Option<i64> { self.external_contact_id.filter(|id| *id != 0) }

  fn validate(&self) -> Result<()> {
    if let Some(name) = self.name()
      && !credential::validate_name(name)
    {
      return Err(Error::InvalidParam("name may contain only letters and spaces".into()));
    }
    if let Some(password) = self.password()
      && !credential::validate_password(password)
    {
      return Err(Error::InvalidParam("new password is not valid".into()));
    }
    Ok(())
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Hash on the blocking pool; argon2 is too slow for a runtime thread.
pub(crate) async fn hash_blocking(password: String) -> Result<String> {
  tokio::task::spawn_blocking(move || credential::hash_password(&password))
    .await
    .map_err(|e| Error::Internal(format!("hashing task: {e}")))?
    .map_err(Error::from)
}

pub(crate) async fn verify_blocking(hash: String, password: String) -> Result<()> {
  tokio::task::spawn_blocking(move || credential::verify_password(&hash, &password))
    .await
    .map_err(|e| Error::Internal(format!("verify task: {e}")))?
    .map_err(Error::from)
}

/// An identifier is an email when it looks like one, otherwise an account
/// id.
fn resolve(identifier: &str) -> Result<Filter> {
  if credential::validate_email(identifier) {
    return Ok(Filter::eq(EMAIL_FIELD, identifier));
  }
  parse_id(identifier).map(by_id)
}

fn parse_id(id: &str) -> Result<Uuid> {
  Uuid::parse_str(id).map_err(|_| Error::InvalidParam(format!("{id:?} is not an account id")))
}

fn by_id(id: Uuid) -> Filter { Filter::by_id(id.hyphenated().to_string()) }

// ─── Repository ──────────────────────────────────────────────────────────────

/// Account operations bound to one connected store.
///
/// Accounts live in the store's configured collection; soft-deleted ones
/// move to its archive collection.
pub struct Accounts<'s, S: DocumentStore> {
  store: &'s S,
}

impl<'s, S: DocumentStore> Accounts<'s, S> {
  pub fn new(store: &'s S) -> Self { Self { store } }

  fn live(&self) -> &str { &self.store.config().collection }

  async fn find_one(&self, filter: &Filter) -> Result<Option<Account>> {
    self
      .store
      .find_one(self.live(), filter)
      .await
      .map_err(store)?
      .map(|doc| Account::from_document(doc).map_err(|e| Error::Binding(e.to_string())))
      .transpose()
  }

  async fn exists(&self, filter: &Filter) -> Result<bool> {
    Ok(self.store.count(self.live(), filter).await.map_err(store)? > 0)
  }

  /// Create an account with an address already resolved by the caller
  /// (see [`crate::address::hydrate`]). Fails with `DuplicateResource` when
  /// the email is already registered, including when a concurrent
  /// registration for the same email wins the insert.
  pub async fn register(&self, candidate: NewAccount, address: Address) -> Result<Account> {
    candidate.validate()?;
    let email = candidate.email.clone();
    if self.exists(&Filter::eq(EMAIL_FIELD, email.as_str())).await? {
      return Err(Error::DuplicateResource(email));
    }

    let account = Account {
      id:                  None,
      name:                candidate.name,
      email:               candidate.email,
      role:                Role::EndUser,
      external_contact_id: candidate.external_contact_id,
      credential_hash:     hash_blocking(candidate.password).await?,
      address,
      created_at:          Utc::now(),
    };
    // The store re-checks the email atomically with the write.
    match self
      .store
      .insert_unique(self.live(), account.to_document()?, EMAIL_FIELD)
      .await
      .map_err(Into::<StoreError>::into)
    {
      Ok(_) => {}
      Err(StoreError::Duplicate { .. }) => {
        tracing::info!(email, "registration lost race for email");
        return Err(Error::DuplicateResource(email));
      }
      Err(e) => return Err(Error::Store(e)),
    }

    let created = self
      .find_one(&Filter::eq(EMAIL_FIELD, email.as_str()))
      .await?
      .ok_or_else(|| Error::Consistency { email: email.clone() })?;
    tracing::info!(email = %created.email, "account registered");
    Ok(created)
  }

  /// Overwrite the non-empty fields of `edit` on the account named by
  /// `identifier` (email or id).
  pub async fn edit(&self, identifier: &str, edit: AccountEdit) -> Result<()> {
    let filter = resolve(identifier)?;
    edit.validate()?;
    if !self.exists(&filter).await? {
      return Err(Error::NotFound(format!("account {identifier}")));
    }

    let mut patch = Patch::new();
    if let Some(name) = edit.name() {
      patch.insert("name", name);
    }
    if let Some(id) = edit.external_contact_id() {
      patch.insert("external_contact_id", id);
    }
    if let Some(password) = edit.password() {
      patch.insert("credential_hash", hash_blocking(password.to_owned()).await?);
    }
    if patch.is_empty() {
      return Ok(());
    }

    let updated = self
      .store
      .update(self.live(), &filter, &patch)
      .await
      .map_err(store)?;
    if updated == 0 {
      // Removed between the existence check and the write.
      return Err(Error::NotFound(format!("account {identifier}")));
    }
    tracing::info!(identifier, fields = patch.fields().count(), "account edited");
    Ok(())
  }

  /// Remove the account named by `identifier` (email or id), archiving a
  /// copy first when `soft_delete` is set.
  pub async fn delete(&self, identifier: &str, soft_delete: bool) -> Result<()> {
    let filter = resolve(identifier)?;
    let doc = self
      .store
      .find_one(self.live(), &filter)
      .await
      .map_err(store)?
      .ok_or_else(|| Error::NotFound(format!("account {identifier}")))?;
    let id = doc
      .get(ID_FIELD)
      .and_then(Value::as_str)
      .ok_or_else(|| Error::Binding("stored account has no id".into()))?;

    let removed = self
      .store
      .remove(self.live(), id, soft_delete)
      .await
      .map_err(store)?;
    if removed == 0 {
      return Err(Error::NotFound(format!("account {identifier}")));
    }
    tracing::info!(identifier, soft_delete, "account deleted");
    Ok(())
  }

  /// Fetch an account by its store-assigned id.
  pub async fn find(&self, id: &str) -> Result<Account> {
    let id = parse_id(id)?;
    self
      .find_one(&by_id(id))
      .await?
      .ok_or_else(|| Error::NotFound(format!("account {id}")))
  }

  /// Fetch the single account registered under `email`.
  pub async fn find_by_email(&self, email: &str) -> Result<Account> {
    if !credential::validate_email(email) {
      return Err(Error::InvalidParam("email is not valid".into()));
    }
    let filter = Filter::eq(EMAIL_FIELD, email);
    let ids = match self.store.filter_ids(self.live(), &filter).await.map_err(Into::<StoreError>::into) {
      Ok(ids) => ids,
      Err(StoreError::EmptyResult { .. }) => vec![],
      Err(e) => return Err(Error::Store(e)),
    };
    if ids.len() != 1 {
      if ids.len() > 1 {
        tracing::error!(email, count = ids.len(), "email is not unique");
      }
      return Err(Error::NotFound(format!("account {email}")));
    }
    self
      .find_one(&filter)
      .await?
      .ok_or_else(|| Error::NotFound(format!("account {email}")))
  }

  /// Up to `size` random account ids; empty for a non-positive size.
  pub async fn sample_ids(&self, size: i64) -> Result<Vec<String>> {
    self.store.sample(self.live(), size).await.map_err(store)
  }

  /// Ids of every account holding `role`. No match is an `EmptyResult`.
  pub async fn ids_with_role(&self, role: Role) -> Result<Vec<String>> {
    self
      .store
      .filter_ids(self.live(), &Filter::eq("role", role.to_string()))
      .await
      .map_err(store)
  }
}
