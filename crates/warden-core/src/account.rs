//! Accounts: the identity records managed by the service.
//!
//! [`Account`] is the persisted shape and carries the credential hash.
//! [`AccountView`] is the only shape that should ever leave the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Result, document::Document};

/// Name of the live collection's unique business key.
pub const EMAIL_FIELD: &str = "email";

// ─── Role ────────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
  SuperUser,
  Admin,
  #[default]
  EndUser,
  Guest,
}

impl Role {
  /// Privileged roles may act on accounts other than their own.
  pub fn is_privileged(self) -> bool { matches!(self, Self::SuperUser | Self::Admin) }
}

// ─── Address ─────────────────────────────────────────────────────────────────

/// A postal address embedded in an account; not independently addressable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
  pub post_office: String,
  pub state:       String,
  pub district:    String,
  pub division:    String,
  pub block:       String,
  pub country:     String,
  pub pincode:     String,
}

impl Address {
  /// An address carrying only the pincode the user supplied.
  pub fn from_pincode(pincode: impl Into<String>) -> Self {
    Self { pincode: pincode.into(), ..Self::default() }
  }
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// A persisted account. The `id` is assigned by the store on insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
  pub id:                  Option<Uuid>,
  pub name:                String,
  pub email:               String,
  #[serde(default)]
  pub role:                Role,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub external_contact_id: Option<i64>,
  /// argon2 PHC string. Never the clear-text password.
  pub credential_hash:     String,
  #[serde(default)]
  pub address:             Address,
  pub created_at:          DateTime<Utc>,
}

impl Account {
  /// Encode into a store document. A missing `id` is left for the store to
  /// assign.
  pub fn to_document(&self) -> Result<Document> {
    Ok(serde_json::from_value(serde_json::to_value(self)?)?)
  }

  pub fn from_document(doc: Document) -> Result<Self> {
    Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
  }

  pub fn view(&self) -> AccountView { AccountView::from(self) }
}

// ─── Client-facing view ──────────────────────────────────────────────────────

/// The wire shape of an account: no credential hash, id as a plain string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
  pub id:                  String,
  pub name:                String,
  pub email:               String,
  pub role:                Role,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub external_contact_id: Option<i64>,
  pub address:             Address,
  pub created_at:          DateTime<Utc>,
}

impl From<&Account> for AccountView {
  fn from(a: &Account) -> Self {
    Self {
      id:                  a.id.map(|id| id.hyphenated().to_string()).unwrap_or_default(),
      name:                a.name.clone(),
      email:               a.email.clone(),
      role:                a.role,
      external_contact_id: a.external_contact_id,
      address:             a.address.clone(),
      created_at:          a.created_at,
    }
  }
}
