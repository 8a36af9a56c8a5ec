//! Login and token verification.
//!
//! [`Sessions::authenticate`] checks a password against the stored hash and
//! mints a signed token; [`Sessions::authorize`] verifies a token without
//! touching the store. Nothing about a session is persisted.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};
use warden_core::{
  account::{AccountView, Role},
  credential,
  store::DocumentStore,
};

use crate::{
  Error, Result,
  repo::{Accounts, verify_blocking},
  token::{TokenError, TokenSigner},
};

fn default_issuer() -> String { "warden".into() }
fn default_ttl_secs() -> u64 { 600 }

/// Signing configuration, loaded once at startup.
#[derive(Clone, Deserialize)]
pub struct TokenConfig {
  pub secret:   String,
  #[serde(default = "default_issuer")]
  pub issuer:   String,
  /// Token lifetime; ten minutes by default.
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
}

impl fmt::Debug for TokenConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TokenConfig")
      .field("secret", &"<redacted>")
      .field("issuer", &self.issuer)
      .field("ttl_secs", &self.ttl_secs)
      .finish()
  }
}

/// The signed payload of a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub iss:  String,
  /// Subject email.
  pub sub:  String,
  pub role: Role,
  pub iat:  i64,
  pub exp:  i64,
}

impl Claims {
  pub fn expires_at(&self) -> Option<DateTime<Utc>> { Utc.timestamp_opt(self.exp, 0).single() }

  /// Whether the bearer may act on the account registered as `email`.
  pub fn may_act_on(&self, email: &str) -> bool { self.role.is_privileged() || self.sub == email }
}

/// A successful login.
#[derive(Debug, Clone, Serialize)]
pub struct Login {
  pub account:    AccountView,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

pub struct Sessions {
  signer: TokenSigner,
  issuer: String,
  ttl:    Duration,
}

impl Sessions {
  pub fn new(config: &TokenConfig) -> Result<Self> {
    if config.secret.is_empty() {
      return Err(Error::InvalidParam("token secret must not be empty".into()));
    }
    let ttl = i64::try_from(config.ttl_secs)
      .ok()
      .and_then(Duration::try_seconds)
      .ok_or_else(|| Error::InvalidParam("token ttl out of range".into()))?;
    Ok(Self {
      signer: TokenSigner::new(&config.secret),
      issuer: config.issuer.clone(),
      ttl,
    })
  }

  /// Verify `password` for `email` and mint a token for the stored account.
  ///
  /// Role and id in the result come from the store, never from the caller.
  pub async fn authenticate<S: DocumentStore>(
    &self,
    accounts: &Accounts<'_, S>,
    email: &str,
    password: &str,
  ) -> Result<Login> {
    // A malformed email cannot name an account; report it like any unknown one.
    if !credential::validate_email(email) {
      return Err(Error::NotFound(format!("account {email}")));
    }
    let account = accounts.find_by_email(email).await?;
    verify_blocking(account.credential_hash.clone(), password.to_owned())
      .await
      .inspect_err(|e| {
        if matches!(e, Error::Unauthorized) {
          tracing::info!(email, "password mismatch");
        }
      })?;

    let (token, expires_at) = self.issue(&account.email, account.role, Utc::now())?;
    tracing::info!(email, role = %account.role, "session issued");
    Ok(Login { account: account.view(), token, expires_at })
  }

  pub(crate) fn issue(
    &self,
    email: &str,
    role: Role,
    now: DateTime<Utc>,
  ) -> Result<(String, DateTime<Utc>)> {
    let expires_at = now + self.ttl;
    let claims = Claims {
      iss: self.issuer.clone(),
      sub: email.to_owned(),
      role,
      iat: now.timestamp(),
      exp: expires_at.timestamp(),
    };
    let token = self
      .signer
      .sign(&claims)
      .map_err(|e| Error::Internal(format!("signing token: {e}")))?;
    Ok((token, expires_at))
  }

  /// Verify signature, issuer and expiry. Pure; no store access.
  pub fn authorize(&self, token: &str) -> Result<Claims> { self.authorize_at(token, Utc::now()) }

  pub(crate) fn authorize_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
    let claims: Claims = self.signer.verify(token).map_err(|e: TokenError| {
      tracing::debug!(error = %e, "token rejected");
      Error::InvalidToken(e.to_string())
    })?;
    if claims.iss != self.issuer {
      return Err(Error::InvalidToken(format!("unexpected issuer {:?}", claims.iss)));
    }
    if now.timestamp() >= claims.exp {
      return Err(Error::InvalidToken("token expired".into()));
    }
    Ok(claims)
  }
}
