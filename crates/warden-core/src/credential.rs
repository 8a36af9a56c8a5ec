//! Credential utilities: field-format validators and one-way password
//! hashing.
//!
//! The validators are pure predicates over fixed ASCII character classes.
//! Hashing uses argon2id with the crate's default cost parameters and a
//! fresh random salt on every call, so two hashes of the same password never
//! compare equal; only [`verify_password`] can relate them.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Symbols permitted in a password besides ASCII letters and digits.
pub const PASSWORD_SYMBOLS: &str = "_!@#$%^&*-";

pub const PASSWORD_MIN_LEN: usize = 9;
pub const PASSWORD_MAX_LEN: usize = 12;
pub const TITLE_MAX_LEN: usize = 16;

// ─── Validators ──────────────────────────────────────────────────────────────

/// Letters and whitespace only; at least one character.
pub fn validate_name(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_alphabetic() || c.is_ascii_whitespace())
}

/// `local@domain.tld[.sub]`.
///
/// The local part is an alphanumeric run, optionally followed by a single
/// `.`, `-` or `_` separator and another (possibly empty) alphanumeric run.
/// The domain is an alphabetic label, a dot, an alphanumeric TLD of at least
/// two characters, and an optional trailing `.label`.
pub fn validate_email(s: &str) -> bool {
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  email_local_ok(local) && email_domain_ok(domain)
}

fn email_local_ok(local: &str) -> bool {
  let (head, tail) = match local.find(['.', '-', '_']) {
    Some(i) => (&local[..i], &local[i + 1..]),
    None => (local, ""),
  };
  !head.is_empty() && is_alnum(head) && is_alnum(tail)
}

fn email_domain_ok(domain: &str) -> bool {
  let labels: Vec<&str> = domain.split('.').collect();
  match labels.as_slice() {
    [name, tld] => domain_name_ok(name) && tld_ok(tld),
    [name, tld, rest] => domain_name_ok(name) && tld_ok(tld) && is_alnum(rest),
    _ => false,
  }
}

fn domain_name_ok(label: &str) -> bool {
  !label.is_empty() && label.chars().all(|c| c.is_ascii_alphabetic())
}

fn tld_ok(label: &str) -> bool { label.len() >= 2 && is_alnum(label) }

fn is_alnum(s: &str) -> bool { s.chars().all(|c| c.is_ascii_alphanumeric()) }

/// 9 to 12 characters from ASCII alphanumerics and [`PASSWORD_SYMBOLS`].
pub fn validate_password(s: &str) -> bool {
  (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&s.len())
    && s
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SYMBOLS.contains(c))
}

/// 1 to 16 characters from ASCII alphanumerics, whitespace, `.`, `-`, `_`.
pub fn validate_title(s: &str) -> bool {
  (1..=TITLE_MAX_LEN).contains(&s.len())
    && s.chars().all(|c| {
      c.is_ascii_alphanumeric()
        || c.is_ascii_whitespace()
        || matches!(c, '.' | '-' | '_')
    })
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// Hash `clear_text` into an argon2id PHC string.
///
/// CPU- and memory-intensive; async callers should run it on
/// a blocking thread.
pub fn hash_password(clear_text: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(clear_text.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::Hashing(e.to_string()))
}

/// Check `clear_text` against a PHC string produced by [`hash_password`].
pub fn verify_password(hash: &str, clear_text: &str) -> Result<()> {
  let parsed =
    PasswordHash::new(hash).map_err(|e| Error::MalformedHash(e.to_string()))?;

  Argon2::default()
    .verify_password(clear_text.as_bytes(), &parsed)
    .map_err(|e| match e {
      password_hash::Error::Password => Error::Mismatch,
      other => Error::Hashing(other.to_string()),
    })
}
