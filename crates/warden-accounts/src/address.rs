//! Postal address hydration from a pincode lookup service.

use std::{future::Future, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use warden_core::account::Address;

#[derive(Debug, Error)]
pub enum LookupError {
  /// The service answered with a non-success status.
  #[error("pincode service returned HTTP {0}")]
  Unavailable(u16),

  #[error("pincode request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("malformed pincode payload: {0}")]
  Payload(String),
}

/// Resolve a pincode to the post offices it covers.
pub trait AddressLookup: Send + Sync {
  fn post_offices<'a>(
    &'a self,
    pincode: &'a str,
  ) -> impl Future<Output = Result<Vec<Address>, LookupError>> + Send + 'a;
}

/// Pincodes are six ASCII digits.
pub fn is_valid_pincode(s: &str) -> bool { s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) }

// ─── HTTP client ─────────────────────────────────────────────────────────────

fn default_base_url() -> String { "https://api.postalpincode.in".into() }
fn default_timeout_secs() -> u64 { 4 }

#[derive(Debug, Clone, Deserialize)]
pub struct PincodeConfig {
  #[serde(default = "default_base_url")]
  pub base_url:     String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for PincodeConfig {
  fn default() -> Self {
    Self { base_url: default_base_url(), timeout_secs: default_timeout_secs() }
  }
}

/// [`AddressLookup`] over the public postal pincode API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct PincodeClient {
  client:   reqwest::Client,
  base_url: String,
}

#[derive(Deserialize)]
struct Reply {
  #[serde(rename = "PostOffice", default)]
  post_office: Option<Vec<PostOffice>>,
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct PostOffice {
  name:     String,
  state:    String,
  district: String,
  division: String,
  block:    String,
  country:  String,
  pincode:  String,
}

impl From<PostOffice> for Address {
  fn from(p: PostOffice) -> Self {
    Self {
      post_office: p.name,
      state:       p.state,
      district:    p.district,
      division:    p.division,
      block:       p.block,
      country:     p.country,
      pincode:     p.pincode,
    }
  }
}

impl PincodeClient {
  pub fn new(config: &PincodeConfig) -> Result<Self, LookupError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, base_url: config.base_url.trim_end_matches('/').to_owned() })
  }
}

impl AddressLookup for PincodeClient {
  async fn post_offices(&self, pincode: &str) -> Result<Vec<Address>, LookupError> {
    let url = format!("{}/pincode/{pincode}", self.base_url);
    let resp = self.client.get(&url).send().await?;
    if !resp.status().is_success() {
      return Err(LookupError::Unavailable(resp.status().as_u16()));
    }

    let body = resp.bytes().await?;
    let replies: Vec<Reply> =
      serde_json::from_slice(&body).map_err(|e| LookupError::Payload(e.to_string()))?;
    Ok(
      replies
        .into_iter()
        .next()
        .and_then(|r| r.post_office)
        .unwrap_or_default()
        .into_iter()
        .map(Address::from)
        .collect(),
    )
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

/// Pick the first candidate whose post office name contains `hint`
/// (case-insensitive), or the first candidate when there is no hint or
/// nothing matches.
pub fn pick_post_office<'a>(candidates: &'a [Address], hint: Option<&str>) -> Option<&'a Address> {
  let hint = hint.map(str::trim).filter(|h| !h.is_empty()).map(str::to_lowercase);
  hint
    .and_then(|h| candidates.iter().find(|a| a.post_office.to_lowercase().contains(&h)))
    .or_else(|| candidates.first())
}

/// Resolve `pincode` to a full address. Lookup failures are logged and
/// yield an address carrying only the pincode.
pub async fn hydrate<L: AddressLookup>(lookup: &L, pincode: &str, hint: Option<&str>) -> Address {
  match lookup.post_offices(pincode).await {
    Ok(candidates) => match pick_post_office(&candidates, hint) {
      Some(found) => {
        let mut address = found.clone();
        if address.pincode.is_empty() {
          address.pincode = pincode.to_owned();
        }
        address
      }
      None => {
        tracing::warn!(pincode, "no post offices for pincode");
        Address::from_pincode(pincode)
      }
    },
    Err(e) => {
      tracing::warn!(pincode, error = %e, "address lookup failed");
      Address::from_pincode(pincode)
    }
  }
}
