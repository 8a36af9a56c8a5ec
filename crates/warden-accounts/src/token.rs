//! Compact HS256 tokens: `header.claims.signature`, each part base64url
//! without padding, signed with HMAC-SHA256 over the first two parts.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD as B64};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Error)]
pub enum TokenError {
  #[error("token is not three base64url segments")]
  Malformed,

  #[error("unsupported algorithm {0:?}")]
  UnsupportedAlgorithm(String),

  #[error("unsupported token type {0:?}")]
  UnsupportedType(String),

  #[error("signature does not verify")]
  BadSignature,

  #[error("signing key rejected")]
  Key,

  #[error("token json: {0}")]
  Json(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct Header {
  alg: String,
  typ: String,
}

/// Signs and verifies tokens with one shared secret.
#[derive(Clone)]
pub struct TokenSigner {
  key: Vec<u8>,
}

impl TokenSigner {
  pub fn new(secret: impl AsRef<[u8]>) -> Self { Self { key: secret.as_ref().to_vec() } }

  fn mac(&self) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(&self.key).map_err(|_| TokenError::Key)
  }

  pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
    let header = Header { alg: ALGORITHM.into(), typ: TOKEN_TYPE.into() };
    let signing_input = format!(
      "{}.{}",
      B64.encode(serde_json::to_vec(&header)?),
      B64.encode(serde_json::to_vec(claims)?),
    );

    let mut mac = self.mac()?;
    mac.update(signing_input.as_bytes());
    let signature = B64.encode(mac.finalize().into_bytes());
    Ok(format!("{signing_input}.{signature}"))
  }

  /// Check structure, header (`alg` must be HS256 and `typ` JWT) and
  /// signature, then decode the claims.
  /// Claim semantics such as expiry are left to the caller.
  pub fn verify<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(claims), Some(signature), None) =
      (parts.next(), parts.next(), parts.next(), parts.next())
    else {
      return Err(TokenError::Malformed);
    };

    let decode = |part: &str| B64.decode(part).map_err(|_| TokenError::Malformed);
    let parsed: Header = serde_json::from_slice(&decode(header)?)?;
    if parsed.alg != ALGORITHM {
      return Err(TokenError::UnsupportedAlgorithm(parsed.alg));
    }
    if parsed.typ != TOKEN_TYPE {
      return Err(TokenError::UnsupportedType(parsed.typ));
    }

    let mut mac = self.mac()?;
    mac.update(header.as_bytes());
    mac.update(b".");
    mac.update(claims.as_bytes());
    mac
      .verify_slice(&decode(signature)?)
      .map_err(|_| TokenError::BadSignature)?;

    Ok(serde_json::from_slice(&decode(claims)?)?)
  }
}
