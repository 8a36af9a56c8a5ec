//! Bearer-token extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use warden_accounts::{address::AddressLookup, session::Claims};

use crate::{AppState, error::ApiError};

/// Verified claims of the request's bearer token.
pub struct Bearer(pub Claims);

/// The raw token from the `Authorization` header. The `Bearer` scheme is
/// optional.
pub fn token_from_headers(headers: &HeaderMap) -> Option<&str> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
  let token = match value.split_once(' ') {
    Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
    _ if value.eq_ignore_ascii_case("bearer") => "",
    _ => value,
  };
  (!token.is_empty()).then_some(token)
}

impl<L: AddressLookup + 'static> FromRequestParts<AppState<L>> for Bearer {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<L>,
  ) -> Result<Self, Self::Rejection> {
    let token = token_from_headers(&parts.headers).ok_or(ApiError::MissingToken)?;
    Ok(Bearer(state.sessions.authorize(token)?))
  }
}
