//! Handlers for `/api/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/users?action=create` | Register; role is always `end_user` |
//! | `POST`   | `/users?action=auth`   | Login; returns the account and `authtok` |
//! | `GET`    | `/users?action=auth`   | Verify the `Authorization` token |
//! | `GET`    | `/users?sample=N`      | Random ids; admin only |
//! | `GET`    | `/users?role=R`        | Ids holding a role; admin only |
//! | `GET`    | `/users/{id}`          | 404 if not found |
//! | `PATCH`  | `/users/{id}`          | Owner or admin |
//! | `DELETE` | `/users/{id}[?soft=false]` | Owner or admin; archives by default |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use warden_accounts::{
  address::{AddressLookup, hydrate},
  driver::{AnyStore, create_and_connect},
  repo::{AccountEdit, Accounts, NewAccount},
  session::Claims,
};
use warden_core::{
  account::{Account, AccountView, Address, Role},
  credential,
};

use crate::{
  AppState,
  auth::{Bearer, token_from_headers},
  error::ApiError,
};

type ApiResult<T> = Result<T, ApiError>;

fn parse_body<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
  serde_json::from_value(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn require_privileged(claims: &Claims) -> ApiResult<()> {
  if claims.role.is_privileged() {
    Ok(())
  } else {
    Err(ApiError::Forbidden("administrator role required".into()))
  }
}

/// Fetch the account named by an email or an id.
async fn locate(accounts: &Accounts<'_, AnyStore>, identifier: &str) -> ApiResult<Account> {
  if credential::validate_email(identifier) {
    Ok(accounts.find_by_email(identifier).await?)
  } else {
    Ok(accounts.find(identifier).await?)
  }
}

// ─── Collection ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UsersParams {
  pub action: Option<String>,
  pub sample: Option<i64>,
  pub role:   Option<Role>,
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub name:                String,
  pub email:               String,
  pub password:            String,
  #[serde(default)]
  pub external_contact_id: Option<i64>,
  #[serde(default)]
  pub pincode:             Option<String>,
  #[serde(default)]
  pub post_office:         Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AuthBody {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthReply {
  #[serde(flatten)]
  pub account:    AccountView,
  pub authtok:    String,
  pub expires_at: DateTime<Utc>,
}

/// `POST /users?action=create|auth`
pub async fn submit<L: AddressLookup>(
  State(state): State<AppState<L>>,
  Query(params): Query<UsersParams>,
  Json(body): Json<Value>,
) -> ApiResult<Response> {
  match params.action.as_deref() {
    Some("create") => create(&state, parse_body(body)?).await,
    Some("auth") => login(&state, parse_body(body)?).await,
    _ => Err(ApiError::MethodNotAllowed),
  }
}

async fn create<L: AddressLookup>(state: &AppState<L>, body: CreateBody) -> ApiResult<Response> {
  let candidate = NewAccount {
    name:                body.name,
    email:               body.email,
    password:            body.password,
    external_contact_id: body.external_contact_id,
    pincode:             body.pincode,
    post_office:         body.post_office,
  };
  // Reject bad input before spending a lookup round trip on it.
  candidate.validate()?;
  let address = match &candidate.pincode {
    Some(pincode) => hydrate(&*state.lookup, pincode, candidate.post_office.as_deref()).await,
    None => Address::default(),
  };

  let store = create_and_connect(&state.config.store).await?;
  let account = Accounts::new(&*store).register(candidate, address).await?;
  Ok((StatusCode::CREATED, Json(account.view())).into_response())
}

async fn login<L: AddressLookup>(state: &AppState<L>, body: AuthBody) -> ApiResult<Response> {
  let store = create_and_connect(&state.config.store).await?;
  let accounts = Accounts::new(&*store);
  let login = state
    .sessions
    .authenticate(&accounts, &body.email, &body.password)
    .await?;
  Ok(
    Json(AuthReply {
      account:    login.account,
      authtok:    login.token,
      expires_at: login.expires_at,
    })
    .into_response(),
  )
}

/// `GET /users?action=auth`, `GET /users?sample=N`, `GET /users?role=R`
pub async fn query<L: AddressLookup>(
  State(state): State<AppState<L>>,
  Query(params): Query<UsersParams>,
  headers: HeaderMap,
) -> ApiResult<Response> {
  if params.action.as_deref() == Some("auth") {
    let token = token_from_headers(&headers)
      .ok_or_else(|| ApiError::Forbidden("empty token cannot be authorized".into()))?;
    let claims = state.sessions.authorize(token)?;
    return Ok(Json(claims).into_response());
  }
  if params.action.is_some() || (params.sample.is_none() && params.role.is_none()) {
    return Err(ApiError::MethodNotAllowed);
  }

  let token = token_from_headers(&headers).ok_or(ApiError::MissingToken)?;
  require_privileged(&state.sessions.authorize(token)?)?;

  let store = create_and_connect(&state.config.store).await?;
  let accounts = Accounts::new(&*store);
  let reply = match (params.sample, params.role) {
    (Some(size), _) => {
      let ids = accounts.sample_ids(size).await?;
      json!({ "sample_ids": ids })
    }
    (None, Some(role)) => {
      let ids = accounts.ids_with_role(role).await?;
      json!({ "ids": ids })
    }
    (None, None) => return Err(ApiError::MethodNotAllowed),
  };
  Ok(Json(reply).into_response())
}

// ─── Single account ──────────────────────────────────────────────────────────

/// `GET /users/{id}`
pub async fn get_one<L: AddressLookup>(
  State(state): State<AppState<L>>,
  Path(id): Path<String>,
) -> ApiResult<Json<AccountView>> {
  let store = create_and_connect(&state.config.store).await?;
  let account = Accounts::new(&*store).find(&id).await?;
  Ok(Json(account.view()))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditBody {
  pub name:                Option<String>,
  pub password:            Option<String>,
  pub external_contact_id: Option<i64>,
}

/// `PATCH /users/{id}` where `id` is an account id or email.
pub async fn edit<L: AddressLookup>(
  State(state): State<AppState<L>>,
  Path(id): Path<String>,
  Bearer(claims): Bearer,
  Json(body): Json<EditBody>,
) -> ApiResult<Json<AccountView>> {
  let store = create_and_connect(&state.config.store).await?;
  let accounts = Accounts::new(&*store);

  let target = locate(&accounts, &id).await?;
  if !claims.may_act_on(&target.email) {
    return Err(ApiError::Forbidden("cannot edit another account".into()));
  }

  accounts
    .edit(&id, AccountEdit {
      name:                body.name,
      password:            body.password,
      external_contact_id: body.external_contact_id,
    })
    .await?;
  Ok(Json(locate(&accounts, &id).await?.view()))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
  #[serde(default = "soft_by_default")]
  pub soft: bool,
}

fn soft_by_default() -> bool { true }

/// `DELETE /users/{id}[?soft=false]`
pub async fn remove<L: AddressLookup>(
  State(state): State<AppState<L>>,
  Path(id): Path<String>,
  Query(params): Query<DeleteParams>,
  Bearer(claims): Bearer,
) -> ApiResult<StatusCode> {
  let store = create_and_connect(&state.config.store).await?;
  let accounts = Accounts::new(&*store);

  let target = locate(&accounts, &id).await?;
  if !claims.may_act_on(&target.email) {
    return Err(ApiError::Forbidden("cannot delete another account".into()));
  }
  accounts.delete(&id, params.soft).await?;
  Ok(StatusCode::NO_CONTENT)
}
