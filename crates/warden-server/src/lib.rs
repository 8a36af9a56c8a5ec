//! HTTP surface of the Warden account service.
//!
//! Exposes an axum [`Router`] over the account repository and session
//! subsystem. Every request leases its own store connection from the
//! configured driver and releases it before responding.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::sync::Arc;

use axum::{Router, routing::get};
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use warden_accounts::{
  address::{AddressLookup, PincodeConfig},
  session::{Sessions, TokenConfig},
};
use warden_core::store::StoreConfig;

// ─── Configuration ───────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }

/// Runtime server configuration, deserialised from `config.toml` and
/// `WARDEN__*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:    String,
  #[serde(default = "default_port")]
  pub port:    u16,
  pub store:   StoreConfig,
  pub token:   TokenConfig,
  #[serde(default)]
  pub pincode: PincodeConfig,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers. Immutable after
/// startup.
pub struct AppState<L: AddressLookup> {
  pub config:   Arc<ServerConfig>,
  pub sessions: Arc<Sessions>,
  pub lookup:   Arc<L>,
}

impl<L: AddressLookup> Clone for AppState<L> {
  fn clone(&self) -> Self {
    Self {
      config:   self.config.clone(),
      sessions: self.sessions.clone(),
      lookup:   self.lookup.clone(),
    }
  }
}

impl<L: AddressLookup> AppState<L> {
  pub fn new(config: ServerConfig, lookup: L) -> warden_accounts::Result<Self> {
    let sessions = Sessions::new(&config.token)?;
    Ok(Self {
      config:   Arc::new(config),
      sessions: Arc::new(sessions),
      lookup:   Arc::new(lookup),
    })
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the API router.
pub fn router<L>(state: AppState<L>) -> Router
where
  L: AddressLookup + 'static,
{
  use handlers::{ping, users};

  Router::new()
    .route("/api/ping", get(ping))
    .route("/api/users", get(users::query::<L>).post(users::submit::<L>))
    .route(
      "/api/users/{id}",
      get(users::get_one::<L>)
        .patch(users::edit::<L>)
        .delete(users::remove::<L>),
    )
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
