//! warden server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers
//! `WARDEN__*` environment variables over it, checks that the configured
//! store can be dialed, and serves the account API over HTTP.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use warden_accounts::{address::PincodeClient, driver::create_and_connect};
use warden_server::{AppState, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Warden account server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Nested keys use a double underscore, e.g. `WARDEN__TOKEN__SECRET`.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("WARDEN").prefix_separator("__").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  tracing::debug!(config = ?server_cfg, "configuration loaded");

  // An unreachable store fails startup, not the first request.
  create_and_connect(&server_cfg.store)
    .await
    .with_context(|| format!("failed to dial store at {:?}", server_cfg.store.host))?
    .release();

  let lookup = PincodeClient::new(&server_cfg.pincode).context("failed to build pincode client")?;
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(server_cfg, lookup).context("invalid token configuration")?;
  let app = warden_server::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
