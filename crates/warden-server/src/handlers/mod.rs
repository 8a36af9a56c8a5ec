//! Axum handlers.

pub mod users;

use axum::Json;
use serde_json::{Value, json};

/// `GET /api/ping`
pub async fn ping() -> Json<Value> { Json(json!({ "message": "pong" })) }
