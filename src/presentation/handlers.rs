// HTTP request handlers
use axum::Json;
use serde_json::{json, Value};

/// Liveness endpoint polled by the container runtime
pub async fn status() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
