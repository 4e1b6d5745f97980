//! Health inventory: what the policy protects and what the store holds.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSeconds": state.started.elapsed().as_secs(),
        "workspace": state.policy.workspace().to_string_lossy(),
        "criticalFiles": state.policy.critical_files(),
        "protectedDirectories": state.policy.protected_dirs(),
        "backupCount": state.backups.count(),
    }))
}
