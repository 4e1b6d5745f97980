//! Workspace metadata: package manifest, environment variable names (never
//! values), and doc resources from the configured docs directory.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use super::AppState;

pub async fn meta(State(state): State<AppState>) -> Json<Value> {
    let manifest: Value = std::fs::read_to_string(state.policy.workspace().join("package.json"))
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or(Value::Null);

    let mut env_keys: Vec<String> = std::env::vars().map(|(k, _)| k).collect();
    env_keys.sort();

    let docs: Vec<Value> = state
        .docs_dir
        .as_ref()
        .and_then(|dir| std::fs::read_dir(dir).ok())
        .map(|entries| {
            entries
                .flatten()
                .filter(|e| e.file_name().to_string_lossy().ends_with(".md"))
                .map(|e| {
                    json!({
                        "name": e.file_name().to_string_lossy(),
                        "size": e.metadata().map(|m| m.len()).unwrap_or(0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Json(json!({
        "packageManifest": manifest,
        "envKeys": env_keys,
        "docs": docs,
    }))
}
