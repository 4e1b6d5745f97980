//! Template listing and generation handlers.

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub template_id: String,
    pub project_name: String,
}

pub async fn list(State(state): State<AppState>) -> Json<Value> {
    let templates = state.catalog.list();
    Json(json!({"count": templates.len(), "templates": templates}))
}

pub async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>,
) -> Result<Json<Value>, ApiError> {
    let report = cordon_scaffold::generate(
        state.ops.clone(),
        state.catalog,
        &req.template_id,
        &req.project_name,
    )
    .await?;
    Ok(Json(serde_json::to_value(report).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}
