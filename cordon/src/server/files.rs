//! File operation handlers. Each mutating endpoint accepts either a
//! single-item body or a `files` array; the bulk coordinator decides.

use axum::extract::State;
use axum::Json;
use cordon_core::protocol::{CreateItem, DeleteItem, ListRequest, ReadRequest, UpdateItem};
use cordon_files::{bulk_items, run_bulk, BulkVerb};
use serde_json::Value;

use super::error::ApiError;
use super::AppState;

async fn dispatch(
    state: AppState,
    verb: BulkVerb,
    body: Value,
) -> Result<Json<Value>, ApiError> {
    if let Some(items) = bulk_items(&body)? {
        let outcome = run_bulk(state.ops.clone(), verb, items).await?;
        return Ok(Json(serde_json::to_value(outcome).map_err(|e| {
            ApiError::internal(e.to_string())
        })?));
    }

    let ops = state.ops.clone();
    let outcome = match verb {
        BulkVerb::Create => {
            let item: CreateItem = serde_json::from_value(body)?;
            tokio::task::spawn_blocking(move || ops.create(&item))
        }
        BulkVerb::Update => {
            let item: UpdateItem = serde_json::from_value(body)?;
            tokio::task::spawn_blocking(move || ops.update(&item))
        }
        BulkVerb::Delete => {
            let item: DeleteItem = serde_json::from_value(body)?;
            tokio::task::spawn_blocking(move || ops.delete(&item))
        }
    }
    .await
    .map_err(|e| ApiError::internal(format!("task failed: {}", e)))??;

    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    dispatch(state, BulkVerb::Create, body).await
}

pub async fn update(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    dispatch(state, BulkVerb::Update, body).await
}

pub async fn delete(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    dispatch(state, BulkVerb::Delete, body).await
}

pub async fn read(
    State(state): State<AppState>,
    Json(req): Json<ReadRequest>,
) -> Result<Json<Value>, ApiError> {
    let ops = state.ops.clone();
    let outcome = tokio::task::spawn_blocking(move || ops.read(&req.file_path))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {}", e)))??;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}

pub async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListRequest>,
) -> Result<Json<Value>, ApiError> {
    let ops = state.ops.clone();
    let outcome = tokio::task::spawn_blocking(move || ops.list(&req))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {}", e)))??;
    Ok(Json(serde_json::to_value(outcome).map_err(|e| {
        ApiError::internal(e.to_string())
    })?))
}
