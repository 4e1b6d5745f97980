//! Browser operation handlers: a thin JSON layer over the shared session.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use base64::Engine;
use cordon_browser::{ContentFormat, ScreenshotTarget, WaitState};
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ApiError;
use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigateRequest {
    pub url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotRequest {
    /// `fullPage` (default), `viewport`, or `selector`.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub selector: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRequest {
    pub expression: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    pub selector: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRequest {
    pub selector: String,
    pub text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitForRequest {
    pub selector: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    /// `html` (default) or `text`.
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleLogsRequest {
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub drain: bool,
}

pub async fn navigate(
    State(state): State<AppState>,
    Json(req): Json<NavigateRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    let url = session.navigate(&req.url).await?;
    Ok(Json(json!({"success": true, "url": url, "state": session.state().as_str()})))
}

pub async fn screenshot(
    State(state): State<AppState>,
    Json(req): Json<ScreenshotRequest>,
) -> Result<Json<Value>, ApiError> {
    let target = match (req.mode.as_deref(), req.selector) {
        (Some("selector"), Some(selector)) => ScreenshotTarget::Selector(selector),
        (Some("selector"), None) => {
            return Err(ApiError::bad_request("selector mode requires a selector"))
        }
        (Some("viewport"), _) => ScreenshotTarget::Viewport,
        (Some("fullPage") | None, _) => ScreenshotTarget::FullPage,
        (Some(other), _) => {
            return Err(ApiError::bad_request(format!(
                "unknown screenshot mode: {}",
                other
            )))
        }
    };
    let mut session = state.browser.lock().await;
    let bytes = session.screenshot(&target).await?;
    Ok(Json(json!({
        "success": true,
        "encoding": "base64",
        "data": base64::engine::general_purpose::STANDARD.encode(bytes),
    })))
}

pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    let result = session.evaluate(&req.expression).await?;
    Ok(Json(json!({"success": true, "result": result})))
}

pub async fn click(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    session.click(&req.selector).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn type_text(
    State(state): State<AppState>,
    Json(req): Json<TypeRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    session.type_text(&req.selector, &req.text).await?;
    Ok(Json(json!({"success": true})))
}

pub async fn wait_for(
    State(state): State<AppState>,
    Json(req): Json<WaitForRequest>,
) -> Result<Json<Value>, ApiError> {
    let wait_state: WaitState = req
        .state
        .as_deref()
        .unwrap_or("visible")
        .parse()
        .map_err(ApiError::bad_request)?;
    let timeout = Duration::from_millis(req.timeout_ms.unwrap_or(5_000));
    let mut session = state.browser.lock().await;
    let found = session.wait_for(&req.selector, wait_state, timeout).await?;
    Ok(Json(json!({"success": true, "found": found})))
}

pub async fn content(
    State(state): State<AppState>,
    Json(req): Json<ContentRequest>,
) -> Result<Json<Value>, ApiError> {
    let format = match req.format.as_deref() {
        None | Some("html") => ContentFormat::Html,
        Some("text") => ContentFormat::Text,
        Some(other) => {
            return Err(ApiError::bad_request(format!(
                "unknown content format: {}",
                other
            )))
        }
    };
    let mut session = state.browser.lock().await;
    let body = session.content(format).await?;
    Ok(Json(json!({"success": true, "content": body})))
}

pub async fn console_logs(
    State(state): State<AppState>,
    Json(req): Json<ConsoleLogsRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    let logs = session.console_logs(req.filter.as_deref(), req.drain);
    Ok(Json(json!({"success": true, "count": logs.len(), "logs": logs})))
}

pub async fn close(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let mut session = state.browser.lock().await;
    session.close().await?;
    Ok(Json(json!({"success": true, "state": session.state().as_str()})))
}
