//! Command execution handler. Non-streaming requests return one JSON body;
//! `streamOutput` switches the response to server-sent events with exactly
//! one terminal `complete`/`error` frame before the stream closes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use cordon_core::protocol::ExecuteRequest;
use cordon_exec::{ExecEvent, ExecRequest};
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::error::ApiError;
use super::AppState;

fn to_exec_request(req: &ExecuteRequest) -> ExecRequest {
    ExecRequest {
        command: req.command.clone(),
        timeout: req.timeout_ms.map(Duration::from_millis),
        long_operation: req.long_operation,
        stream_output: req.stream_output,
        settle_secs: req.command_delay_secs,
    }
}

fn event_json(event: ExecEvent) -> Value {
    match event {
        ExecEvent::Stdout { data, timestamp } => {
            json!({"type": "stdout", "data": data, "timestamp": timestamp})
        }
        ExecEvent::Stderr { data, timestamp } => {
            json!({"type": "stderr", "data": data, "timestamp": timestamp})
        }
        ExecEvent::Progress {
            elapsed_ms,
            ms_since_output,
            stdout_tail,
            stderr_tail,
        } => json!({
            "type": "progress",
            "elapsedMs": elapsed_ms,
            "msSinceLastOutput": ms_since_output,
            "stdoutTail": stdout_tail,
            "stderrTail": stderr_tail,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    }
}

pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    // Classification precedes execution; a refused command never spawns.
    if let Err(e) = state.policy.validate_command(&req.command) {
        return ApiError::from(e).into_response();
    }
    let exec_req = to_exec_request(&req);

    if !req.stream_output {
        return match state.executor.run(&exec_req, None).await {
            Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
            Err(failure) => {
                let status = match failure.error.error_type.as_str() {
                    "Timeout" => StatusCode::REQUEST_TIMEOUT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(failure)).into_response()
            }
        };
    }

    // Streaming: chunk/progress frames while running, then one terminal frame.
    let (frame_tx, frame_rx) = mpsc::channel::<Value>(64);
    let (event_tx, mut event_rx) = mpsc::channel::<ExecEvent>(64);

    let forward_tx = frame_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            if forward_tx.send(event_json(event)).await.is_err() {
                break;
            }
        }
    });

    let executor = state.executor.clone();
    tokio::spawn(async move {
        let result = executor.run(&exec_req, Some(event_tx)).await;
        // All chunk frames drain before the terminal frame goes out.
        let _ = forwarder.await;
        let terminal = match result {
            Ok(outcome) => json!({"type": "complete", "result": outcome}),
            Err(failure) => json!({"type": "error", "error": failure}),
        };
        let _ = frame_tx.send(terminal).await;
    });

    let stream = futures_util::stream::unfold(frame_rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|value| (Ok::<Event, Infallible>(Event::default().data(value.to_string())), rx))
    });

    Sse::new(stream).into_response()
}
