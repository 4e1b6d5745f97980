//! Observability: tracing init and the append-only JSONL audit log.
//!
//! Audit sink: CORDON_AUDIT_LOG (disabled when unset). Audit writes are
//! best-effort and never fail the operation that produced them.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup, before anything logs.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level = if cfg.quiet {
        "cordon=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(record: &serde_json::Value) {
    let Some(path) = audit_path() else { return };
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// A policy layer refused an operation.
pub fn audit_policy_denied(kind: &str, subject: &str, reason: &str) {
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "policy_denied",
        "kind": kind,
        "subject": subject,
        "reason": reason,
    }));
}

/// A mutation landed; `backup` is the snapshot path when one was taken.
pub fn audit_mutation(op: &str, path: &str, backup: Option<&str>) {
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "mutation",
        "op": op,
        "path": path,
        "backup": backup,
    }));
}

/// A command passed validation and was handed to the executor.
pub fn audit_command_invoked(execution_id: &str, command: &str, long_operation: bool) {
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "command_invoked",
        "executionId": execution_id,
        "command": command,
        "longOperation": long_operation,
    }));
}

/// An execution reached its terminal state.
pub fn audit_command_completed(execution_id: &str, outcome: &str, exit_code: Option<i32>, elapsed_ms: u64) {
    append_jsonl(&json!({
        "ts": Utc::now().to_rfc3339(),
        "event": "command_completed",
        "executionId": execution_id,
        "outcome": outcome,
        "exitCode": exit_code,
        "elapsedMs": elapsed_ms,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_noop_when_unconfigured() {
        // Must not panic or create files when CORDON_AUDIT_LOG is unset.
        audit_policy_denied("Credential", ".env", "credential file access refused");
        audit_mutation("create", "src/App.tsx", None);
    }
}
