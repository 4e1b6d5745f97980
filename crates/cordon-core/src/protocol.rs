//! Wire types shared between the HTTP boundary and the operation crates.
//!
//! Field names follow the client contract (camelCase). Request structs are
//! also the per-item shapes inside bulk `files` arrays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_dot() -> String {
    ".".to_string()
}

// ─── File operation requests ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItem {
    pub file_path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
    pub file_path: String,
    #[serde(default)]
    pub content: String,
    /// Wire name is `createBackup`; internally this becomes the
    /// `should_snapshot` argument of the update operation.
    #[serde(default = "default_true")]
    pub create_backup: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteItem {
    pub file_path: String,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadRequest {
    pub file_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    #[serde(default = "default_dot")]
    pub dir_path: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub include_hidden: bool,
    #[serde(default)]
    pub include_credentials: bool,
}

// ─── File operation results ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOpOutcome {
    pub success: bool,
    /// Workspace-relative path of the target.
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOutcome {
    pub path: String,
    pub content: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub level: String,
    pub protected: bool,
    pub credential: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntryInfo {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
    pub protected: bool,
    pub credential: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutcome {
    pub path: String,
    pub entries: Vec<DirEntryInfo>,
    pub count: usize,
}

// ─── Bulk accounting ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemResult {
    pub index: usize,
    pub file: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<FileOpOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl BulkItemResult {
    pub fn ok(index: usize, file: String, result: FileOpOutcome) -> Self {
        Self {
            index,
            file,
            success: true,
            result: Some(result),
            error: None,
            error_type: None,
        }
    }

    pub fn err(index: usize, file: String, error: String, error_type: String) -> Self {
        Self {
            index,
            file,
            success: false,
            result: None,
            error: Some(error),
            error_type: Some(error_type),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub total_files: usize,
    pub success_count: usize,
    pub error_count: usize,
    /// Wall-clock for the whole fan-out, in milliseconds.
    pub execution_time: u64,
    pub results: Vec<BulkItemResult>,
    pub errors: Vec<BulkItemResult>,
}

// ─── Execution ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub command: String,
    /// Caller-supplied timeout in milliseconds; overrides both defaults.
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub long_operation: bool,
    #[serde(default)]
    pub stream_output: bool,
    /// Post-command settle window in seconds (driver `sleep`).
    pub command_delay_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub start_time: String,
    pub end_time: String,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_chunks: Option<usize>,
    pub long_operation: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecErrorInfo {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecDiagnostics {
    pub command: String,
    pub working_dir: String,
    pub path_env: String,
    pub runtime_version: String,
    pub platform: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likely_cause: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub install_hints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecFailure {
    pub error: ExecErrorInfo,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<ExecDiagnostics>,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- request parsing ----

    #[test]
    fn test_update_item_backup_defaults_on() {
        let item: UpdateItem =
            serde_json::from_str(r#"{"filePath": "src/a.ts", "content": "x"}"#).unwrap();
        assert!(item.create_backup);
        let item: UpdateItem = serde_json::from_str(
            r#"{"filePath": "src/a.ts", "content": "x", "createBackup": false}"#,
        )
        .unwrap();
        assert!(!item.create_backup);
    }

    #[test]
    fn test_list_request_defaults() {
        let req: ListRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.dir_path, ".");
        assert!(!req.recursive);
        assert!(!req.include_credentials);
    }

    // ---- result shapes ----

    #[test]
    fn test_bulk_item_error_serializes_type_field() {
        let item = BulkItemResult::err(1, "x".into(), "boom".into(), "Denied".into());
        let v = serde_json::to_value(&item).unwrap();
        assert_eq!(v["type"], "Denied");
        assert_eq!(v["success"], false);
        assert!(v.get("result").is_none());
    }

    #[test]
    fn test_exec_outcome_camel_case() {
        let out = ExecOutcome {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
            start_time: "t0".into(),
            end_time: "t1".into(),
            elapsed_ms: 12,
            output_chunks: Some(3),
            long_operation: false,
        };
        let v = serde_json::to_value(&out).unwrap();
        assert_eq!(v["exitCode"], 0);
        assert_eq!(v["outputChunks"], 3);
        assert_eq!(v["elapsedMs"], 12);
    }
}
