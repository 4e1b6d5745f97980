//! Branch workflow: create-or-checkout a branch, drop a metadata file,
//! commit, and push when an origin remote exists.

use std::path::Path;
use std::sync::OnceLock;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use cordon_core::protocol::CreateItem;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::process::Command;

use super::error::ApiError;
use super::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchWorkflowRequest {
    pub branch_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn valid_branch_name(name: &str) -> bool {
    static BRANCH: OnceLock<Regex> = OnceLock::new();
    BRANCH
        .get_or_init(|| Regex::new(r"^[A-Za-z0-9\-_/]+$").expect("branch pattern must compile"))
        .is_match(name)
}

async fn git(workspace: &Path, args: &[&str]) -> (bool, String) {
    let output = Command::new("git")
        .args(args)
        .current_dir(workspace)
        .output()
        .await;
    match output {
        Ok(out) => {
            let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
            let err = String::from_utf8_lossy(&out.stderr);
            if !err.trim().is_empty() {
                if !text.is_empty() {
                    text.push('\n');
                }
                text.push_str(err.trim());
            }
            (out.status.success(), text.trim().to_string())
        }
        Err(e) => (false, format!("failed to run git: {}", e)),
    }
}

fn step(name: &str, ok: bool, output: String) -> Value {
    json!({"step": name, "ok": ok, "output": output})
}

pub async fn branch_workflow(
    State(state): State<AppState>,
    Json(req): Json<BranchWorkflowRequest>,
) -> Result<Json<Value>, ApiError> {
    if !valid_branch_name(&req.branch_name) {
        return Err(ApiError::bad_request(format!(
            "branch name must match [A-Za-z0-9-_/]+: {}",
            req.branch_name
        )));
    }
    let workspace = state.policy.workspace().to_path_buf();
    let branch = req.branch_name.clone();
    let mut steps = Vec::new();

    let (is_repo, out) = git(&workspace, &["rev-parse", "--is-inside-work-tree"]).await;
    if !is_repo {
        return Err(ApiError::bad_request(format!(
            "workspace is not a git repository: {}",
            out
        )));
    }

    // Create or check out.
    let (exists, _) = git(
        &workspace,
        &["rev-parse", "--verify", &format!("refs/heads/{}", branch)],
    )
    .await;
    let (ok, out) = if exists {
        git(&workspace, &["checkout", &branch]).await
    } else {
        git(&workspace, &["checkout", "-b", &branch]).await
    };
    steps.push(step(if exists { "checkout" } else { "create-branch" }, ok, out));
    if !ok {
        return Ok(Json(json!({"success": false, "branch": branch, "steps": steps})));
    }

    // Branch metadata goes through the policy-gated file layer.
    let metadata = json!({
        "branch": branch,
        "description": req.description,
        "createdAt": Utc::now().to_rfc3339(),
    });
    let ops = state.ops.clone();
    let item = CreateItem {
        file_path: ".cordon/branch.json".to_string(),
        content: serde_json::to_string_pretty(&metadata)
            .map_err(|e| ApiError::internal(e.to_string()))?,
        overwrite: true,
    };
    let meta_result = tokio::task::spawn_blocking(move || ops.create(&item))
        .await
        .map_err(|e| ApiError::internal(format!("task failed: {}", e)))?;
    steps.push(step(
        "write-metadata",
        meta_result.is_ok(),
        match &meta_result {
            Ok(out) => out.path.clone(),
            Err(e) => e.to_string(),
        },
    ));

    let (ok, out) = git(&workspace, &["add", "-A"]).await;
    steps.push(step("add", ok, out));

    let message = format!("chore(workspace): branch workflow for {}", branch);
    let (ok, out) = git(&workspace, &["commit", "-m", &message]).await;
    steps.push(step("commit", ok, out));

    // Push only when an origin remote is configured.
    let (has_origin, _) = git(&workspace, &["remote", "get-url", "origin"]).await;
    if has_origin {
        let (ok, out) = git(&workspace, &["push", "-u", "origin", &branch]).await;
        steps.push(step("push", ok, out));
    } else {
        steps.push(step("push", true, "skipped: no origin remote".to_string()));
    }

    Ok(Json(json!({"success": true, "branch": branch, "steps": steps})))
}
