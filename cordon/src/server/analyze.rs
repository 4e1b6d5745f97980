//! Project analysis: type detection off the manifest files present in the
//! workspace, feature detection, and improvement suggestions.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};
use std::path::Path;

use super::AppState;

fn package_manifest(workspace: &Path) -> Option<Value> {
    let raw = std::fs::read_to_string(workspace.join("package.json")).ok()?;
    serde_json::from_str(&raw).ok()
}

fn has_dependency(manifest: &Value, name: &str) -> bool {
    ["dependencies", "devDependencies"]
        .iter()
        .any(|section| manifest.get(section).and_then(|d| d.get(name)).is_some())
}

fn detect_project_type(workspace: &Path, manifest: Option<&Value>) -> &'static str {
    if let Some(manifest) = manifest {
        if has_dependency(manifest, "next") {
            return "nextjs";
        }
        if has_dependency(manifest, "react") {
            return "react";
        }
        if has_dependency(manifest, "vue") {
            return "vue";
        }
        if has_dependency(manifest, "express") {
            return "express";
        }
        return "node";
    }
    if workspace.join("Cargo.toml").exists() {
        return "rust";
    }
    if workspace.join("requirements.txt").exists() || workspace.join("pyproject.toml").exists() {
        return "python";
    }
    "unknown"
}

fn glob_exists(workspace: &Path, names: &[&str]) -> bool {
    names.iter().any(|n| workspace.join(n).exists())
}

pub async fn analyze(State(state): State<AppState>) -> Json<Value> {
    let workspace = state.policy.workspace();
    let manifest = package_manifest(workspace);

    let project_type = detect_project_type(workspace, manifest.as_ref());

    let typescript = glob_exists(workspace, &["tsconfig.json"]);
    let tests = glob_exists(
        workspace,
        &["__tests__", "jest.config.js", "jest.config.ts", "vitest.config.ts"],
    ) || manifest
        .as_ref()
        .map(|m| has_dependency(m, "jest") || has_dependency(m, "vitest"))
        .unwrap_or(false);
    let linting = glob_exists(
        workspace,
        &[".eslintrc", ".eslintrc.json", ".eslintrc.js", "eslint.config.js"],
    );
    let formatting = glob_exists(workspace, &[".prettierrc", ".prettierrc.json"]);
    let ci = workspace.join(".github/workflows").is_dir();
    let docker = glob_exists(workspace, &["Dockerfile", "docker-compose.yml"]);
    let readme = glob_exists(workspace, &["README.md", "readme.md"]);

    let mut features = Vec::new();
    for (flag, name) in [
        (typescript, "typescript"),
        (tests, "tests"),
        (linting, "linting"),
        (formatting, "formatting"),
        (ci, "ci"),
        (docker, "docker"),
    ] {
        if flag {
            features.push(name);
        }
    }

    let mut suggestions = Vec::new();
    if !readme {
        suggestions.push("Add a README.md describing the project");
    }
    if !tests {
        suggestions.push("Add a test setup (jest, vitest, or cargo test)");
    }
    if !linting {
        suggestions.push("Add a linter configuration");
    }
    if !ci {
        suggestions.push("Add a CI workflow under .github/workflows");
    }

    Json(json!({
        "projectType": project_type,
        "hasManifest": manifest.is_some(),
        "features": features,
        "suggestions": suggestions,
    }))
}
