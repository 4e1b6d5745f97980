//! HTTP boundary: one router, shared state, JSON in/out.
//!
//! Requests dispatch to file, execute, browser, or template handlers; each
//! consults the policy engine, and mutation paths additionally consult the
//! backup store. Partial bulk failure is HTTP success; policy and state
//! errors map to 4xx with a stable kind.

pub mod analyze;
pub mod browser;
pub mod error;
pub mod execute;
pub mod files;
pub mod git;
pub mod meta;
pub mod system;
pub mod templates;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use cordon_backup::BackupStore;
use cordon_browser::{BrowserDriver, BrowserSession, UnconfiguredDriver};
use cordon_core::config::{ExecConfig, PolicyConfig, ServerConfig, WorkspaceConfig};
use cordon_exec::Executor;
use cordon_files::FileOps;
use cordon_policy::PolicyEngine;
use cordon_scaffold::TemplateCatalog;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub ops: Arc<FileOps>,
    pub policy: Arc<PolicyEngine>,
    pub backups: Arc<BackupStore>,
    pub executor: Arc<Executor>,
    pub browser: Arc<tokio::sync::Mutex<BrowserSession>>,
    pub catalog: &'static TemplateCatalog,
    pub docs_dir: Option<PathBuf>,
    pub started: Instant,
}

/// Assemble shared state from configuration. The workspace directory is
/// created when missing so a fresh host can start empty.
pub fn build_state(
    workspace_cfg: WorkspaceConfig,
    policy_cfg: PolicyConfig,
    exec_cfg: ExecConfig,
) -> Result<AppState> {
    std::fs::create_dir_all(&workspace_cfg.workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_cfg.workspace.display()
        )
    })?;

    let policy = Arc::new(PolicyEngine::new(&workspace_cfg.workspace, &policy_cfg)?);
    let backups = Arc::new(BackupStore::new(
        workspace_cfg.backup_dir.clone(),
        policy_cfg.backup_retention,
    )?);
    let ops = Arc::new(FileOps::new(policy.clone(), backups.clone()));
    let executor = Arc::new(Executor::new(policy.workspace().to_path_buf(), exec_cfg));
    let browser = Arc::new(tokio::sync::Mutex::new(BrowserSession::new(|| {
        Box::new(UnconfiguredDriver) as Box<dyn BrowserDriver>
    })));

    Ok(AppState {
        ops,
        policy,
        backups,
        executor,
        browser,
        catalog: TemplateCatalog::bundled(),
        docs_dir: workspace_cfg.docs_dir,
        started: Instant::now(),
    })
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/files/create", post(files::create))
        .route("/files/update", post(files::update))
        .route("/files/delete", post(files::delete))
        .route("/files/read", post(files::read))
        .route("/files/list", post(files::list))
        .route("/execute", post(execute::execute))
        .route("/browser/navigate", post(browser::navigate))
        .route("/browser/screenshot", post(browser::screenshot))
        .route("/browser/evaluate", post(browser::evaluate))
        .route("/browser/click", post(browser::click))
        .route("/browser/type", post(browser::type_text))
        .route("/browser/wait-for", post(browser::wait_for))
        .route("/browser/content", post(browser::content))
        .route("/browser/console-logs", post(browser::console_logs))
        .route("/browser/close", post(browser::close))
        .route("/templates", get(templates::list))
        .route("/templates/generate", post(templates::generate))
        .route("/system/health", get(system::health))
        .route("/project/analyze", get(analyze::analyze))
        .route("/workspace/meta", get(meta::meta))
        .route("/git/branch-workflow", post(git::branch_workflow))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the control plane and block until shutdown.
pub fn run(port_override: Option<u16>) -> Result<()> {
    let port = port_override.unwrap_or_else(|| ServerConfig::from_env().port);
    let state = build_state(
        WorkspaceConfig::from_env(),
        PolicyConfig::from_env(),
        ExecConfig::from_env(),
    )?;
    tracing::info!(
        workspace = %state.policy.workspace().display(),
        "policy engine ready"
    );
    let app = build_router(state);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;
        tracing::info!(port, "cordon control plane listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok::<(), anyhow::Error>(())
    })?;
    tracing::info!("clean shutdown");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
