mod cli;
mod server;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use cordon_core::config::{PolicyConfig, WorkspaceConfig};
use cordon_policy::PolicyEngine;
use serde_json::json;

fn main() -> Result<()> {
    cordon_core::observability::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => server::run(port),
        Commands::CheckPath { path } => check_path(&path),
        Commands::CheckCommand { command } => check_command(&command),
    }
}

fn engine_from_env() -> Result<PolicyEngine> {
    let workspace_cfg = WorkspaceConfig::from_env();
    std::fs::create_dir_all(&workspace_cfg.workspace)?;
    PolicyEngine::new(&workspace_cfg.workspace, &PolicyConfig::from_env())
}

fn check_path(path: &str) -> Result<()> {
    let engine = engine_from_env()?;
    match engine.classify_path(path) {
        Ok(decision) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "path": decision.relative,
                    "level": decision.level.as_str(),
                    "allowed": decision.allowed,
                    "reason": decision.reason,
                    "protected": decision.protected_name,
                    "credential": decision.credential,
                }))?
            );
            if !decision.allowed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "allowed": false,
                    "kind": e.kind(),
                    "reason": e.to_string(),
                }))?
            );
            std::process::exit(1);
        }
    }
    Ok(())
}

fn check_command(command: &str) -> Result<()> {
    let engine = engine_from_env()?;
    match engine.validate_command(command) {
        Ok(()) => {
            println!("{}", serde_json::to_string_pretty(&json!({"allowed": true}))?);
        }
        Err(e) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "allowed": false,
                    "kind": e.kind(),
                    "reason": e.to_string(),
                }))?
            );
            std::process::exit(1);
        }
    }
    Ok(())
}
