//! The policy envelope: every path and every command an agent submits passes
//! through here before anything touches the filesystem or spawns a process.

pub mod commands;
pub mod credentials;
pub mod error;
pub mod paths;

pub use commands::CommandPolicy;
pub use credentials::is_credential_name;
pub use error::PolicyError;
pub use paths::{PathDecision, PathLevel, PathRules};

use cordon_core::config::PolicyConfig;
use std::path::Path;

/// Compiled policy for one workspace. Built once at startup and shared.
#[derive(Debug)]
pub struct PolicyEngine {
    paths: PathRules,
    commands: CommandPolicy,
    max_read_bytes: u64,
}

impl PolicyEngine {
    /// `workspace` must exist; it is canonicalized so prefix checks are
    /// stable under symlinked parents.
    pub fn new(workspace: &Path, cfg: &PolicyConfig) -> anyhow::Result<Self> {
        let workspace = workspace
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("invalid workspace {}: {}", workspace.display(), e))?;
        let paths = PathRules::new(
            workspace,
            cfg.critical_files.clone(),
            cfg.protected_files.clone(),
            cfg.protected_dirs.clone(),
            &cfg.project_path_patterns,
        )?;
        let commands = CommandPolicy::new(&cfg.critical_files, &cfg.system_dir)?;
        Ok(Self {
            paths,
            commands,
            max_read_bytes: cfg.max_read_bytes,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.paths.workspace()
    }

    pub fn max_read_bytes(&self) -> u64 {
        self.max_read_bytes
    }

    pub fn critical_files(&self) -> &[String] {
        self.paths.critical_files()
    }

    pub fn protected_dirs(&self) -> &[String] {
        self.paths.protected_dirs()
    }

    pub fn classify_path(&self, raw: &str) -> Result<PathDecision, PolicyError> {
        self.paths.classify(raw)
    }

    pub fn is_protected_name(&self, basename: &str) -> bool {
        self.paths.is_protected_name(basename)
    }

    pub fn validate_command(&self, command: &str) -> Result<(), PolicyError> {
        self.commands.validate(command)
    }

    /// Workspace-relative display form for logs.
    pub fn relative_display(&self, absolute: &Path) -> String {
        absolute
            .strip_prefix(self.workspace())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| absolute.to_string_lossy().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_core::config::PolicyConfig;
    use tempfile::TempDir;

    fn engine(dir: &TempDir) -> PolicyEngine {
        let cfg = PolicyConfig {
            critical_files: vec!["cordon.config.json".to_string()],
            protected_files: vec!["package.json".to_string()],
            protected_dirs: vec![".git".to_string(), "node_modules".to_string()],
            project_path_patterns: cordon_core::config::schema::default_project_path_patterns(),
            system_dir: "system".to_string(),
            max_read_bytes: 1024,
            backup_retention: 3,
        };
        PolicyEngine::new(dir.path(), &cfg).unwrap()
    }

    #[test]
    fn test_engine_combines_paths_and_commands() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        assert!(e.classify_path("src/App.tsx").unwrap().allowed);
        assert!(e.validate_command("npm install").is_ok());
        assert!(e.validate_command("rm -rf /").is_err());
    }

    #[test]
    fn test_workspace_is_canonicalized() {
        let dir = TempDir::new().unwrap();
        let e = engine(&dir);
        assert!(e.workspace().is_absolute());
    }
}
