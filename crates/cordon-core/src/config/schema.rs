//! Configuration structs grouped by domain, loaded from the environment.

use super::env_keys::{exec, observability as obs, paths, policy, server};
use super::loader::{env_bool, env_list, env_num, env_optional, env_or};
use std::path::PathBuf;

/// Default TCP port for the control-plane server.
pub const DEFAULT_PORT: u16 = 3001;
/// Backup directory name, always directly under the workspace root.
pub const BACKUP_DIR_NAME: &str = ".file-backups";
/// Largest file `read` will return.
pub const DEFAULT_MAX_READ_BYTES: u64 = 10 * 1024 * 1024;
/// Retained snapshots per original basename.
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env_num(server::PORT, DEFAULT_PORT),
        }
    }
}

/// Workspace and persisted-state paths.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// The single root directory all incoming paths must resolve under.
    pub workspace: PathBuf,
    /// Backup directory (owned exclusively by the backup store).
    pub backup_dir: PathBuf,
    /// Optional directory of doc resources surfaced by `/workspace/meta`.
    pub docs_dir: Option<PathBuf>,
}

impl WorkspaceConfig {
    pub fn from_env() -> Self {
        let workspace = env_optional(paths::WORKSPACE)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
            });
        let backup_dir = env_optional(paths::BACKUP_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| workspace.join(BACKUP_DIR_NAME));
        Self {
            workspace,
            backup_dir,
            docs_dir: env_optional(paths::DOCS_DIR).map(PathBuf::from),
        }
    }
}

/// Policy engine configuration: classification lists and limits.
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    /// Basenames whose mutation is always refused.
    pub critical_files: Vec<String>,
    /// Basenames that require a snapshot before mutation and `force` to delete.
    pub protected_files: Vec<String>,
    /// Workspace-relative directory prefixes denied for all operations.
    pub protected_dirs: Vec<String>,
    /// Anchored regexes marking configured project paths (checked before
    /// the protected-directory denylist).
    pub project_path_patterns: Vec<String>,
    /// The system-utility directory; commands mentioning it are blocked.
    pub system_dir: String,
    pub max_read_bytes: u64,
    pub backup_retention: usize,
}

impl PolicyConfig {
    pub fn from_env() -> Self {
        Self {
            critical_files: env_list(policy::CRITICAL_FILES)
                .unwrap_or_else(default_critical_files),
            protected_files: env_list(policy::PROTECTED_FILES)
                .unwrap_or_else(default_protected_files),
            protected_dirs: env_list(policy::PROTECTED_DIRS)
                .unwrap_or_else(default_protected_dirs),
            project_path_patterns: env_list(policy::PROJECT_PATHS)
                .unwrap_or_else(default_project_path_patterns),
            system_dir: env_or(policy::SYSTEM_DIR, || "system".to_string()),
            max_read_bytes: env_num(policy::MAX_READ_BYTES, DEFAULT_MAX_READ_BYTES),
            backup_retention: env_num(policy::BACKUP_RETENTION, DEFAULT_BACKUP_RETENTION),
        }
    }
}

pub fn default_critical_files() -> Vec<String> {
    ["cordon.config.json", "server.js", ".cordon.lock"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_protected_files() -> Vec<String> {
    ["package.json", "package-lock.json", "tsconfig.json", ".gitignore"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_protected_dirs() -> Vec<String> {
    [".git", "node_modules", ".file-backups", "system", "bin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The configured-project-path allowlist. Anchored against the
/// workspace-relative, forward-slash form of the path.
pub fn default_project_path_patterns() -> Vec<String> {
    let mut patterns: Vec<String> = [
        "src", "components", "app", "pages", "lib", "styles", "public",
        "config", "middleware", "models", "routes", "services",
        "controllers", "hooks", "types", "docs", "__tests__",
    ]
    .iter()
    .map(|d| format!("^{}/", d))
    .collect();

    patterns.extend(
        [
            r"^tsconfig\.json$",
            r"^tailwind\.config\.[\w.]+$",
            r"^next\.config\.[\w.]+$",
            r"^vite\.config\.[\w.]+$",
            r"^\.eslintrc(\.[\w.]+)?$",
            r"^\.prettierrc[\w.]*$",
            r"^jest\.config\.[\w.]+$",
            r"^postcss\.config\.[\w.]+$",
            r"^babel\.config\.[\w.]+$",
            r"\.(md|txt|json)$",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    patterns
}

/// Process-executor configuration.
#[derive(Debug, Clone)]
pub struct ExecConfig {
    pub timeout_secs: u64,
    pub long_timeout_secs: u64,
    pub keepalive_secs: u64,
    /// Post-command settle window in the generated driver.
    pub settle_secs: u64,
    /// Variables whose name starts with this prefix pass through to children.
    pub agent_env_prefix: String,
    /// Extra variable names appended to the safe-env allowlist.
    pub extra_safe_env: Vec<String>,
}

/// Variables a child process inherits regardless of prefix.
pub const SAFE_ENV_VARS: &[&str] = &[
    "PATH", "HOME", "USER", "NODE_ENV", "TZ", "LANG", "LC_ALL", "PWD",
    "TMPDIR", "TEMP", "TMP",
];

impl ExecConfig {
    pub fn from_env() -> Self {
        Self {
            timeout_secs: env_num(exec::TIMEOUT_SECS, 30),
            long_timeout_secs: env_num(exec::LONG_TIMEOUT_SECS, 300),
            keepalive_secs: env_num(exec::KEEPALIVE_SECS, 10),
            settle_secs: env_num(exec::SETTLE_SECS, 5),
            agent_env_prefix: env_or(exec::AGENT_ENV_PREFIX, || "CORDON_".to_string()),
            extra_safe_env: env_list(exec::EXTRA_SAFE_ENV).unwrap_or_default(),
        }
    }
}

/// Observability switches (consumed by `observability::init_tracing`).
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub log_json: bool,
    pub quiet: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: env_or(obs::LOG_LEVEL, || "cordon=info".to_string()),
            log_json: env_bool(obs::LOG_JSON),
            quiet: env_bool(obs::QUIET),
            audit_log: env_optional(obs::AUDIT_LOG),
        }
    }
}
