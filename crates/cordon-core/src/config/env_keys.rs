//! Environment variable names, grouped by domain.
//!
//! Every configurable surface of cordon reads exactly one of these keys;
//! nothing else in the workspace calls `std::env::var` with a literal.

pub mod server {
    pub const PORT: &str = "CORDON_PORT";
}

pub mod paths {
    pub const WORKSPACE: &str = "CORDON_WORKSPACE";
    pub const BACKUP_DIR: &str = "CORDON_BACKUP_DIR";
    pub const DOCS_DIR: &str = "CORDON_DOCS_DIR";
}

pub mod policy {
    pub const CRITICAL_FILES: &str = "CORDON_CRITICAL_FILES";
    pub const PROTECTED_FILES: &str = "CORDON_PROTECTED_FILES";
    pub const PROTECTED_DIRS: &str = "CORDON_PROTECTED_DIRS";
    pub const PROJECT_PATHS: &str = "CORDON_PROJECT_PATHS";
    pub const SYSTEM_DIR: &str = "CORDON_SYSTEM_DIR";
    pub const MAX_READ_BYTES: &str = "CORDON_MAX_READ_BYTES";
    pub const BACKUP_RETENTION: &str = "CORDON_BACKUP_RETENTION";
}

pub mod exec {
    pub const TIMEOUT_SECS: &str = "CORDON_EXEC_TIMEOUT_SECS";
    pub const LONG_TIMEOUT_SECS: &str = "CORDON_EXEC_LONG_TIMEOUT_SECS";
    pub const KEEPALIVE_SECS: &str = "CORDON_EXEC_KEEPALIVE_SECS";
    pub const SETTLE_SECS: &str = "CORDON_EXEC_SETTLE_SECS";
    pub const AGENT_ENV_PREFIX: &str = "CORDON_AGENT_ENV_PREFIX";
    pub const EXTRA_SAFE_ENV: &str = "CORDON_EXTRA_SAFE_ENV";
}

pub mod observability {
    pub const LOG_LEVEL: &str = "CORDON_LOG_LEVEL";
    pub const LOG_JSON: &str = "CORDON_LOG_JSON";
    pub const QUIET: &str = "CORDON_QUIET";
    pub const AUDIT_LOG: &str = "CORDON_AUDIT_LOG";
}
