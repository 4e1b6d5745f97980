//! Policy refusals, one variant per audit reason code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("path escapes the workspace root: {0}")]
    PathTraversal(String),

    #[error("critical system file cannot be modified: {0}")]
    Critical(String),

    #[error("protected system directory: {0}")]
    SystemDirectory(String),

    #[error("credential file access refused: {0}")]
    Credential(String),

    #[error("command blocked: {reason}")]
    CommandBlocked { reason: String },

    #[error("command does not match any allowed pattern: {0}")]
    CommandNotAllowed(String),
}

impl PolicyError {
    /// Stable machine-readable kind, used in error bodies and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PathTraversal(_) => "PathTraversal",
            Self::Critical(_) => "Critical",
            Self::SystemDirectory(_) => "SystemDirectory",
            Self::Credential(_) => "Credential",
            Self::CommandBlocked { .. } => "CommandBlocked",
            Self::CommandNotAllowed(_) => "CommandNotAllowed",
        }
    }
}
