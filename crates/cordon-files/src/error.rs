//! File-operation failures: the policy layer's refusals plus this crate's
//! own precondition and operational errors.

use cordon_backup::BackupError;
use cordon_policy::PolicyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileOpError {
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error("file already exists: {0} (set overwrite to replace)")]
    Exists(String),

    #[error("file not found: {0}")]
    Missing(String),

    #[error("protected file requires force to delete: {0}")]
    Protected(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("file too large: {path} is {size} bytes (limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },

    #[error("invalid bulk payload: {0}")]
    InvalidBulkPayload(String),

    #[error("backup failed, mutation refused: {0}")]
    Backup(#[from] BackupError),

    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

impl FileOpError {
    /// Stable machine-readable kind for error bodies and bulk records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Policy(p) => p.kind(),
            Self::Exists(_) => "Exists",
            Self::Missing(_) => "Missing",
            Self::Protected(_) => "Protected",
            Self::NotDirectory(_) => "NotDirectory",
            Self::TooLarge { .. } => "TooLarge",
            Self::InvalidBulkPayload(_) => "InvalidBulkPayload",
            Self::Backup(_) => "BackupFailed",
            Self::Io(_) => "IOError",
        }
    }
}
