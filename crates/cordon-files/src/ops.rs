//! The five file operations. For every mutation the sequence is fixed:
//! classify, credential check, existence check, snapshot, write. A failed
//! snapshot aborts the mutation; there is no silent write.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use cordon_backup::{BackupContext, BackupStore};
use cordon_core::observability;
use cordon_core::protocol::{
    CreateItem, DeleteItem, DirEntryInfo, FileOpOutcome, ListOutcome, ListRequest, ReadOutcome,
    UpdateItem,
};
use cordon_policy::paths::{PathDecision, PathLevel};
use cordon_policy::{is_credential_name, PolicyEngine, PolicyError};

use crate::error::FileOpError;

/// Policy-gated operations on the workspace subtree. Owns the subtree
/// exclusively; the backup directory belongs to the store.
pub struct FileOps {
    policy: Arc<PolicyEngine>,
    backups: Arc<BackupStore>,
}

impl FileOps {
    pub fn new(policy: Arc<PolicyEngine>, backups: Arc<BackupStore>) -> Self {
        Self { policy, backups }
    }

    pub fn workspace(&self) -> &Path {
        self.policy.workspace()
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn backups(&self) -> &BackupStore {
        &self.backups
    }

    /// Refuse mutation at CRITICAL and SYSTEM_DIRECTORY levels.
    fn deny_mutation(&self, decision: &PathDecision) -> Result<(), FileOpError> {
        match decision.level {
            PathLevel::Critical => {
                observability::audit_policy_denied("Critical", &decision.relative, &decision.reason);
                Err(PolicyError::Critical(decision.relative.clone()).into())
            }
            PathLevel::SystemDirectory => {
                observability::audit_policy_denied(
                    "SystemDirectory",
                    &decision.relative,
                    &decision.reason,
                );
                Err(PolicyError::SystemDirectory(decision.relative.clone()).into())
            }
            PathLevel::ProjectFile | PathLevel::SystemFile => Ok(()),
        }
    }

    fn deny_credential(&self, decision: &PathDecision) -> Result<(), FileOpError> {
        if decision.credential {
            observability::audit_policy_denied(
                "Credential",
                &decision.relative,
                "credential file access refused",
            );
            return Err(PolicyError::Credential(decision.relative.clone()).into());
        }
        Ok(())
    }

    fn backup_display(&self, backup: &Path) -> String {
        self.policy.relative_display(backup)
    }

    pub fn create(&self, item: &CreateItem) -> Result<FileOpOutcome, FileOpError> {
        let decision = self.policy.classify_path(&item.file_path)?;
        self.deny_mutation(&decision)?;
        self.deny_credential(&decision)?;

        let exists = decision.absolute.exists();
        if exists && !item.overwrite {
            return Err(FileOpError::Exists(decision.relative.clone()));
        }

        let mut backup_path = None;
        if exists && (decision.level == PathLevel::SystemFile || decision.protected_name) {
            backup_path = self.backups.snapshot(
                &decision.absolute,
                decision.level.as_str(),
                BackupContext::CreateOverwrite,
            )?;
        }

        if let Some(parent) = decision.absolute.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&decision.absolute, item.content.as_bytes())?;

        tracing::info!("🆕 {}", decision.relative);
        let backup_display = backup_path.as_deref().map(|p| self.backup_display(p));
        observability::audit_mutation("create", &decision.relative, backup_display.as_deref());

        Ok(FileOpOutcome {
            success: true,
            path: decision.relative.clone(),
            size: Some(item.content.len() as u64),
            backup_path: backup_display,
            message: if exists {
                format!("Overwrote {}", decision.relative)
            } else {
                format!("Created {}", decision.relative)
            },
        })
    }

    pub fn update(&self, item: &UpdateItem) -> Result<FileOpOutcome, FileOpError> {
        // The wire flag is `createBackup`; locally it is only ever a
        // boolean, distinct from the snapshot operation itself.
        let should_snapshot = item.create_backup;

        let decision = self.policy.classify_path(&item.file_path)?;
        self.deny_mutation(&decision)?;
        self.deny_credential(&decision)?;

        if !decision.absolute.exists() {
            return Err(FileOpError::Missing(decision.relative.clone()));
        }

        let forced = decision.level == PathLevel::SystemFile || decision.protected_name;
        let mut backup_path = None;
        if should_snapshot || forced {
            backup_path = self.backups.snapshot(
                &decision.absolute,
                decision.level.as_str(),
                BackupContext::Update,
            )?;
        }

        fs::write(&decision.absolute, item.content.as_bytes())?;

        tracing::info!("✏️ {}", decision.relative);
        let backup_display = backup_path.as_deref().map(|p| self.backup_display(p));
        observability::audit_mutation("update", &decision.relative, backup_display.as_deref());

        Ok(FileOpOutcome {
            success: true,
            path: decision.relative.clone(),
            size: Some(item.content.len() as u64),
            backup_path: backup_display,
            message: format!("Updated {}", decision.relative),
        })
    }

    pub fn delete(&self, item: &DeleteItem) -> Result<FileOpOutcome, FileOpError> {
        let decision = self.policy.classify_path(&item.file_path)?;
        self.deny_mutation(&decision)?;

        if !decision.absolute.exists() {
            return Err(FileOpError::Missing(decision.relative.clone()));
        }
        if decision.protected_name && !item.force {
            return Err(FileOpError::Protected(decision.relative.clone()));
        }

        // Deletion always leaves a snapshot behind.
        let backup_path = self.backups.snapshot(
            &decision.absolute,
            decision.level.as_str(),
            BackupContext::Delete,
        )?;

        fs::remove_file(&decision.absolute)?;

        tracing::info!("🗑️ {}", decision.relative);
        let backup_display = backup_path.as_deref().map(|p| self.backup_display(p));
        observability::audit_mutation("delete", &decision.relative, backup_display.as_deref());

        Ok(FileOpOutcome {
            success: true,
            path: decision.relative.clone(),
            size: None,
            backup_path: backup_display,
            message: format!("Deleted {}", decision.relative),
        })
    }

    pub fn read(&self, file_path: &str) -> Result<ReadOutcome, FileOpError> {
        let decision = self.policy.classify_path(file_path)?;
        if decision.level == PathLevel::SystemDirectory {
            observability::audit_policy_denied(
                "SystemDirectory",
                &decision.relative,
                &decision.reason,
            );
            return Err(PolicyError::SystemDirectory(decision.relative.clone()).into());
        }
        self.deny_credential(&decision)?;

        if !decision.absolute.exists() {
            return Err(FileOpError::Missing(decision.relative.clone()));
        }

        let meta = fs::metadata(&decision.absolute)?;
        let limit = self.policy.max_read_bytes();
        if meta.len() > limit {
            return Err(FileOpError::TooLarge {
                path: decision.relative.clone(),
                size: meta.len(),
                limit,
            });
        }

        let bytes = fs::read(&decision.absolute)?;
        let content = String::from_utf8_lossy(&bytes).into_owned();

        Ok(ReadOutcome {
            path: decision.relative.clone(),
            content,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
            level: decision.level.as_str().to_string(),
            protected: decision.protected_name,
            credential: false,
        })
    }

    pub fn list(&self, req: &ListRequest) -> Result<ListOutcome, FileOpError> {
        let decision = self.policy.classify_path(&req.dir_path)?;
        if decision.level == PathLevel::SystemDirectory {
            observability::audit_policy_denied(
                "SystemDirectory",
                &decision.relative,
                &decision.reason,
            );
            return Err(PolicyError::SystemDirectory(decision.relative.clone()).into());
        }

        if !decision.absolute.exists() {
            return Err(FileOpError::Missing(decision.relative.clone()));
        }
        if !decision.absolute.is_dir() {
            return Err(FileOpError::NotDirectory(decision.relative.clone()));
        }

        let mut entries = Vec::new();
        self.walk(&decision.absolute, &decision.relative, req, &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        tracing::info!(
            "📂 {} entries under {}",
            entries.len(),
            if decision.relative.is_empty() {
                "."
            } else {
                decision.relative.as_str()
            }
        );

        Ok(ListOutcome {
            path: decision.relative.clone(),
            count: entries.len(),
            entries,
        })
    }

    fn walk(
        &self,
        dir: &Path,
        rel_prefix: &str,
        req: &ListRequest,
        out: &mut Vec<DirEntryInfo>,
    ) -> Result<(), FileOpError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            let hidden = name.starts_with('.');
            if hidden && !req.include_hidden {
                continue;
            }
            let credential = is_credential_name(&name);
            if credential && !req.include_credentials {
                continue;
            }

            let rel = if rel_prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", rel_prefix, name)
            };
            let meta = entry.metadata()?;
            let is_dir = meta.is_dir();

            out.push(DirEntryInfo {
                name: name.clone(),
                path: rel.clone(),
                entry_type: if is_dir { "directory" } else { "file" }.to_string(),
                size: (!is_dir).then(|| meta.len()),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
                protected: self.policy.is_protected_name(&name),
                credential,
            });

            if is_dir && req.recursive {
                // Do not descend into denied subtrees (node_modules, .git).
                let child = self.policy.classify_path(&rel);
                if matches!(child, Ok(d) if d.level != PathLevel::SystemDirectory) {
                    self.walk(&entry.path(), &rel, req, out)?;
                }
            }
        }
        Ok(())
    }

    /// Create a directory (and parents) inside the workspace. Used by the
    /// template generator ahead of its per-level file fan-out.
    pub fn ensure_directory(&self, raw: &str) -> Result<String, FileOpError> {
        let decision = self.policy.classify_path(raw)?;
        self.deny_mutation(&decision)?;
        fs::create_dir_all(&decision.absolute)?;
        Ok(decision.relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_core::config::PolicyConfig;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, FileOps) {
        let tmp = TempDir::new().unwrap();
        let cfg = PolicyConfig {
            critical_files: vec!["cordon.config.json".to_string()],
            protected_files: vec!["package.json".to_string()],
            protected_dirs: vec![".git".to_string(), "node_modules".to_string()],
            project_path_patterns: cordon_core::config::schema::default_project_path_patterns(),
            system_dir: "system".to_string(),
            max_read_bytes: 64,
            backup_retention: 5,
        };
        let policy = Arc::new(PolicyEngine::new(tmp.path(), &cfg).unwrap());
        let backups =
            Arc::new(BackupStore::new(tmp.path().join(".file-backups"), 5).unwrap());
        let ops = FileOps::new(policy, backups);
        (tmp, ops)
    }

    fn create_item(path: &str, content: &str, overwrite: bool) -> CreateItem {
        CreateItem {
            file_path: path.to_string(),
            content: content.to_string(),
            overwrite,
        }
    }

    // ---- create ----

    #[test]
    fn test_create_project_file() {
        let (tmp, ops) = fixture();
        let out = ops.create(&create_item("src/App.tsx", "hello", false)).unwrap();
        assert!(out.success);
        assert!(out.backup_path.is_none());
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("src/App.tsx")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_create_existing_requires_overwrite() {
        let (_tmp, ops) = fixture();
        ops.create(&create_item("src/a.ts", "1", false)).unwrap();
        let err = ops.create(&create_item("src/a.ts", "2", false)).unwrap_err();
        assert_eq!(err.kind(), "Exists");
    }

    #[test]
    fn test_overwrite_protected_takes_snapshot() {
        let (tmp, ops) = fixture();
        ops.create(&create_item("src/App.txt", "A", false)).unwrap();
        // Protected by name: snapshot despite PROJECT_FILE level.
        ops.create(&create_item("package.json", "{}", false)).unwrap();
        let out = ops
            .create(&create_item("package.json", "{\"name\":\"x\"}", true))
            .unwrap();
        assert!(out.backup_path.is_some());
        assert_eq!(ops.backups().count(), 1);
        assert!(tmp.path().join(".file-backups").exists());
    }

    #[test]
    fn test_create_critical_denied() {
        let (_tmp, ops) = fixture();
        let err = ops
            .create(&create_item("cordon.config.json", "{}", true))
            .unwrap_err();
        assert_eq!(err.kind(), "Critical");
    }

    #[test]
    fn test_create_in_protected_dir_denied() {
        let (_tmp, ops) = fixture();
        let err = ops
            .create(&create_item("node_modules/pkg/index.js", "x", false))
            .unwrap_err();
        assert_eq!(err.kind(), "SystemDirectory");
    }

    #[test]
    fn test_create_credential_denied() {
        let (_tmp, ops) = fixture();
        let err = ops
            .create(&create_item("config/.env", "SECRET=1", false))
            .unwrap_err();
        assert_eq!(err.kind(), "Credential");
    }

    // ---- update ----

    #[test]
    fn test_update_missing() {
        let (_tmp, ops) = fixture();
        let err = ops
            .update(&UpdateItem {
                file_path: "src/nope.ts".to_string(),
                content: "x".to_string(),
                create_backup: true,
            })
            .unwrap_err();
        assert_eq!(err.kind(), "Missing");
    }

    #[test]
    fn test_update_system_file_forces_snapshot() {
        let (tmp, ops) = fixture();
        // `Makefile` falls outside the project patterns: SYSTEM_FILE.
        std::fs::write(tmp.path().join("Makefile"), "all:").unwrap();
        let out = ops
            .update(&UpdateItem {
                file_path: "Makefile".to_string(),
                content: "all: build".to_string(),
                create_backup: false,
            })
            .unwrap();
        // Snapshot taken even though the caller opted out.
        assert!(out.backup_path.is_some());
    }

    #[test]
    fn test_update_project_file_respects_flag() {
        let (_tmp, ops) = fixture();
        ops.create(&create_item("src/b.ts", "1", false)).unwrap();
        let out = ops
            .update(&UpdateItem {
                file_path: "src/b.ts".to_string(),
                content: "2".to_string(),
                create_backup: false,
            })
            .unwrap();
        assert!(out.backup_path.is_none());
        let out = ops
            .update(&UpdateItem {
                file_path: "src/b.ts".to_string(),
                content: "3".to_string(),
                create_backup: true,
            })
            .unwrap();
        assert!(out.backup_path.is_some());
    }

    // ---- delete ----

    #[test]
    fn test_delete_always_snapshots() {
        let (tmp, ops) = fixture();
        ops.create(&create_item("src/c.ts", "bye", false)).unwrap();
        let out = ops
            .delete(&DeleteItem {
                file_path: "src/c.ts".to_string(),
                force: false,
            })
            .unwrap();
        assert!(out.backup_path.is_some());
        assert!(!tmp.path().join("src/c.ts").exists());
        assert_eq!(ops.backups().count(), 1);
    }

    #[test]
    fn test_delete_protected_requires_force() {
        let (_tmp, ops) = fixture();
        ops.create(&create_item("package.json", "{}", false)).unwrap();
        let err = ops
            .delete(&DeleteItem {
                file_path: "package.json".to_string(),
                force: false,
            })
            .unwrap_err();
        assert_eq!(err.kind(), "Protected");
        ops.delete(&DeleteItem {
            file_path: "package.json".to_string(),
            force: true,
        })
        .unwrap();
    }

    // ---- read ----

    #[test]
    fn test_read_flags_and_limit() {
        let (tmp, ops) = fixture();
        ops.create(&create_item("package.json", "{}", false)).unwrap();
        let out = ops.read("package.json").unwrap();
        assert!(out.protected);
        assert!(!out.credential);
        assert_eq!(out.content, "{}");

        std::fs::write(tmp.path().join("big.md"), vec![b'x'; 100]).unwrap();
        let err = ops.read("big.md").unwrap_err();
        assert_eq!(err.kind(), "TooLarge");
    }

    #[test]
    fn test_read_credential_denied() {
        let (tmp, ops) = fixture();
        std::fs::write(tmp.path().join(".env"), "KEY=VALUE").unwrap();
        let err = ops.read(".env").unwrap_err();
        assert_eq!(err.kind(), "Credential");
    }

    #[test]
    fn test_read_traversal_denied() {
        let (_tmp, ops) = fixture();
        let err = ops.read("../outside.txt").unwrap_err();
        assert_eq!(err.kind(), "PathTraversal");
    }

    // ---- list ----

    #[test]
    fn test_list_omits_credentials_and_hidden() {
        let (tmp, ops) = fixture();
        ops.create(&create_item("src/a.ts", "1", false)).unwrap();
        std::fs::write(tmp.path().join("src/.env"), "X=1").unwrap();
        std::fs::write(tmp.path().join("src/.hidden"), "h").unwrap();

        let out = ops
            .list(&ListRequest {
                dir_path: "src".to_string(),
                recursive: false,
                include_hidden: false,
                include_credentials: false,
            })
            .unwrap();
        assert_eq!(out.count, 1);
        assert_eq!(out.entries[0].name, "a.ts");

        let out = ops
            .list(&ListRequest {
                dir_path: "src".to_string(),
                recursive: false,
                include_hidden: true,
                include_credentials: true,
            })
            .unwrap();
        assert_eq!(out.count, 3);
        assert!(out.entries.iter().any(|e| e.credential));
    }

    #[test]
    fn test_list_not_directory() {
        let (_tmp, ops) = fixture();
        ops.create(&create_item("src/a.ts", "1", false)).unwrap();
        let err = ops
            .list(&ListRequest {
                dir_path: "src/a.ts".to_string(),
                recursive: false,
                include_hidden: false,
                include_credentials: false,
            })
            .unwrap_err();
        assert_eq!(err.kind(), "NotDirectory");
    }
}
