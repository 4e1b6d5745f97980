//! Versioned backup store.
//!
//! Every mutation of a protected file is preceded by a snapshot here: a
//! byte-identical blob plus a `.meta` sidecar carrying the MD5 of the bytes
//! at snapshot time. Retention per original basename is bounded; older
//! snapshots are unlinked oldest-first after each new one lands.
//!
//! The store is fully reconstructible from directory enumeration: no index
//! file, no database.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup io failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("backup metadata serialization failed: {0}")]
    Meta(#[from] serde_json::Error),
}

/// Why a snapshot was taken. Becomes part of the backup file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupContext {
    Update,
    CreateOverwrite,
    Delete,
    Legacy,
}

impl BackupContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::CreateOverwrite => "create-overwrite",
            Self::Delete => "delete",
            Self::Legacy => "legacy",
        }
    }
}

impl fmt::Display for BackupContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sidecar metadata written next to each snapshot blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupMeta {
    pub original_path: String,
    pub context: String,
    pub timestamp: DateTime<Utc>,
    pub size: u64,
    /// Classification level of the original at snapshot time.
    pub level: String,
    pub md5: String,
}

/// One retained snapshot, as reported by `list_all`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,
}

/// The backup store. Owns the backup directory exclusively.
#[derive(Debug)]
pub struct BackupStore {
    dir: PathBuf,
    retention: usize,
    /// Per-basename serialization: retention cleanup must run on a
    /// consistent view; distinct basenames stay independent.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BackupStore {
    pub fn new(dir: PathBuf, retention: usize) -> Result<Self, BackupError> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            retention: retention.max(1),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn basename_lock(&self, basename: &str) -> Arc<Mutex<()>> {
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(basename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Snapshot `source` before a mutation. Returns `None` (without error)
    /// when the source does not exist; the caller's mutation must not
    /// proceed when this returns `Err`.
    pub fn snapshot(
        &self,
        source: &Path,
        level: &str,
        context: BackupContext,
    ) -> Result<Option<PathBuf>, BackupError> {
        if !source.exists() {
            return Ok(None);
        }
        let basename = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let lock = self.basename_lock(&basename);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let bytes = fs::read(source)?;
        let digest = hex::encode(Md5::digest(&bytes));
        let now = Utc::now();
        // ISO 8601 with colons replaced, so names stay portable and
        // lexically sortable.
        let stamp = now.format("%Y-%m-%dT%H-%M-%S%.6fZ").to_string();
        let backup_name = format!("{}.{}.{}.backup", basename, context.as_str(), stamp);
        let backup_path = self.dir.join(&backup_name);

        fs::write(&backup_path, &bytes)?;

        let meta = BackupMeta {
            original_path: source.to_string_lossy().to_string(),
            context: context.as_str().to_string(),
            timestamp: now,
            size: bytes.len() as u64,
            level: level.to_string(),
            md5: digest,
        };
        let meta_path = self.dir.join(format!("{}.meta", backup_name));
        fs::write(&meta_path, serde_json::to_string_pretty(&meta)?)?;

        self.apply_retention(&basename)?;

        tracing::debug!(backup = %backup_name, "snapshot created");
        Ok(Some(backup_path))
    }

    /// Keep the newest `retention` snapshots for `basename`, unlink the rest.
    fn apply_retention(&self, basename: &str) -> Result<(), BackupError> {
        let prefix = format!("{}.", basename);
        let mut snapshots: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.starts_with(&prefix) || !name.ends_with(".backup") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            snapshots.push((entry.path(), modified));
        }
        snapshots.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

        for (path, _) in snapshots.into_iter().skip(self.retention) {
            let _ = fs::remove_file(&path);
            let mut meta = path.as_os_str().to_owned();
            meta.push(".meta");
            let _ = fs::remove_file(PathBuf::from(meta));
        }
        Ok(())
    }

    /// All retained snapshots, newest first.
    pub fn list_all(&self) -> Result<Vec<BackupEntry>, BackupError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.ends_with(".backup") {
                continue;
            }
            let meta = entry.metadata()?;
            entries.push(BackupEntry {
                name,
                size: meta.len(),
                created: meta.created().ok().map(DateTime::<Utc>::from),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            });
        }
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
        Ok(entries)
    }

    /// Number of retained snapshot blobs.
    pub fn count(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|rd| {
                rd.flatten()
                    .filter(|e| e.file_name().to_string_lossy().ends_with(".backup"))
                    .count()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store(dir: &TempDir, retention: usize) -> BackupStore {
        BackupStore::new(dir.path().join("backups"), retention).unwrap()
    }

    // ---- snapshot ----

    #[test]
    fn test_missing_source_is_none() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 10);
        let out = s
            .snapshot(&tmp.path().join("nope.txt"), "SYSTEM_FILE", BackupContext::Update)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn test_snapshot_blob_and_meta() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 10);
        let src = tmp.path().join("App.txt");
        std::fs::write(&src, b"A").unwrap();

        let backup = s
            .snapshot(&src, "PROJECT_FILE", BackupContext::CreateOverwrite)
            .unwrap()
            .unwrap();

        assert_eq!(std::fs::read(&backup).unwrap(), b"A");
        let name = backup.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("App.txt.create-overwrite."));
        assert!(name.ends_with(".backup"));

        let meta_raw =
            std::fs::read_to_string(backup.with_file_name(format!("{}.meta", name))).unwrap();
        let meta: BackupMeta = serde_json::from_str(&meta_raw).unwrap();
        assert_eq!(meta.size, 1);
        assert_eq!(meta.level, "PROJECT_FILE");
        // MD5("A")
        assert_eq!(meta.md5, "7fc56270e7a70fa81a5935b72eacbe29");
    }

    // ---- retention ----

    #[test]
    fn test_retention_bounded_per_basename() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 3);
        let src = tmp.path().join("notes.md");
        for i in 0..7 {
            std::fs::write(&src, format!("v{}", i)).unwrap();
            s.snapshot(&src, "PROJECT_FILE", BackupContext::Update)
                .unwrap();
        }
        assert_eq!(s.count(), 3);

        // An unrelated basename is not affected by cleanup.
        let other = tmp.path().join("other.md");
        std::fs::write(&other, "x").unwrap();
        s.snapshot(&other, "PROJECT_FILE", BackupContext::Update)
            .unwrap();
        assert_eq!(s.count(), 4);
    }

    #[test]
    fn test_retention_keeps_newest() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 2);
        let src = tmp.path().join("a.txt");
        for i in 0..4 {
            std::fs::write(&src, format!("v{}", i)).unwrap();
            s.snapshot(&src, "SYSTEM_FILE", BackupContext::Update)
                .unwrap();
        }
        let newest = &s.list_all().unwrap()[0];
        let blob = std::fs::read_to_string(s.dir().join(&newest.name)).unwrap();
        assert_eq!(blob, "v3");
    }

    // ---- listing ----

    #[test]
    fn test_list_all_newest_first() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 10);
        for name in ["one.txt", "two.txt"] {
            let src = tmp.path().join(name);
            std::fs::write(&src, name).unwrap();
            s.snapshot(&src, "SYSTEM_FILE", BackupContext::Delete).unwrap();
        }
        let all = s.list_all().unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].modified >= all[1].modified);
    }

    #[test]
    fn test_meta_sidecars_removed_with_blobs() {
        let tmp = TempDir::new().unwrap();
        let s = store(&tmp, 1);
        let src = tmp.path().join("b.txt");
        for i in 0..3 {
            std::fs::write(&src, format!("{}", i)).unwrap();
            s.snapshot(&src, "SYSTEM_FILE", BackupContext::Update)
                .unwrap();
        }
        let leftover: Vec<_> = std::fs::read_dir(s.dir())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(leftover.iter().filter(|n| n.ends_with(".backup")).count(), 1);
        assert_eq!(leftover.iter().filter(|n| n.ends_with(".meta")).count(), 1);
    }
}
