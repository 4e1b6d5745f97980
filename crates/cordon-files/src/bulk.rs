//! Bulk coordinator: one request body, one or many files.
//!
//! A body carrying a `files` array is a bulk request; anything else is
//! single-item. Structural violations (not an array, empty, over the cap,
//! malformed items) reject the whole batch before anything runs. Valid
//! batches fan out concurrently and partial failure is not a batch error.

use std::sync::Arc;
use std::time::Instant;

use cordon_core::protocol::{BulkItemResult, BulkOutcome, CreateItem, DeleteItem, UpdateItem};
use futures_util::future::join_all;
use serde_json::Value;

use crate::error::FileOpError;
use crate::ops::FileOps;

/// Upper bound on items per batch.
pub const MAX_BULK_ITEMS: usize = 50;

/// Which single-item operation the batch lifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkVerb {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
enum BulkItem {
    Create(CreateItem),
    Update(UpdateItem),
    Delete(DeleteItem),
}

impl BulkItem {
    fn file(&self) -> &str {
        match self {
            Self::Create(i) => &i.file_path,
            Self::Update(i) => &i.file_path,
            Self::Delete(i) => &i.file_path,
        }
    }
}

/// Pull the `files` array out of a request body, if present.
/// `Ok(None)` means the body is a single-item request.
pub fn bulk_items(body: &Value) -> Result<Option<Vec<Value>>, FileOpError> {
    match body.get("files") {
        None => Ok(None),
        Some(Value::Array(items)) => {
            if items.is_empty() {
                return Err(FileOpError::InvalidBulkPayload(
                    "files array must not be empty".to_string(),
                ));
            }
            if items.len() > MAX_BULK_ITEMS {
                return Err(FileOpError::InvalidBulkPayload(format!(
                    "files array has {} items (limit {})",
                    items.len(),
                    MAX_BULK_ITEMS
                )));
            }
            Ok(Some(items.clone()))
        }
        Some(_) => Err(FileOpError::InvalidBulkPayload(
            "files must be an array".to_string(),
        )),
    }
}

fn parse_items(verb: BulkVerb, raw: Vec<Value>) -> Result<Vec<BulkItem>, FileOpError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, value)| {
            let parsed = match verb {
                BulkVerb::Create => serde_json::from_value(value).map(BulkItem::Create),
                BulkVerb::Update => serde_json::from_value(value).map(BulkItem::Update),
                BulkVerb::Delete => serde_json::from_value(value).map(BulkItem::Delete),
            };
            parsed.map_err(|e| {
                FileOpError::InvalidBulkPayload(format!("item {}: {}", index, e))
            })
        })
        .collect()
}

/// Run a validated batch. Each item dispatches as an independent blocking
/// task; results come back keyed by input index.
pub async fn run_bulk(
    ops: Arc<FileOps>,
    verb: BulkVerb,
    raw_items: Vec<Value>,
) -> Result<BulkOutcome, FileOpError> {
    let items = parse_items(verb, raw_items)?;
    let total = items.len();
    let started = Instant::now();

    let tasks = items.into_iter().enumerate().map(|(index, item)| {
        let ops = ops.clone();
        tokio::task::spawn_blocking(move || {
            let file = item.file().to_string();
            let outcome = match &item {
                BulkItem::Create(i) => ops.create(i),
                BulkItem::Update(i) => ops.update(i),
                BulkItem::Delete(i) => ops.delete(i),
            };
            match outcome {
                Ok(result) => BulkItemResult::ok(index, file, result),
                Err(e) => BulkItemResult::err(index, file, e.to_string(), e.kind().to_string()),
            }
        })
    });

    let mut results = Vec::with_capacity(total);
    for (index, joined) in join_all(tasks).await.into_iter().enumerate() {
        match joined {
            Ok(record) => results.push(record),
            Err(e) => results.push(BulkItemResult::err(
                index,
                String::new(),
                format!("task failed: {}", e),
                "IOError".to_string(),
            )),
        }
    }

    let errors: Vec<BulkItemResult> =
        results.iter().filter(|r| !r.success).cloned().collect();
    let success_count = total - errors.len();

    Ok(BulkOutcome {
        total_files: total,
        success_count,
        error_count: errors.len(),
        execution_time: started.elapsed().as_millis() as u64,
        results,
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_backup::BackupStore;
    use cordon_core::config::PolicyConfig;
    use cordon_policy::PolicyEngine;
    use serde_json::json;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Arc<FileOps>) {
        let tmp = TempDir::new().unwrap();
        let cfg = PolicyConfig {
            critical_files: vec!["cordon.config.json".to_string()],
            protected_files: vec![],
            protected_dirs: vec!["node_modules".to_string()],
            project_path_patterns: cordon_core::config::schema::default_project_path_patterns(),
            system_dir: "system".to_string(),
            max_read_bytes: 1 << 20,
            backup_retention: 5,
        };
        let policy = Arc::new(PolicyEngine::new(tmp.path(), &cfg).unwrap());
        let backups = Arc::new(BackupStore::new(tmp.path().join(".file-backups"), 5).unwrap());
        (tmp, Arc::new(FileOps::new(policy, backups)))
    }

    // ---- shape detection ----

    #[test]
    fn test_single_body_passes_through() {
        let body = json!({"filePath": "src/a.ts", "content": "x"});
        assert!(bulk_items(&body).unwrap().is_none());
    }

    #[test]
    fn test_bulk_shape_violations() {
        assert!(matches!(
            bulk_items(&json!({"files": []})),
            Err(FileOpError::InvalidBulkPayload(_))
        ));
        assert!(matches!(
            bulk_items(&json!({"files": "nope"})),
            Err(FileOpError::InvalidBulkPayload(_))
        ));
        let too_many: Vec<Value> = (0..51).map(|i| json!({"filePath": format!("src/{}.ts", i)})).collect();
        assert!(matches!(
            bulk_items(&json!({ "files": too_many })),
            Err(FileOpError::InvalidBulkPayload(_))
        ));
    }

    #[test]
    fn test_malformed_item_rejects_batch() {
        let raw = vec![json!({"filePath": "src/a.ts", "content": "x"}), json!({"content": "no path"})];
        let err = parse_items(BulkVerb::Create, raw).unwrap_err();
        assert!(matches!(err, FileOpError::InvalidBulkPayload(_)));
    }

    // ---- accounting ----

    #[tokio::test]
    async fn test_partial_failure_accounting() {
        let (_tmp, ops) = fixture();
        let items = vec![
            json!({"filePath": "src/one.ts", "content": "1"}),
            json!({"filePath": "node_modules/x.js", "content": "2"}),
            json!({"filePath": "src/two.ts", "content": "3"}),
        ];
        let out = run_bulk(ops, BulkVerb::Create, items).await.unwrap();

        assert_eq!(out.total_files, 3);
        assert_eq!(out.success_count, 2);
        assert_eq!(out.error_count, 1);
        assert_eq!(out.results.len(), 3);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].index, 1);
        assert_eq!(out.errors[0].error_type.as_deref(), Some("SystemDirectory"));

        // Every input index appears exactly once, in order.
        let indices: Vec<usize> = out.results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_bulk_success_and_error_records_shaped() {
        let (_tmp, ops) = fixture();
        let items = vec![json!({"filePath": "docs/readme.md", "content": "# hi"})];
        let out = run_bulk(ops, BulkVerb::Create, items).await.unwrap();
        assert!(out.results[0].success);
        assert!(out.results[0].result.is_some());
        assert!(out.results[0].error.is_none());
    }
}
