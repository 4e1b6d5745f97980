//! Template generator.
//!
//! Templates are trees where string leaves are file contents and object
//! leaves are subdirectories. Generation is a two-phase walk: directories
//! are created sequentially depth-first so parents exist before children,
//! then the files of each level are issued in parallel through the file
//! operations layer (and therefore through the policy envelope).

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use cordon_core::protocol::CreateItem;
use cordon_files::{FileOpError, FileOps};
use futures_util::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScaffoldError {
    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("invalid project name: {0}")]
    InvalidName(String),

    #[error(transparent)]
    File(#[from] FileOpError),
}

impl ScaffoldError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownTemplate(_) => "UnknownTemplate",
            Self::ProjectExists(_) => "ProjectExists",
            Self::InvalidName(_) => "InvalidName",
            Self::File(e) => e.kind(),
        }
    }
}

/// A template tree node: file content or a nested directory.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateNode {
    File(String),
    Dir(BTreeMap<String, TemplateNode>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tree: TemplateNode,
}

/// Listing entry for the HTTP surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

/// One created filesystem entry in the generation report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateReport {
    pub template_id: String,
    pub project_name: String,
    pub directories_created: usize,
    pub files_created: usize,
    pub records: Vec<GeneratedRecord>,
}

/// The bundled templates, parsed once at first access.
pub struct TemplateCatalog {
    templates: BTreeMap<String, Template>,
}

const BUNDLED: &[&str] = &[
    include_str!("../templates/react-vite.json"),
    include_str!("../templates/node-express.json"),
    include_str!("../templates/static-site.json"),
];

impl TemplateCatalog {
    pub fn bundled() -> &'static Self {
        static CATALOG: OnceLock<TemplateCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| {
            let mut templates = BTreeMap::new();
            for raw in BUNDLED {
                let template: Template =
                    serde_json::from_str(raw).expect("bundled template must parse");
                templates.insert(template.id.clone(), template);
            }
            TemplateCatalog { templates }
        })
    }

    pub fn list(&self) -> Vec<TemplateInfo> {
        self.templates
            .values()
            .map(|t| TemplateInfo {
                id: t.id.clone(),
                name: t.name.clone(),
                description: t.description.clone(),
            })
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }
}

fn valid_project_name(name: &str) -> bool {
    static NAME: OnceLock<Regex> = OnceLock::new();
    NAME.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("name pattern must compile"))
        .is_match(name)
}

/// Directories of the tree in depth-first preorder, workspace-relative.
fn collect_dirs(prefix: &str, node: &TemplateNode, out: &mut Vec<String>) {
    if let TemplateNode::Dir(children) = node {
        for (name, child) in children {
            if matches!(child, TemplateNode::Dir(_)) {
                let rel = format!("{}/{}", prefix, name);
                out.push(rel.clone());
                collect_dirs(&rel, child, out);
            }
        }
    }
}

/// File leaves grouped per directory level, in depth-first preorder.
fn collect_file_levels(
    prefix: &str,
    node: &TemplateNode,
    out: &mut Vec<Vec<(String, String)>>,
) {
    if let TemplateNode::Dir(children) = node {
        let level: Vec<(String, String)> = children
            .iter()
            .filter_map(|(name, child)| match child {
                TemplateNode::File(content) => {
                    Some((format!("{}/{}", prefix, name), content.clone()))
                }
                TemplateNode::Dir(_) => None,
            })
            .collect();
        if !level.is_empty() {
            out.push(level);
        }
        for (name, child) in children {
            if matches!(child, TemplateNode::Dir(_)) {
                collect_file_levels(&format!("{}/{}", prefix, name), child, out);
            }
        }
    }
}

/// Generate `template_id` into a new `project_name` directory.
pub async fn generate(
    ops: Arc<FileOps>,
    catalog: &TemplateCatalog,
    template_id: &str,
    project_name: &str,
) -> Result<GenerateReport, ScaffoldError> {
    let template = catalog
        .get(template_id)
        .ok_or_else(|| ScaffoldError::UnknownTemplate(template_id.to_string()))?;
    if !valid_project_name(project_name) {
        return Err(ScaffoldError::InvalidName(project_name.to_string()));
    }
    if ops.workspace().join(project_name).exists() {
        return Err(ScaffoldError::ProjectExists(project_name.to_string()));
    }

    let mut records = Vec::new();

    // Phase 1: directories, sequential, parents before children.
    let mut dirs = vec![project_name.to_string()];
    collect_dirs(project_name, &template.tree, &mut dirs);
    for dir in &dirs {
        let rel = ops.ensure_directory(dir)?;
        records.push(GeneratedRecord {
            kind: "directory".to_string(),
            path: rel,
            size: None,
        });
    }
    let directories_created = dirs.len();

    // Phase 2: files, parallel within each level.
    let mut levels = Vec::new();
    collect_file_levels(project_name, &template.tree, &mut levels);
    let mut files_created = 0usize;
    for level in levels {
        let tasks = level.into_iter().map(|(path, content)| {
            let ops = ops.clone();
            tokio::task::spawn_blocking(move || {
                let size = content.len() as u64;
                ops.create(&CreateItem {
                    file_path: path,
                    content,
                    overwrite: false,
                })
                .map(|out| (out.path, size))
            })
        });
        for joined in join_all(tasks).await {
            let (path, size) = joined
                .map_err(|e| {
                    FileOpError::Io(std::io::Error::other(format!("task failed: {}", e)))
                })??;
            files_created += 1;
            records.push(GeneratedRecord {
                kind: "file".to_string(),
                path,
                size: Some(size),
            });
        }
    }

    tracing::info!(
        "🧩 template {} generated into {} ({} dirs, {} files)",
        template_id,
        project_name,
        directories_created,
        files_created
    );

    Ok(GenerateReport {
        template_id: template_id.to_string(),
        project_name: project_name.to_string(),
        directories_created,
        files_created,
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_backup::BackupStore;
    use cordon_core::config::PolicyConfig;
    use cordon_policy::PolicyEngine;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Arc<FileOps>) {
        let tmp = TempDir::new().unwrap();
        let cfg = PolicyConfig {
            critical_files: vec!["cordon.config.json".to_string()],
            protected_files: vec!["package.json".to_string()],
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

    // ---- catalog ----

    #[test]
    fn test_bundled_catalog_parses() {
        let catalog = TemplateCatalog::bundled();
        let ids: Vec<String> = catalog.list().into_iter().map(|t| t.id).collect();
        assert!(ids.contains(&"react-vite".to_string()));
        assert!(ids.contains(&"node-express".to_string()));
        assert!(ids.contains(&"static-site".to_string()));
    }

    #[test]
    fn test_tree_nodes_deserialize() {
        let node: TemplateNode =
            serde_json::from_str(r#"{"a.txt": "hi", "sub": {"b.txt": "there"}}"#).unwrap();
        let TemplateNode::Dir(children) = &node else {
            panic!("expected dir")
        };
        assert!(matches!(children.get("a.txt"), Some(TemplateNode::File(c)) if c == "hi"));
        assert!(matches!(children.get("sub"), Some(TemplateNode::Dir(_))));
    }

    // ---- generation ----

    #[tokio::test]
    async fn test_generate_static_site() {
        let (tmp, ops) = fixture();
        let report = generate(ops, TemplateCatalog::bundled(), "static-site", "my-site")
            .await
            .unwrap();

        assert!(report.directories_created >= 3); // root, styles, scripts
        assert!(report.files_created >= 4);
        assert!(tmp.path().join("my-site/index.html").exists());
        assert!(tmp.path().join("my-site/styles/main.css").exists());
        assert!(tmp.path().join("my-site/scripts/app.js").exists());
        assert!(report.records.iter().any(|r| r.kind == "directory"));
        assert!(report
            .records
            .iter()
            .any(|r| r.kind == "file" && r.size.unwrap_or(0) > 0));
    }

    #[tokio::test]
    async fn test_generate_twice_fails_with_project_exists() {
        let (tmp, ops) = fixture();
        generate(ops.clone(), TemplateCatalog::bundled(), "static-site", "site")
            .await
            .unwrap();
        let before = std::fs::read_to_string(tmp.path().join("site/index.html")).unwrap();

        let err = generate(ops, TemplateCatalog::bundled(), "static-site", "site")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ProjectExists");

        // First result untouched.
        let after = std::fs::read_to_string(tmp.path().join("site/index.html")).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_unknown_template_and_bad_name() {
        let (_tmp, ops) = fixture();
        let err = generate(ops.clone(), TemplateCatalog::bundled(), "nope", "x")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownTemplate");

        let err = generate(ops, TemplateCatalog::bundled(), "static-site", "../escape")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InvalidName");
    }
}
