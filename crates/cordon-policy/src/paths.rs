//! Path classification: every incoming path resolves to exactly one level.
//!
//! Order matters: traversal check, critical basenames, the configured
//! project-path allowlist, then the protected-directory denylist. A project
//! pattern therefore wins even when it sits below a broader protected entry.

use regex::Regex;
use std::path::{Component, Path, PathBuf};

use crate::credentials::is_credential_name;
use crate::error::PolicyError;

/// Classification level for a workspace path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathLevel {
    /// Mutation always refused; read may still be permitted.
    Critical,
    /// All operations on any descendant refused.
    SystemDirectory,
    /// Allowed, no forced backup.
    ProjectFile,
    /// Allowed, forced backup on any mutation.
    SystemFile,
}

impl PathLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::SystemDirectory => "SYSTEM_DIRECTORY",
            Self::ProjectFile => "PROJECT_FILE",
            Self::SystemFile => "SYSTEM_FILE",
        }
    }
}

/// Outcome of classifying one path.
#[derive(Debug, Clone)]
pub struct PathDecision {
    pub level: PathLevel,
    /// Whether mutation is permitted at this level.
    pub allowed: bool,
    pub reason: String,
    /// Workspace-relative, forward-slash form.
    pub relative: String,
    pub absolute: PathBuf,
    pub basename: String,
    /// Basename appears in the protected-names list.
    pub protected_name: bool,
    /// Basename matches the credential predicate.
    pub credential: bool,
}

/// Compiled path rules. Built once from `PolicyConfig` at engine construction.
#[derive(Debug)]
pub struct PathRules {
    workspace: PathBuf,
    critical_files: Vec<String>,
    protected_files: Vec<String>,
    protected_dirs: Vec<String>,
    project_patterns: Vec<Regex>,
}

impl PathRules {
    pub fn new(
        workspace: PathBuf,
        critical_files: Vec<String>,
        protected_files: Vec<String>,
        protected_dirs: Vec<String>,
        project_pattern_sources: &[String],
    ) -> anyhow::Result<Self> {
        let project_patterns = project_pattern_sources
            .iter()
            .map(|p| {
                Regex::new(p)
                    .map_err(|e| anyhow::anyhow!("invalid project path pattern '{}': {}", p, e))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            workspace,
            critical_files,
            protected_files,
            protected_dirs,
            project_patterns,
        })
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn critical_files(&self) -> &[String] {
        &self.critical_files
    }

    pub fn protected_dirs(&self) -> &[String] {
        &self.protected_dirs
    }

    pub fn is_protected_name(&self, basename: &str) -> bool {
        self.protected_files.iter().any(|n| n == basename)
    }

    /// Classify `raw` (absolute or workspace-relative). Fails only on
    /// traversal; every confined path gets a decision.
    pub fn classify(&self, raw: &str) -> Result<PathDecision, PolicyError> {
        let candidate = Path::new(raw);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.workspace.join(candidate)
        };

        let absolute = lexical_normalize(&joined)
            .ok_or_else(|| PolicyError::PathTraversal(raw.to_string()))?;
        if !absolute.starts_with(&self.workspace) {
            return Err(PolicyError::PathTraversal(raw.to_string()));
        }

        let relative = absolute
            .strip_prefix(&self.workspace)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let basename = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let protected_name = self.is_protected_name(&basename);
        let credential = is_credential_name(&basename);

        if self.critical_files.iter().any(|n| *n == basename) {
            return Ok(PathDecision {
                level: PathLevel::Critical,
                allowed: false,
                reason: "Critical system file cannot be modified".to_string(),
                relative,
                absolute,
                basename,
                protected_name,
                credential,
            });
        }

        if self.project_patterns.iter().any(|re| re.is_match(&relative)) {
            return Ok(PathDecision {
                level: PathLevel::ProjectFile,
                allowed: true,
                reason: "Configured project path".to_string(),
                relative,
                absolute,
                basename,
                protected_name,
                credential,
            });
        }

        if let Some(dir) = self
            .protected_dirs
            .iter()
            .find(|d| relative == **d || relative.starts_with(&format!("{}/", d)))
        {
            return Ok(PathDecision {
                level: PathLevel::SystemDirectory,
                allowed: false,
                reason: format!("Protected system directory: {}", dir),
                relative,
                absolute,
                basename,
                protected_name,
                credential,
            });
        }

        Ok(PathDecision {
            level: PathLevel::SystemFile,
            allowed: true,
            reason: "Outside configured project paths; requires careful handling".to_string(),
            relative,
            absolute,
            basename,
            protected_name,
            credential,
        })
    }
}

/// Normalize without touching the filesystem (targets may not exist yet).
/// Returns `None` when `..` would climb above the path's root.
fn lexical_normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for comp in path.components() {
        match comp {
            Component::Prefix(p) => out.push(p.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(c) => {
                out.push(c);
                depth += 1;
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cordon_core::config::schema::{
        default_critical_files, default_project_path_patterns, default_protected_dirs,
        default_protected_files,
    };

    fn rules() -> PathRules {
        PathRules::new(
            PathBuf::from("/workspace/project"),
            default_critical_files(),
            default_protected_files(),
            default_protected_dirs(),
            &default_project_path_patterns(),
        )
        .unwrap()
    }

    // ---- traversal ----

    #[test]
    fn test_traversal_rejected() {
        let r = rules();
        assert!(matches!(
            r.classify("../outside.txt"),
            Err(PolicyError::PathTraversal(_))
        ));
        assert!(matches!(
            r.classify("src/../../etc/passwd"),
            Err(PolicyError::PathTraversal(_))
        ));
        assert!(matches!(
            r.classify("/etc/passwd"),
            Err(PolicyError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_dotdot_inside_workspace_allowed() {
        let r = rules();
        let d = r.classify("src/components/../App.tsx").unwrap();
        assert_eq!(d.relative, "src/App.tsx");
        assert_eq!(d.level, PathLevel::ProjectFile);
    }

    // ---- level ordering ----

    #[test]
    fn test_critical_wins() {
        let r = rules();
        let d = r.classify("cordon.config.json").unwrap();
        assert_eq!(d.level, PathLevel::Critical);
        assert!(!d.allowed);
    }

    #[test]
    fn test_project_pattern_precedes_protected_dir() {
        // `src/` is a project pattern even though a broader denylist entry
        // could cover it in custom configurations.
        let r = rules();
        let d = r.classify("src/index.ts").unwrap();
        assert_eq!(d.level, PathLevel::ProjectFile);
        assert!(d.allowed);
    }

    #[test]
    fn test_protected_directory() {
        let r = rules();
        let d = r.classify("node_modules/react/index.js").unwrap();
        assert_eq!(d.level, PathLevel::SystemDirectory);
        assert!(!d.allowed);
        let d = r.classify(".git").unwrap();
        assert_eq!(d.level, PathLevel::SystemDirectory);
    }

    #[test]
    fn test_markdown_anywhere_is_project_file() {
        let r = rules();
        let d = r.classify("notes/design.md").unwrap();
        assert_eq!(d.level, PathLevel::ProjectFile);
    }

    #[test]
    fn test_system_file_fallback() {
        let r = rules();
        let d = r.classify("Makefile").unwrap();
        assert_eq!(d.level, PathLevel::SystemFile);
        assert!(d.allowed);
    }

    // ---- flags ----

    #[test]
    fn test_protected_and_credential_flags() {
        let r = rules();
        let d = r.classify("package.json").unwrap();
        assert!(d.protected_name);
        assert_eq!(d.level, PathLevel::ProjectFile); // *.json pattern

        let d = r.classify("config/.env").unwrap();
        assert!(d.credential);
    }
}
