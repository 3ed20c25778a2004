//! Project discovery and structure

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Name of the project marker directory
pub const PROJECT_DIR: &str = ".spectrack";

/// Default directory for spec documents, relative to the project root
pub const DEFAULT_DOCUMENTS_DIR: &str = "specs";

/// Represents a spectrack project
#[derive(Debug, Clone)]
pub struct Project {
    /// Root directory of the project (parent of .spectrack/)
    root: PathBuf,
}

impl Project {
    /// Find project root by walking up from the current directory
    pub fn discover() -> Result<Self, ProjectError> {
        let current = std::env::current_dir().map_err(|e| ProjectError::IoError(e.to_string()))?;
        Self::discover_from(&current)
    }

    /// Find project root by walking up from the given directory
    pub fn discover_from(start: &Path) -> Result<Self, ProjectError> {
        let mut current = start
            .canonicalize()
            .map_err(|e| ProjectError::IoError(e.to_string()))?;

        loop {
            if current.join(PROJECT_DIR).is_dir() {
                return Ok(Self { root: current });
            }

            if !current.pop() {
                return Err(ProjectError::NotFound {
                    searched_from: start.to_path_buf(),
                });
            }
        }
    }

    /// Create a new project structure at the given path
    pub fn init(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if root.join(PROJECT_DIR).exists() {
            return Err(ProjectError::AlreadyExists(root));
        }

        Self::write_structure(&root)?;
        Ok(Self { root })
    }

    /// Initialize even if .spectrack/ exists (rewrites the default config)
    pub fn init_force(path: &Path) -> Result<Self, ProjectError> {
        let root = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        Self::write_structure(&root)?;
        Ok(Self { root })
    }

    fn write_structure(root: &Path) -> Result<(), ProjectError> {
        let dir = root.join(PROJECT_DIR);
        std::fs::create_dir_all(dir.join("backups"))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join("config.yaml"), Self::default_config())
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::write(dir.join(".gitignore"), "store.db-wal\nstore.db-shm\nbackups/\n")
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        std::fs::create_dir_all(root.join(DEFAULT_DOCUMENTS_DIR))
            .map_err(|e| ProjectError::IoError(e.to_string()))?;
        Ok(())
    }

    fn default_config() -> &'static str {
        r#"# spectrack project configuration

# Directory holding {id}.md spec documents, relative to the project root
documents_dir: specs

github:
  # owner: my-org
  # repo: my-repo
  # Projects (v2) board number to add linked issues to
  # project_number: 1
  # Environment variable holding the API token
  token_env: GITHUB_TOKEN
  base_branch: main

workflow:
  # Skip phase-transition checks (never enable for real work)
  test_mode: false

integrity:
  # Run a warn-only integrity check before commands that read specs
  auto_check: true

store:
  busy_timeout_ms: 5000
  backup_before_repair: true
"#
    }

    /// Get the project root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the .spectrack configuration directory
    pub fn config_dir(&self) -> PathBuf {
        self.root.join(PROJECT_DIR)
    }

    /// Directory for store backups
    pub fn backup_dir(&self) -> PathBuf {
        self.config_dir().join("backups")
    }

    /// Resolve a documents directory setting against the project root
    pub fn documents_dir(&self, configured: &Path) -> PathBuf {
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.root.join(configured)
        }
    }
}

/// Errors that can occur during project operations
#[derive(Debug, Error, Diagnostic)]
pub enum ProjectError {
    #[error("not a spectrack project (searched from {searched_from:?})")]
    #[diagnostic(
        code(spectrack::project::not_found),
        help("run 'spectrack init' to create one")
    )]
    NotFound { searched_from: PathBuf },

    #[error("spectrack project already exists at {0:?}")]
    #[diagnostic(code(spectrack::project::exists), help("use --force to rewrite the default config"))]
    AlreadyExists(PathBuf),

    #[error("IO error: {0}")]
    IoError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_project_init_creates_structure() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();

        assert!(project.config_dir().exists());
        assert!(project.config_dir().join("config.yaml").exists());
        assert!(project.backup_dir().is_dir());
        assert!(project.root().join("specs").is_dir());
    }

    #[test]
    fn test_project_init_fails_if_exists() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let err = Project::init(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::AlreadyExists(_)));
        assert!(Project::init_force(tmp.path()).is_ok());
    }

    #[test]
    fn test_project_discover_from_subdirectory() {
        let tmp = tempdir().unwrap();
        Project::init(tmp.path()).unwrap();

        let subdir = tmp.path().join("some/nested/dir");
        std::fs::create_dir_all(&subdir).unwrap();

        let project = Project::discover_from(&subdir).unwrap();
        assert_eq!(
            project.root().canonicalize().unwrap(),
            tmp.path().canonicalize().unwrap()
        );
    }

    #[test]
    fn test_project_discover_fails_without_marker() {
        let tmp = tempdir().unwrap();
        let err = Project::discover_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn test_documents_dir_resolution() {
        let tmp = tempdir().unwrap();
        let project = Project::init(tmp.path()).unwrap();
        assert_eq!(
            project.documents_dir(Path::new("specs")),
            project.root().join("specs")
        );
        assert_eq!(
            project.documents_dir(Path::new("/abs/docs")),
            PathBuf::from("/abs/docs")
        );
    }
}
