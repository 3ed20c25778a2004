//! Configuration management with layered hierarchy
//!
//! Layers, lowest to highest priority: built-in defaults, the global user
//! config (`~/.config/spectrack/config.yaml`), the project config
//! (`.spectrack/config.yaml`), then environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::core::project::{Project, DEFAULT_DOCUMENTS_DIR};

/// spectrack configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding spec documents (relative to the project root)
    pub documents_dir: PathBuf,

    pub github: GitHubConfig,
    pub workflow: WorkflowConfig,
    pub integrity: IntegrityConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from(DEFAULT_DOCUMENTS_DIR),
            github: GitHubConfig::default(),
            workflow: WorkflowConfig::default(),
            integrity: IntegrityConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

/// Remote tracker settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,

    /// Projects (v2) board number; linked issues are added to it when set
    pub project_number: Option<u64>,

    /// Single-select field on the board that mirrors the phase
    pub status_field: String,

    /// Name of the environment variable holding the bearer token
    pub token_env: String,

    /// Target branch for pull requests
    pub base_branch: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            project_number: None,
            status_field: "Status".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            base_branch: "main".to_string(),
        }
    }
}

impl GitHubConfig {
    /// `owner/repo`, when both are configured
    pub fn repo_slug(&self) -> Option<String> {
        match (&self.owner, &self.repo) {
            (Some(owner), Some(repo)) => Some(format!("{}/{}", owner, repo)),
            _ => None,
        }
    }

    /// Read the token from the configured environment variable
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

/// Lifecycle settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Bypass phase-transition checks
    pub test_mode: bool,
}

/// Integrity check settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntegrityConfig {
    /// Run a warn-only check before commands that read specs
    pub auto_check: bool,
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self { auto_check: true }
    }
}

/// Local store settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How long to wait on a competing writer before failing with a retryable error
    pub busy_timeout_ms: u64,

    /// Snapshot the store before `repair` writes to it
    pub backup_before_repair: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5000,
            backup_before_repair: true,
        }
    }
}

impl StoreConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Config {
    /// Load configuration from all sources, merging in priority order
    pub fn load(project: Option<&Project>) -> Self {
        let mut layers = Vec::new();

        if let Some(global_path) = Self::global_config_path() {
            if let Ok(contents) = std::fs::read_to_string(&global_path) {
                layers.push((global_path, contents));
            }
        }

        if let Some(project) = project {
            let path = project.config_dir().join("config.yaml");
            if let Ok(contents) = std::fs::read_to_string(&path) {
                layers.push((path, contents));
            }
        }

        let mut config = Self::from_layers(&layers);
        config.apply_env();
        config
    }

    /// Merge YAML layers (later wins) over the built-in defaults
    ///
    /// A layer that fails to parse is skipped with a warning.
    pub fn from_layers(layers: &[(PathBuf, String)]) -> Self {
        let mut merged = serde_yml::Value::Mapping(serde_yml::Mapping::new());

        for (path, contents) in layers {
            match serde_yml::from_str::<serde_yml::Value>(contents) {
                Ok(serde_yml::Value::Null) => {}
                Ok(value) => merge_values(&mut merged, value),
                Err(e) => warn!(path = %path.display(), error = %e, "ignoring unreadable config"),
            }
        }

        match serde_yml::from_value::<Config>(merged) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "invalid configuration, using defaults");
                Config::default()
            }
        }
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = std::env::var("SPECTRACK_DOCUMENTS_DIR") {
            self.documents_dir = PathBuf::from(dir);
        }
        if let Ok(flag) = std::env::var("SPECTRACK_TEST_MODE") {
            self.workflow.test_mode = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Ok(owner) = std::env::var("SPECTRACK_GITHUB_OWNER") {
            self.github.owner = Some(owner);
        }
        if let Ok(repo) = std::env::var("SPECTRACK_GITHUB_REPO") {
            self.github.repo = Some(repo);
        }
    }

    /// Get the path to the global config file
    fn global_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "spectrack")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }
}

/// Deep-merge `overlay` into `base`; mappings merge key by key, anything else replaces
fn merge_values(base: &mut serde_yml::Value, overlay: serde_yml::Value) {
    match (base, overlay) {
        (serde_yml::Value::Mapping(base_map), serde_yml::Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(contents: &str) -> (PathBuf, String) {
        (PathBuf::from("test.yaml"), contents.to_string())
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_layers(&[]);
        assert_eq!(config.documents_dir, PathBuf::from("specs"));
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
        assert_eq!(config.github.base_branch, "main");
        assert!(config.integrity.auto_check);
        assert!(!config.workflow.test_mode);
        assert_eq!(config.store.busy_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_later_layers_win_per_key() {
        let global = layer("github:\n  owner: acme\n  repo: specs\nstore:\n  busy_timeout_ms: 100\n");
        let project = layer("github:\n  repo: other\nworkflow:\n  test_mode: true\n");
        let config = Config::from_layers(&[global, project]);

        assert_eq!(config.github.repo_slug().as_deref(), Some("acme/other"));
        assert_eq!(config.store.busy_timeout_ms, 100);
        assert!(config.workflow.test_mode);
        // Untouched nested defaults survive a partial section
        assert_eq!(config.github.token_env, "GITHUB_TOKEN");
    }

    #[test]
    fn test_unparseable_layer_is_skipped() {
        let good = layer("documents_dir: docs/specs\n");
        let bad = layer("github: [unclosed\n");
        let config = Config::from_layers(&[good, bad]);
        assert_eq!(config.documents_dir, PathBuf::from("docs/specs"));
    }

    #[test]
    fn test_repo_slug_requires_both_parts() {
        let mut github = GitHubConfig::default();
        assert!(github.repo_slug().is_none());
        github.owner = Some("acme".to_string());
        assert!(github.repo_slug().is_none());
        github.repo = Some("specs".to_string());
        assert_eq!(github.repo_slug().as_deref(), Some("acme/specs"));
    }
}
