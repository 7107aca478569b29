//! Configuration management for webfx-modgraph
//!
//! Handles configuration loading (TOML or JSON), validation and environment
//! overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::resolve::artifact::ArtifactPolicy;
use crate::utils::env::{env_bool, env_opt};

/// Project tree configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding the root module descriptor
    #[serde(default = "default_workspace_root")]
    pub root: PathBuf,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: default_workspace_root(),
        }
    }
}

/// Binary repository configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Local Maven-layout repository
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,

    /// Directory with the same layout to download from
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,

    /// Remote repository base URL (requires the `remote` feature)
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Group of modules declaring none along their parent chain
    #[serde(default = "default_group_id")]
    pub default_group_id: String,

    /// Version of modules declaring none along their parent chain
    #[serde(default)]
    pub default_version: Option<String>,

    /// Never download
    #[serde(default = "default_false")]
    pub offline: bool,
}

fn default_local_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".m2").join("repository"))
        .unwrap_or_else(|| PathBuf::from(".m2/repository"))
}

fn default_group_id() -> String {
    "dev.webfx".to_string()
}

fn default_false() -> bool {
    false
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            local_dir: default_local_dir(),
            mirror_dir: None,
            remote_url: None,
            default_group_id: default_group_id(),
            default_version: None,
            offline: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log filter (e.g. "info", "webfx_modgraph=debug"); RUST_LOG takes precedence
    #[serde(default)]
    pub filter: Option<String>,

    /// Emit JSON lines (requires the `json-logging` feature)
    #[serde(default = "default_false")]
    pub json_format: bool,
}

/// Resolver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub repository: RepositoryConfig,

    /// Artifact mapping tables; omitted fields keep their defaults
    #[serde(default)]
    pub artifacts: ArtifactPolicy,

    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

impl ResolverConfig {
    /// Configuration for the project tree rooted at `root`
    pub fn for_workspace<P: AsRef<Path>>(root: P) -> Self {
        Self {
            workspace: WorkspaceConfig {
                root: root.as_ref().to_path_buf(),
            },
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    pub fn from_toml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ResolverConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from JSON file
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ResolverConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to JSON file
    pub fn to_json_file(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `WEBFX_WORKSPACE`, `WEBFX_REPOSITORY`, `WEBFX_OFFLINE` and
    /// `WEBFX_LOG`
    pub fn apply_env_overrides(&mut self) {
        if let Some(root) = env_opt("WEBFX_WORKSPACE") {
            self.workspace.root = PathBuf::from(root);
        }
        if let Some(local_dir) = env_opt("WEBFX_REPOSITORY") {
            self.repository.local_dir = PathBuf::from(local_dir);
        }
        if env_bool("WEBFX_OFFLINE") {
            self.repository.offline = true;
        }
        if let Some(filter) = env_opt("WEBFX_LOG") {
            self.logging.get_or_insert_with(LoggingConfig::default).filter = Some(filter);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workspace.root.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("workspace.root must not be empty"));
        }

        if self.repository.default_group_id.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "repository.default_group_id must not be empty"
            ));
        }

        if let Some(url) = &self.repository.remote_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow::anyhow!(
                    "repository.remote_url must be an http(s) URL, got {}",
                    url
                ));
            }
            #[cfg(not(feature = "remote"))]
            {
                return Err(anyhow::anyhow!(
                    "repository.remote_url requires the 'remote' feature to be enabled"
                ));
            }
        }

        if let Some(mirror) = &self.repository.mirror_dir {
            if *mirror == self.repository.local_dir {
                return Err(anyhow::anyhow!(
                    "repository.mirror_dir must differ from repository.local_dir"
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_config_with_partial_artifact_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webfx.toml");
        std::fs::write(
            &path,
            r#"
[workspace]
root = "projects/demo"

[repository]
local_dir = "/tmp/m2"
default_version = "0.1.0-SNAPSHOT"
offline = true

[artifacts]
compiler_libraries = ["gwt-user"]

[logging]
filter = "debug"
"#,
        )
        .unwrap();

        let config = ResolverConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.workspace.root, PathBuf::from("projects/demo"));
        assert!(config.repository.offline);
        assert_eq!(config.repository.default_group_id, "dev.webfx");
        assert_eq!(config.artifacts.compiler_libraries.len(), 1);
        assert_eq!(
            config.artifacts.emulations,
            ArtifactPolicy::default().emulations
        );
        assert_eq!(
            config.logging.as_ref().and_then(|l| l.filter.as_deref()),
            Some("debug")
        );
        config.validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("webfx.json");
        let config = ResolverConfig::for_workspace("/work/demo");
        config.to_json_file(&path).unwrap();
        assert_eq!(ResolverConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ResolverConfig::for_workspace("demo");
        config.repository.default_group_id = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::for_workspace("demo");
        config.repository.remote_url = Some("ftp://example.org".to_string());
        assert!(config.validate().is_err());

        let mut config = ResolverConfig::for_workspace("demo");
        config.repository.mirror_dir = Some(config.repository.local_dir.clone());
        assert!(config.validate().is_err());
    }
}
