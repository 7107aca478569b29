//! Binary repository clients
//!
//! Artifacts are laid out the Maven way:
//! `<root>/<group path>/<artifact>/<version>/<artifact>-<version>[-<classifier>].<ext>`.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::traits::{RepositoryClient, ResolveError, Result};
use crate::module::ArtifactCoordinates;

/// Relative path of an artifact inside a Maven-layout repository
pub fn artifact_path(
    coordinates: &ArtifactCoordinates,
    classifier: Option<&str>,
    extension: &str,
) -> PathBuf {
    let version = coordinates.version.as_deref().unwrap_or("unversioned");
    let mut file = format!("{}-{}", coordinates.artifact_id, version);
    if let Some(classifier) = classifier {
        file.push('-');
        file.push_str(classifier);
    }
    file.push('.');
    file.push_str(extension);

    let mut path = PathBuf::new();
    for segment in coordinates.group_id.split('.') {
        path.push(segment);
    }
    path.push(&coordinates.artifact_id);
    path.push(version);
    path.push(file);
    path
}

/// Local Maven-layout repository
///
/// "Downloading" copies from an optional mirror directory with the same
/// layout; offline mode never downloads.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    root: PathBuf,
    mirror: Option<PathBuf>,
    offline: bool,
}

impl LocalRepository {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            mirror: None,
            offline: false,
        }
    }

    pub fn with_mirror<P: AsRef<Path>>(mut self, mirror: P) -> Self {
        self.mirror = Some(mirror.as_ref().to_path_buf());
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }
}

impl RepositoryClient for LocalRepository {
    fn local_path(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> PathBuf {
        self.root.join(artifact_path(coordinates, classifier, extension))
    }

    fn download(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> Result<Option<PathBuf>> {
        let Some(mirror) = &self.mirror else {
            return Ok(None);
        };
        if self.offline {
            debug!("Offline, not downloading {}", coordinates);
            return Ok(None);
        }

        let relative = artifact_path(coordinates, classifier, extension);
        let source = mirror.join(&relative);
        if !source.is_file() {
            debug!("{} not present in mirror {:?}", coordinates, mirror);
            return Ok(None);
        }

        let target = self.root.join(&relative);
        let copy = || -> std::io::Result<()> {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&source, &target)?;
            Ok(())
        };
        copy().map_err(|e| ResolveError::Download {
            coordinates: coordinates.to_string(),
            reason: e.to_string(),
        })?;

        info!("Downloaded {} into {:?}", coordinates, target);
        Ok(Some(target))
    }
}

/// Remote HTTP(S) Maven repository cached in a [`LocalRepository`]
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct HttpRepository {
    local: LocalRepository,
    base_url: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl HttpRepository {
    pub fn new(local: LocalRepository, base_url: &str) -> Self {
        Self {
            local,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn url_for(&self, relative: &Path) -> String {
        let segments: Vec<String> = relative
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect();
        format!("{}/{}", self.base_url, segments.join("/"))
    }
}

#[cfg(feature = "remote")]
impl RepositoryClient for HttpRepository {
    fn local_path(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> PathBuf {
        self.local.local_path(coordinates, classifier, extension)
    }

    fn download(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> Result<Option<PathBuf>> {
        if self.local.is_offline() {
            return Ok(None);
        }
        let relative = artifact_path(coordinates, classifier, extension);
        let url = self.url_for(&relative);
        let failure = |reason: String| ResolveError::Download {
            coordinates: coordinates.to_string(),
            reason,
        };

        debug!("Fetching {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| failure(e.to_string()))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(failure(format!("HTTP {}", response.status())));
        }
        let bytes = response.bytes().map_err(|e| failure(e.to_string()))?;

        let target = self.local.root().join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| failure(e.to_string()))?;
        }
        std::fs::write(&target, &bytes).map_err(|e| failure(e.to_string()))?;
        info!("Downloaded {} from {}", coordinates, url);
        Ok(Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gav() -> ArtifactCoordinates {
        ArtifactCoordinates::new("dev.webfx", "webfx-kit", Some("0.1.0"))
    }

    #[test]
    fn test_artifact_path_layout() {
        let path = artifact_path(&gav(), Some("module"), "toml");
        assert_eq!(
            path,
            PathBuf::from("dev/webfx/webfx-kit/0.1.0/webfx-kit-0.1.0-module.toml")
        );
        let jar = artifact_path(&gav(), None, "jar");
        assert!(jar.ends_with("webfx-kit-0.1.0.jar"));
    }

    #[test]
    fn test_fetch_downloads_from_mirror() {
        let local = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        let relative = artifact_path(&gav(), None, "jar");
        std::fs::create_dir_all(mirror.path().join(&relative).parent().unwrap()).unwrap();
        std::fs::write(mirror.path().join(&relative), b"jar").unwrap();

        let repo = LocalRepository::new(local.path()).with_mirror(mirror.path());
        assert!(!repo.has_local(&gav(), None, "jar"));
        let fetched = repo.fetch(&gav(), None, "jar").unwrap().unwrap();
        assert_eq!(fetched, local.path().join(&relative));
        assert!(repo.has_local(&gav(), None, "jar"));
    }

    #[test]
    fn test_offline_never_downloads() {
        let local = tempfile::tempdir().unwrap();
        let mirror = tempfile::tempdir().unwrap();
        let relative = artifact_path(&gav(), None, "jar");
        std::fs::create_dir_all(mirror.path().join(&relative).parent().unwrap()).unwrap();
        std::fs::write(mirror.path().join(&relative), b"jar").unwrap();

        let repo = LocalRepository::new(local.path())
            .with_mirror(mirror.path())
            .offline(true);
        assert_eq!(repo.fetch(&gav(), None, "jar").unwrap(), None);
    }
}
