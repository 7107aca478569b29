//! Module system traits and errors
//!
//! Defines the error taxonomy of the resolution core and the collaborator
//! interfaces it calls out to: descriptor persistence, the binary repository
//! and the static source-usage analyzer.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::module::registry::manifest::ModuleDescriptor;
use crate::module::usage::UsageSet;
use crate::module::{ArtifactCoordinates, Module};

/// Resolution errors
///
/// `Clone` so that cached sequences can replay a failure to every consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Module not found: {0}")]
    UnresolvedModule(String),

    #[error("Ambiguous resolution for {query}: candidates {candidates:?}")]
    AmbiguousResolution {
        query: String,
        candidates: Vec<String>,
    },

    #[error("Circular dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    #[error("Malformed descriptor for {module}: {reason}")]
    MalformedDescriptor { module: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Download of {coordinates} failed: {reason}")]
    Download { coordinates: String, reason: String },
}

impl ResolveError {
    pub fn malformed(module: &str, reason: impl Into<String>) -> Self {
        ResolveError::MalformedDescriptor {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(self, ResolveError::UnresolvedModule(_))
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(e: std::io::Error) -> Self {
        ResolveError::Io(e.to_string())
    }
}

impl From<toml::de::Error> for ResolveError {
    fn from(e: toml::de::Error) -> Self {
        ResolveError::MalformedDescriptor {
            module: "<unknown>".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<toml::ser::Error> for ResolveError {
    fn from(e: toml::ser::Error) -> Self {
        ResolveError::Io(format!("Failed to serialize descriptor: {}", e))
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(e: serde_json::Error) -> Self {
        ResolveError::MalformedDescriptor {
            module: "<unknown>".to_string(),
            reason: e.to_string(),
        }
    }
}

pub type Result<T, E = ResolveError> = std::result::Result<T, E>;

/// Descriptor reader/writer for local modules
pub trait DescriptorStore {
    /// Read the descriptor of the module living in `module_dir`
    ///
    /// Returns `Ok(None)` when the directory holds no descriptor.
    fn read(&self, module_dir: &Path) -> Result<Option<ModuleDescriptor>>;

    /// Persist an updated descriptor
    fn write(&self, module_dir: &Path, descriptor: &ModuleDescriptor) -> Result<()>;

    /// Parse a descriptor file fetched from a binary repository
    fn read_file(&self, path: &Path) -> Result<ModuleDescriptor>;
}

/// Binary-repository client
///
/// Artifacts are addressed by coordinates plus a classifier (`None` for the
/// main artifact) and a file extension.
pub trait RepositoryClient {
    fn local_path(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> PathBuf;

    fn has_local(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> bool {
        self.local_path(coordinates, classifier, extension).is_file()
    }

    /// Fetch the artifact into the local repository
    ///
    /// Returns `Ok(None)` when the remote side does not know the artifact.
    fn download(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> Result<Option<PathBuf>>;

    /// Local path of the artifact, downloading it first when absent
    fn fetch(
        &self,
        coordinates: &ArtifactCoordinates,
        classifier: Option<&str>,
        extension: &str,
    ) -> Result<Option<PathBuf>> {
        if self.has_local(coordinates, classifier, extension) {
            return Ok(Some(self.local_path(coordinates, classifier, extension)));
        }
        self.download(coordinates, classifier, extension)
    }
}

/// Source usage analyzer: which packages, classes and services a module references
pub trait UsageAnalyzer {
    fn analyze(&self, module: &Module) -> Result<UsageSet>;
}
