//! Shared fixtures for integration tests
#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;
use webfx_modgraph::module::registry::repository::artifact_path;
use webfx_modgraph::module::registry::{
    LocalRepository, TomlDescriptorStore, DESCRIPTOR_CLASSIFIER, DESCRIPTOR_EXTENSION,
    DESCRIPTOR_FILE,
};
use webfx_modgraph::module::usage::StaticUsage;
use webfx_modgraph::resolve::DependencySeq;
use webfx_modgraph::{ArtifactCoordinates, ModuleDependency, ModuleRef, ResolverConfig, Workspace};

/// Project tree written into a temporary directory
///
/// The root module lives in `<temp>/project`, the local binary repository in
/// `<temp>/repo`.
pub struct ProjectTree {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl ProjectTree {
    pub fn new(root_descriptor: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("project");
        write_descriptor(&root, root_descriptor);
        Self { temp_dir, root }
    }

    /// Add a module below the root; `relative` may be nested ("a/b")
    pub fn with_module(self, relative: &str, descriptor: &str) -> Self {
        write_descriptor(&self.root.join(relative), descriptor);
        self
    }

    pub fn repository(&self) -> PathBuf {
        self.temp_dir.path().join("repo")
    }

    /// Place a published descriptor in the local repository
    pub fn publish(&self, coordinates: &ArtifactCoordinates, descriptor: &str) {
        let path = self.repository().join(artifact_path(
            coordinates,
            Some(DESCRIPTOR_CLASSIFIER),
            DESCRIPTOR_EXTENSION,
        ));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, descriptor).unwrap();
    }

    pub fn config(&self) -> ResolverConfig {
        let mut config = ResolverConfig::for_workspace(&self.root);
        config.repository.local_dir = self.repository();
        config.repository.offline = true;
        config
    }

    pub fn open(&self) -> Workspace {
        Workspace::open(&self.config()).unwrap()
    }

    /// Open with usage recorded by an external source analyzer
    pub fn open_with_usage(&self, usage: StaticUsage) -> Workspace {
        Workspace::with_collaborators(
            &self.config(),
            Rc::new(TomlDescriptorStore::new()),
            Rc::new(LocalRepository::new(self.repository()).offline(true)),
            Rc::new(usage),
        )
        .unwrap()
    }
}

pub fn write_descriptor(dir: &Path, text: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(DESCRIPTOR_FILE), text).unwrap();
}

pub fn names(modules: &[ModuleRef]) -> Vec<String> {
    modules.iter().map(|m| m.name().to_string()).collect()
}

pub fn edges(seq: &DependencySeq) -> Vec<ModuleDependency> {
    seq.try_collect().unwrap()
}

pub fn destinations(seq: &DependencySeq) -> Vec<String> {
    edges(seq).into_iter().map(|e| e.destination).collect()
}

pub fn edge_set(seq: &DependencySeq) -> HashSet<ModuleDependency> {
    edges(seq).into_iter().collect()
}
