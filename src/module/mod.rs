//! Module graph entities
//!
//! Every module known to a run is owned by the [`ModuleRegistry`] and shared
//! as a [`ModuleRef`]. Parent/child links and dependency edges are stored as
//! names, resolved through the registry on demand.
//!
//! ## Variants
//!
//! - **Platform**: built-in runtime modules, never an external artifact
//! - **Library**: third-party artifact referenced by coordinate
//! - **Root** / **Dev**: local editable modules backed by a directory
//! - **Published**: resolved from a binary repository
//! - **Imported**: reconstructed from an export snapshot

pub mod dependency;
pub mod registry;
pub mod target;
pub mod traits;
pub mod usage;
pub mod validation;

use std::cell::RefCell;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

pub use dependency::{BuildInfo, DependencyType, ModuleDependency};
pub use registry::manifest::{AutoInjectCondition, ModuleDescriptor};
pub use registry::ModuleRegistry;
pub use target::{Target, TargetTag};
pub use traits::{DescriptorStore, RepositoryClient, ResolveError, UsageAnalyzer};
pub use usage::UsageSet;

/// Shared handle to a registered module
pub type ModuleRef = Rc<Module>;

/// Published-artifact coordinate (GAV)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactCoordinates {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
}

impl ArtifactCoordinates {
    pub fn new(group_id: &str, artifact_id: &str, version: Option<&str>) -> Self {
        Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            version: version.map(str::to_string),
        }
    }

    /// `groupId:artifactId`, the key published artifacts are deduplicated on
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl fmt::Display for ArtifactCoordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}:{}:{}", self.group_id, self.artifact_id, version),
            None => write!(f, "{}:{}", self.group_id, self.artifact_id),
        }
    }
}

/// A uniquely named unit of the dependency graph
#[derive(Debug)]
pub struct Module {
    name: String,
    kind: ModuleKind,
}

#[derive(Debug)]
pub enum ModuleKind {
    Platform,
    Library(LibraryModule),
    Root(DevModule),
    Dev(DevModule),
    Published(PublishedModule),
    Imported(ImportedModule),
}

impl ModuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            ModuleKind::Platform => "platform",
            ModuleKind::Library(_) => "library",
            ModuleKind::Root(_) => "root",
            ModuleKind::Dev(_) => "dev",
            ModuleKind::Published(_) => "published",
            ModuleKind::Imported(_) => "imported",
        }
    }
}

/// Third-party library referenced by coordinate
#[derive(Debug, Clone)]
pub struct LibraryModule {
    pub coordinates: ArtifactCoordinates,
    pub exported_packages: Vec<String>,
}

/// Local editable module
#[derive(Debug)]
pub struct DevModule {
    home: RefCell<PathBuf>,
    parent: RefCell<Option<String>>,
    descriptor: RefCell<Rc<ModuleDescriptor>>,
}

impl DevModule {
    pub fn home(&self) -> PathBuf {
        self.home.borrow().clone()
    }

    pub fn parent(&self) -> Option<String> {
        self.parent.borrow().clone()
    }

    /// Move the module after a rename of itself or of an ancestor
    pub(crate) fn relocate(&self, home: PathBuf, parent: Option<String>) {
        *self.home.borrow_mut() = home;
        if parent.is_some() {
            *self.parent.borrow_mut() = parent;
        }
    }

    pub fn descriptor(&self) -> Rc<ModuleDescriptor> {
        Rc::clone(&self.descriptor.borrow())
    }

    pub(crate) fn replace_descriptor(&self, descriptor: ModuleDescriptor) {
        *self.descriptor.borrow_mut() = Rc::new(descriptor);
    }
}

/// Module resolved from a binary repository
#[derive(Debug)]
pub struct PublishedModule {
    pub coordinates: ArtifactCoordinates,
    pub descriptor_path: PathBuf,
    descriptor: Rc<ModuleDescriptor>,
}

/// Module reconstructed from another descriptor's export snapshot
#[derive(Debug)]
pub struct ImportedModule {
    /// Module whose descriptor embedded the snapshot
    pub owner: String,
    descriptor: Rc<ModuleDescriptor>,
}

impl Module {
    pub(crate) fn platform(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::Platform,
        }
    }

    pub(crate) fn library(name: &str, coordinates: ArtifactCoordinates, exported: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::Library(LibraryModule {
                coordinates,
                exported_packages: exported,
            }),
        }
    }

    /// Root module when `parent` is `None`, dev module otherwise
    pub(crate) fn local(
        name: &str,
        home: PathBuf,
        parent: Option<String>,
        descriptor: ModuleDescriptor,
    ) -> Self {
        let is_root = parent.is_none();
        let dev = DevModule {
            home: RefCell::new(home),
            parent: RefCell::new(parent),
            descriptor: RefCell::new(Rc::new(descriptor)),
        };
        Self {
            name: name.to_string(),
            kind: if is_root {
                ModuleKind::Root(dev)
            } else {
                ModuleKind::Dev(dev)
            },
        }
    }

    pub(crate) fn published(
        name: &str,
        coordinates: ArtifactCoordinates,
        descriptor_path: PathBuf,
        descriptor: ModuleDescriptor,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::Published(PublishedModule {
                coordinates,
                descriptor_path,
                descriptor: Rc::new(descriptor),
            }),
        }
    }

    pub(crate) fn imported(name: &str, owner: &str, descriptor: ModuleDescriptor) -> Self {
        Self {
            name: name.to_string(),
            kind: ModuleKind::Imported(ImportedModule {
                owner: owner.to_string(),
                descriptor: Rc::new(descriptor),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ModuleKind {
        &self.kind
    }

    pub fn is_platform(&self) -> bool {
        matches!(self.kind, ModuleKind::Platform)
    }

    pub fn is_library(&self) -> bool {
        matches!(self.kind, ModuleKind::Library(_))
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ModuleKind::Root(_))
    }

    /// Root, dev, published or imported
    pub fn is_project(&self) -> bool {
        self.descriptor().is_some()
    }

    /// Root or dev: part of the local editable tree
    pub fn is_local(&self) -> bool {
        self.dev().is_some()
    }

    pub fn dev(&self) -> Option<&DevModule> {
        match &self.kind {
            ModuleKind::Root(dev) | ModuleKind::Dev(dev) => Some(dev),
            _ => None,
        }
    }

    pub fn descriptor(&self) -> Option<Rc<ModuleDescriptor>> {
        match &self.kind {
            ModuleKind::Root(dev) | ModuleKind::Dev(dev) => Some(dev.descriptor()),
            ModuleKind::Published(published) => Some(Rc::clone(&published.descriptor)),
            ModuleKind::Imported(imported) => Some(Rc::clone(&imported.descriptor)),
            ModuleKind::Platform | ModuleKind::Library(_) => None,
        }
    }

    pub fn parent_name(&self) -> Option<String> {
        self.dev().and_then(DevModule::parent)
    }

    pub fn home(&self) -> Option<PathBuf> {
        self.dev().map(DevModule::home)
    }

    pub fn children(&self) -> Vec<String> {
        self.dev()
            .map(|dev| dev.descriptor().modules.clone())
            .unwrap_or_default()
    }

    pub fn target(&self) -> Target {
        match self.descriptor() {
            Some(descriptor) => descriptor.target_for(&self.name),
            None => Target::from_module_name(&self.name),
        }
    }

    pub fn is_executable(&self) -> bool {
        self.descriptor().is_some_and(|d| d.executable)
    }

    /// Application entry point whose target supports `tag`
    pub fn is_executable_for(&self, tag: TargetTag) -> bool {
        self.is_executable() && self.target().is_compatible_with(&Target::single(tag))
    }

    pub fn is_interface(&self) -> bool {
        self.descriptor().is_some_and(|d| d.interface)
    }

    pub fn is_aggregate(&self) -> bool {
        self.descriptor().is_some_and(|d| d.aggregate)
    }

    pub fn implements(&self, interface: &str) -> bool {
        self.descriptor()
            .is_some_and(|d| d.implements.iter().any(|i| i == interface))
    }

    pub fn declared_artifact_id(&self) -> Option<String> {
        match &self.kind {
            ModuleKind::Library(library) => Some(library.coordinates.artifact_id.clone()),
            ModuleKind::Published(published) => Some(published.coordinates.artifact_id.clone()),
            _ => self.descriptor().and_then(|d| d.artifact_id.clone()),
        }
    }

    pub fn exported_packages(&self) -> Vec<String> {
        match &self.kind {
            ModuleKind::Library(library) => library.exported_packages.clone(),
            _ => self
                .descriptor()
                .map(|d| d.exported_packages.clone())
                .unwrap_or_default(),
        }
    }

    pub fn used_services(&self) -> Vec<String> {
        self.descriptor()
            .map(|d| d.uses_services.clone())
            .unwrap_or_default()
    }

    pub fn auto_inject_conditions(&self) -> Vec<AutoInjectCondition> {
        self.descriptor()
            .map(|d| d.auto_inject.clone())
            .unwrap_or_default()
    }

    /// Declared service providers as (interface, implementations)
    ///
    /// Fails when a `[[provides]]` entry lacks its interface.
    pub fn provided_services(&self) -> Result<Vec<(String, Vec<String>)>, ResolveError> {
        let Some(descriptor) = self.descriptor() else {
            return Ok(Vec::new());
        };
        descriptor
            .provides
            .iter()
            .map(|provider| match &provider.interface {
                Some(interface) if !interface.is_empty() => {
                    Ok((interface.clone(), provider.implementations.clone()))
                }
                _ => Err(ResolveError::malformed(
                    &self.name,
                    format!(
                        "service provider {:?} declared without its interface",
                        provider.implementations
                    ),
                )),
            })
            .collect()
    }

    pub fn provides_service(&self, service: &str) -> Result<bool, ResolveError> {
        Ok(self
            .provided_services()?
            .iter()
            .any(|(interface, _)| interface == service))
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
