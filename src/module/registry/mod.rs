//! Module registry and discovery
//!
//! The single directory of every module known to a run. A lookup goes
//! through four tiers in order: the registration cache, the built-in
//! catalog, the local project tree, and finally published resolution
//! (export snapshots, declared libraries, the binary repository). Modules
//! are created on first reference and live as long as the registry.

pub mod catalog;
pub mod discovery;
pub mod manifest;
pub mod repository;

pub use discovery::{DiscoveredModule, ModuleDiscovery};
pub use manifest::{ModuleDescriptor, TomlDescriptorStore, DESCRIPTOR_FILE};
pub use repository::LocalRepository;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info, warn};

use crate::module::traits::{DescriptorStore, RepositoryClient, ResolveError, Result};
use crate::module::{ArtifactCoordinates, Module, ModuleKind, ModuleRef};
use crate::seq::{GrowingSource, Seq};

/// Classifier of the descriptor artifact published next to each module
pub const DESCRIPTOR_CLASSIFIER: &str = "module";

/// Extension of the published descriptor artifact
pub const DESCRIPTOR_EXTENSION: &str = "toml";

/// Coordinates used when a module declares none along its parent chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub default_group_id: String,
    pub default_version: Option<String>,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_group_id: "dev.webfx".to_string(),
            default_version: None,
        }
    }
}

/// Name-keyed arena owning every module of a run
pub struct ModuleRegistry {
    modules: RefCell<HashMap<String, ModuleRef>>,
    /// Registration order; `None` marks a retired name
    order: RefCell<Vec<Option<String>>>,
    /// Local module directory -> module name
    homes: RefCell<HashMap<PathBuf, String>>,
    discovery: RefCell<ModuleDiscovery>,
    /// Next registration slot whose export snapshot is still unscanned
    snapshot_cursor: Cell<usize>,
    root: String,
    store: Rc<dyn DescriptorStore>,
    repository: Rc<dyn RepositoryClient>,
    settings: RegistrySettings,
}

impl ModuleRegistry {
    /// Open the registry on the project tree rooted at `root_dir`
    ///
    /// Only the root descriptor is read; the rest of the tree is walked on
    /// demand.
    pub fn open<P: AsRef<Path>>(
        root_dir: P,
        store: Rc<dyn DescriptorStore>,
        repository: Rc<dyn RepositoryClient>,
        settings: RegistrySettings,
    ) -> Result<Rc<Self>> {
        let root_dir = root_dir.as_ref();
        let mut registry = Self {
            modules: RefCell::new(HashMap::new()),
            order: RefCell::new(Vec::new()),
            homes: RefCell::new(HashMap::new()),
            discovery: RefCell::new(ModuleDiscovery::new(root_dir)),
            snapshot_cursor: Cell::new(0),
            root: String::new(),
            store,
            repository,
            settings,
        };

        let root = registry.walk_step()?.ok_or_else(|| {
            ResolveError::UnresolvedModule(format!("no root module in {:?}", root_dir))
        })?;
        registry.root = root.name().to_string();
        info!("Opened module registry at {:?} (root {})", root_dir, registry.root);
        Ok(Rc::new(registry))
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    pub fn store(&self) -> &dyn DescriptorStore {
        self.store.as_ref()
    }

    pub fn repository(&self) -> &dyn RepositoryClient {
        self.repository.as_ref()
    }

    pub fn root(&self) -> Result<ModuleRef> {
        self.lookup(&self.root)
            .ok_or_else(|| ResolveError::UnresolvedModule(self.root.clone()))
    }

    /// Registration cache only; never discovers
    pub fn lookup(&self, name: &str) -> Option<ModuleRef> {
        self.modules.borrow().get(name).cloned()
    }

    pub fn registered_count(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Every module registered so far, in registration order
    pub fn registered(&self) -> Vec<ModuleRef> {
        let order = self.order.borrow();
        let modules = self.modules.borrow();
        order
            .iter()
            .flatten()
            .filter_map(|name| modules.get(name).cloned())
            .collect()
    }

    /// Unique module for `name`, created on first reference
    pub fn get_or_create(&self, name: &str) -> Result<ModuleRef> {
        if let Some(module) = self.lookup(name) {
            return Ok(module);
        }
        if let Some(module) = self.from_catalog(name) {
            return Ok(module);
        }
        while let Some(module) = self.walk_step()? {
            if module.name() == name {
                return Ok(module);
            }
        }
        if let Some(module) = self.from_snapshots(name)? {
            return Ok(module);
        }
        if let Some(module) = self.from_repository(name)? {
            return Ok(module);
        }
        debug!("Module {} not found in any registry tier", name);
        Err(ResolveError::UnresolvedModule(name.to_string()))
    }

    /// Resumable registration stream
    ///
    /// Yields every registered module, then keeps the local walk going, then
    /// registers the export snapshots of known modules. Consumers each keep
    /// their own cursor over the shared registration order.
    pub fn stream(self: &Rc<Self>) -> Seq<Result<ModuleRef>> {
        Seq::resumable(Rc::clone(self))
    }

    /// Finish the local walk and return every local module
    pub fn local_modules(&self) -> Result<Vec<ModuleRef>> {
        self.complete_walk()?;
        Ok(self
            .registered()
            .into_iter()
            .filter(|m| m.is_local())
            .collect())
    }

    pub fn parent_of(&self, module: &Module) -> Result<Option<ModuleRef>> {
        match module.parent_name() {
            Some(parent) => self.get_or_create(&parent).map(Some),
            None => Ok(None),
        }
    }

    /// Declared children of a local module, in declaration order
    pub fn children_of(&self, module: &Module) -> Result<Vec<ModuleRef>> {
        let Some(home) = module.home() else {
            return Ok(Vec::new());
        };
        module
            .children()
            .iter()
            .map(|child| {
                self.module_at(&home.join(child))?.ok_or_else(|| {
                    ResolveError::malformed(
                        module.name(),
                        format!("child {} was not discovered", child),
                    )
                })
            })
            .collect()
    }

    /// Published coordinates, with group and version inherited along the
    /// parent (or snapshot owner) chain
    pub fn effective_coordinates(&self, module: &Module) -> Option<ArtifactCoordinates> {
        match module.kind() {
            ModuleKind::Platform => None,
            ModuleKind::Library(library) => Some(library.coordinates.clone()),
            ModuleKind::Published(published) => Some(published.coordinates.clone()),
            ModuleKind::Root(_) | ModuleKind::Dev(_) | ModuleKind::Imported(_) => {
                let artifact_id = module
                    .declared_artifact_id()
                    .unwrap_or_else(|| module.name().to_string());
                let (group_id, version) = self.inherited_group_version(module);
                Some(ArtifactCoordinates {
                    group_id,
                    artifact_id,
                    version,
                })
            }
        }
    }

    /// Create a new local module below `parent` and declare it as a child
    pub fn create_dev_module(&self, parent: &Module, name: &str) -> Result<ModuleRef> {
        let Some(parent_home) = parent.home() else {
            return Err(ResolveError::malformed(
                parent.name(),
                "only local modules can have child modules",
            ));
        };
        if self.get_or_create(name).is_ok() {
            return Err(ResolveError::malformed(
                parent.name(),
                format!("cannot create {}: a module with that name already exists", name),
            ));
        }

        let home = parent_home.join(name);
        let descriptor = ModuleDescriptor::default();
        self.store.write(&home, &descriptor)?;

        let mut parent_descriptor = descriptor_of(parent)?;
        parent_descriptor.modules.push(name.to_string());
        self.rewrite_descriptor(parent, parent_descriptor)?;

        self.homes
            .borrow_mut()
            .insert(home.clone(), name.to_string());
        let module = self.register(Module::local(
            name,
            home,
            Some(parent.name().to_string()),
            descriptor,
        ));
        info!("Created module {} under {}", name, parent.name());
        Ok(module)
    }

    /// Rename a non-root local module
    ///
    /// Updates the parent's children list and every local dependent's
    /// descriptor, moves the directory, then retires the old name. Nothing
    /// is committed to the registry until every write and the move have
    /// succeeded; on failure the descriptors already written are restored.
    /// The returned module replaces the old instance; descendants keep their
    /// identity.
    pub fn rename_module(&self, module: &Module, new_name: &str) -> Result<ModuleRef> {
        let ModuleKind::Dev(dev) = module.kind() else {
            return Err(ResolveError::malformed(
                module.name(),
                "only non-root local modules can be renamed",
            ));
        };
        if self.get_or_create(new_name).is_ok() {
            return Err(ResolveError::malformed(
                module.name(),
                format!("cannot rename to {}: a module with that name already exists", new_name),
            ));
        }
        self.complete_walk()?;

        let old_name = module.name().to_string();
        let old_home = dev.home();
        let parent_name = dev.parent();
        let dir_name = old_home
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ResolveError::malformed(&old_name, "module directory has no name"))?;
        let new_home = old_home
            .parent()
            .map(|p| p.join(new_name))
            .ok_or_else(|| ResolveError::malformed(&old_name, "module directory has no parent"))?;

        let mut descriptor = (*dev.descriptor()).clone();
        descriptor.name = None;

        // (module, updated descriptor) pairs to commit once the move succeeded
        let mut rewrites: Vec<(ModuleRef, ModuleDescriptor)> = Vec::new();
        if let Some(parent) = parent_name.as_deref().and_then(|p| self.lookup(p)) {
            let mut parent_descriptor = descriptor_of(&parent)?;
            for child in parent_descriptor.modules.iter_mut() {
                if *child == dir_name {
                    *child = new_name.to_string();
                }
            }
            rewrites.push((parent, parent_descriptor));
        }
        for dependent in self.registered() {
            if dependent.name() == old_name || !dependent.is_local() {
                continue;
            }
            let pending = rewrites
                .iter()
                .position(|(target, _)| target.name() == dependent.name());
            let current = match pending {
                Some(index) => rewrites[index].1.clone(),
                None => descriptor_of(&dependent)?,
            };
            let references = current.dependencies.iter().any(|d| d.name == old_name)
                || current.implements.iter().any(|i| *i == old_name);
            if !references {
                continue;
            }
            let mut updated = current;
            for dependency in updated.dependencies.iter_mut() {
                if dependency.name == old_name {
                    dependency.name = new_name.to_string();
                }
            }
            for interface in updated.implements.iter_mut() {
                if *interface == old_name {
                    *interface = new_name.to_string();
                }
            }
            debug!("Updating references to {} in {}", old_name, dependent.name());
            match pending {
                Some(index) => rewrites[index].1 = updated,
                None => rewrites.push((dependent, updated)),
            }
        }

        // Written in place; descendants move along with the directory
        let mut written: Vec<(PathBuf, Rc<ModuleDescriptor>)> = Vec::new();
        let outcome = self
            .store
            .write(&old_home, &descriptor)
            .and_then(|()| {
                written.push((old_home.clone(), dev.descriptor()));
                for (target, updated) in &rewrites {
                    let (Some(home), Some(original)) = (target.home(), target.descriptor()) else {
                        continue;
                    };
                    self.store.write(&home, updated)?;
                    written.push((home, original));
                }
                Ok(())
            })
            .and_then(|()| std::fs::rename(&old_home, &new_home).map_err(ResolveError::from));
        if let Err(e) = outcome {
            warn!("Renaming {} to {} failed, restoring descriptors: {}", old_name, new_name, e);
            for (home, original) in written.iter().rev() {
                if let Err(restore) = self.store.write(home, original) {
                    warn!("Could not restore descriptor in {:?}: {}", home, restore);
                }
            }
            return Err(e);
        }

        for (target, updated) in rewrites {
            if let Some(target_dev) = target.dev() {
                target_dev.replace_descriptor(updated);
            }
        }

        // Descendants live below the moved directory
        for other in self.registered() {
            if other.name() == old_name {
                continue;
            }
            let (Some(other_dev), Some(home)) = (other.dev(), other.home()) else {
                continue;
            };
            if let Ok(rest) = home.strip_prefix(&old_home) {
                let parent = (other.parent_name().as_deref() == Some(old_name.as_str()))
                    .then(|| new_name.to_string());
                other_dev.relocate(new_home.join(rest), parent);
            }
        }
        {
            let mut homes = self.homes.borrow_mut();
            let moved: Vec<(PathBuf, String)> = homes
                .iter()
                .filter_map(|(home, name)| {
                    home.strip_prefix(&old_home)
                        .ok()
                        .map(|rest| (new_home.join(rest), name.clone()))
                })
                .collect();
            homes.retain(|home, _| !home.starts_with(&old_home));
            homes.extend(moved);
            homes.insert(new_home.clone(), new_name.to_string());
        }

        self.retire(&old_name);
        let renamed = self.register(Module::local(new_name, new_home, parent_name, descriptor));
        info!("Renamed module {} to {}", old_name, new_name);
        Ok(renamed)
    }

    /// Persist a new descriptor for a local module
    pub fn rewrite_descriptor(&self, module: &Module, descriptor: ModuleDescriptor) -> Result<()> {
        let dev = module.dev().ok_or_else(|| {
            ResolveError::malformed(module.name(), "only local modules have an editable descriptor")
        })?;
        self.store.write(&dev.home(), &descriptor)?;
        dev.replace_descriptor(descriptor);
        debug!("Rewrote descriptor of {}", module.name());
        Ok(())
    }

    fn register(&self, module: Module) -> ModuleRef {
        let name = module.name().to_string();
        let module = Rc::new(module);
        debug!("Registered {} module {}", module.kind().label(), name);
        self.order.borrow_mut().push(Some(name.clone()));
        self.modules.borrow_mut().insert(name, Rc::clone(&module));
        module
    }

    fn retire(&self, name: &str) {
        for slot in self.order.borrow_mut().iter_mut() {
            if slot.as_deref() == Some(name) {
                *slot = None;
            }
        }
        self.modules.borrow_mut().remove(name);
        debug!("Retired module name {}", name);
    }

    fn from_catalog(&self, name: &str) -> Option<ModuleRef> {
        if catalog::is_platform_module(name) {
            return Some(self.register(Module::platform(name)));
        }
        catalog::builtin_library(name).map(|library| {
            let coordinates = ArtifactCoordinates::new(
                &library.group_id,
                library.artifact_id(),
                library.version.as_deref(),
            );
            self.register(Module::library(name, coordinates, library.exported_packages))
        })
    }

    /// One step of the shared local walk
    fn walk_step(&self) -> Result<Option<ModuleRef>> {
        let discovered = self
            .discovery
            .borrow_mut()
            .discover_next(self.store.as_ref())?;
        let Some(discovered) = discovered else {
            return Ok(None);
        };

        if let Some(existing) = self.lookup(&discovered.name) {
            warn!(
                "Module {} in {:?} is already registered as a {} module, keeping the first instance",
                discovered.name,
                discovered.directory,
                existing.kind().label()
            );
            return Ok(Some(existing));
        }

        self.homes
            .borrow_mut()
            .insert(discovered.directory.clone(), discovered.name.clone());
        Ok(Some(self.register(Module::local(
            &discovered.name,
            discovered.directory,
            discovered.parent,
            discovered.descriptor,
        ))))
    }

    fn complete_walk(&self) -> Result<()> {
        while self.walk_step()?.is_some() {}
        Ok(())
    }

    fn module_at(&self, directory: &Path) -> Result<Option<ModuleRef>> {
        loop {
            let known = self.homes.borrow().get(directory).cloned();
            if let Some(name) = known {
                return Ok(self.lookup(&name));
            }
            if self.walk_step()?.is_none() {
                return Ok(None);
            }
        }
    }

    fn from_snapshots(&self, name: &str) -> Result<Option<ModuleRef>> {
        for owner in self.registered() {
            let Some(descriptor) = owner.descriptor() else {
                continue;
            };
            if descriptor.export_snapshot.is_none() {
                continue;
            }
            for (entry_name, entry) in descriptor.snapshot_entries(owner.name())? {
                if entry_name == name {
                    debug!("Module {} found in export snapshot of {}", name, owner.name());
                    return Ok(Some(self.register(Module::imported(name, owner.name(), entry))));
                }
            }
        }
        Ok(None)
    }

    /// Probe the binary repository for a published descriptor
    fn from_repository(&self, name: &str) -> Result<Option<ModuleRef>> {
        let mut candidates = Vec::new();
        for owner in self.registered() {
            let Some(descriptor) = owner.descriptor() else {
                continue;
            };
            for library in descriptor.libraries.iter().filter(|l| l.provides_module(name)) {
                let artifact_id = if library.name == name {
                    library.artifact_id()
                } else {
                    name
                };
                let coordinates = ArtifactCoordinates::new(
                    &library.group_id,
                    artifact_id,
                    library.version.as_deref(),
                );
                candidates.push((coordinates, Some(library.clone())));
            }
        }
        let root = self.root()?;
        let (group_id, version) = self.inherited_group_version(&root);
        candidates.push((
            ArtifactCoordinates {
                group_id,
                artifact_id: name.to_string(),
                version,
            },
            None,
        ));

        for (coordinates, library) in candidates {
            let fetched = self.repository.fetch(
                &coordinates,
                Some(DESCRIPTOR_CLASSIFIER),
                DESCRIPTOR_EXTENSION,
            )?;
            if let Some(path) = fetched {
                let descriptor = self.store.read_file(&path)?;
                info!("Resolved published module {} as {}", name, coordinates);
                return Ok(Some(self.register(Module::published(
                    name,
                    coordinates,
                    path,
                    descriptor,
                ))));
            }
            if let Some(library) = library {
                debug!("Module {} resolved as library {}", name, coordinates);
                return Ok(Some(self.register(Module::library(
                    name,
                    coordinates,
                    library.exported_packages,
                ))));
            }
        }
        Ok(None)
    }

    /// One step of the catalog phase: register a known module's snapshot
    fn snapshot_step(&self) -> Result<bool> {
        let cursor = self.snapshot_cursor.get();
        if cursor >= self.available() {
            return Ok(false);
        }
        self.snapshot_cursor.set(cursor + 1);

        let Some(owner) = self.item_at(cursor) else {
            return Ok(true);
        };
        let Some(descriptor) = owner.descriptor() else {
            return Ok(true);
        };
        for (name, entry) in descriptor.snapshot_entries(owner.name())? {
            if self.lookup(&name).is_none() {
                self.register(Module::imported(&name, owner.name(), entry));
            }
        }
        Ok(true)
    }

    fn inherited_group_version(&self, module: &Module) -> (String, Option<String>) {
        let mut group_id = None;
        let mut version = None;
        let mut current = Some(own_group_version(module));
        let mut upstream = upstream_name(module);

        while let Some((group, ver)) = current.take() {
            group_id = group_id.or(group);
            version = version.or(ver);
            if group_id.is_some() && version.is_some() {
                break;
            }
            if let Some(next) = upstream.take().and_then(|name| self.lookup(&name)) {
                current = Some(own_group_version(&next));
                upstream = upstream_name(&next);
            }
        }

        (
            group_id.unwrap_or_else(|| self.settings.default_group_id.clone()),
            version.or_else(|| self.settings.default_version.clone()),
        )
    }
}

impl GrowingSource for ModuleRegistry {
    type Item = ModuleRef;
    type Error = ResolveError;

    fn available(&self) -> usize {
        self.order.borrow().len()
    }

    fn item_at(&self, index: usize) -> Option<ModuleRef> {
        let order = self.order.borrow();
        let name = order.get(index)?.as_ref()?;
        self.modules.borrow().get(name).cloned()
    }

    fn grow(&self) -> Result<bool> {
        if self.walk_step()?.is_some() {
            return Ok(true);
        }
        self.snapshot_step()
    }
}

fn descriptor_of(module: &Module) -> Result<ModuleDescriptor> {
    module
        .descriptor()
        .map(|d| (*d).clone())
        .ok_or_else(|| ResolveError::malformed(module.name(), "module has no descriptor"))
}

fn own_group_version(module: &Module) -> (Option<String>, Option<String>) {
    match module.kind() {
        ModuleKind::Library(library) => (
            Some(library.coordinates.group_id.clone()),
            library.coordinates.version.clone(),
        ),
        ModuleKind::Published(published) => (
            Some(published.coordinates.group_id.clone()),
            published.coordinates.version.clone(),
        ),
        _ => match module.descriptor() {
            Some(descriptor) => (descriptor.group_id.clone(), descriptor.version.clone()),
            None => (None, None),
        },
    }
}

fn upstream_name(module: &Module) -> Option<String> {
    match module.kind() {
        ModuleKind::Dev(dev) => dev.parent(),
        ModuleKind::Imported(imported) => Some(imported.owner.clone()),
        _ => None,
    }
}
