//! Resolution workspace
//!
//! A [`Workspace`] ties one registry to its dependency resolver, artifact
//! resolver and cycle cache. It is the value threaded through a run: open it
//! once from a [`ResolverConfig`], then query it.

pub mod artifact;
pub mod cycles;
pub mod dependencies;

pub use artifact::{ArtifactPolicy, ArtifactResolver, ResolvedArtifact};
pub use cycles::{CycleAnalyzer, CycleReport, DependencyLoop};
pub use dependencies::{DependencyResolver, DependencySeq};

use std::cell::RefCell;
use std::rc::Rc;
use tracing::info;

use crate::config::ResolverConfig;
use crate::module::registry::{
    LocalRepository, ModuleDescriptor, ModuleRegistry, RegistrySettings, TomlDescriptorStore,
};
use crate::module::target::TargetTag;
use crate::module::traits::{DescriptorStore, RepositoryClient, ResolveError, Result, UsageAnalyzer};
use crate::module::usage::DescriptorUsage;
use crate::module::ModuleRef;

pub struct Workspace {
    registry: Rc<ModuleRegistry>,
    resolver: DependencyResolver,
    artifacts: ArtifactResolver,
    cycles: RefCell<Option<Rc<CycleReport>>>,
}

impl Workspace {
    /// Open the workspace described by `config` with the default collaborators
    pub fn open(config: &ResolverConfig) -> Result<Self> {
        let repository = &config.repository;
        let local = LocalRepository::new(&repository.local_dir).offline(repository.offline);
        let local = match &repository.mirror_dir {
            Some(mirror) => local.with_mirror(mirror),
            None => local,
        };
        let client: Rc<dyn RepositoryClient> = match &repository.remote_url {
            #[cfg(feature = "remote")]
            Some(url) => Rc::new(crate::module::registry::repository::HttpRepository::new(local, url)),
            #[cfg(not(feature = "remote"))]
            Some(url) => {
                tracing::warn!("Remote repository {} ignored: built without the remote feature", url);
                Rc::new(local)
            }
            None => Rc::new(local),
        };

        Self::with_collaborators(
            config,
            Rc::new(TomlDescriptorStore::new()),
            client,
            Rc::new(DescriptorUsage),
        )
    }

    /// Open with explicit collaborators, e.g. an external usage analyzer
    pub fn with_collaborators(
        config: &ResolverConfig,
        store: Rc<dyn DescriptorStore>,
        repository: Rc<dyn RepositoryClient>,
        analyzer: Rc<dyn UsageAnalyzer>,
    ) -> Result<Self> {
        let settings = RegistrySettings {
            default_group_id: config.repository.default_group_id.clone(),
            default_version: config.repository.default_version.clone(),
        };
        let registry = ModuleRegistry::open(&config.workspace.root, store, repository, settings)?;
        let resolver = DependencyResolver::new(Rc::clone(&registry), analyzer);
        let artifacts = ArtifactResolver::new(resolver.clone(), config.artifacts.clone());
        Ok(Self {
            registry,
            resolver,
            artifacts,
            cycles: RefCell::new(None),
        })
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    pub fn artifacts(&self) -> &ArtifactResolver {
        &self.artifacts
    }

    pub fn root(&self) -> Result<ModuleRef> {
        self.registry.root()
    }

    pub fn module(&self, name: &str) -> Result<ModuleRef> {
        self.registry.get_or_create(name)
    }

    /// The single executable module for `tag`
    pub fn find_executable(&self, tag: TargetTag) -> Result<ModuleRef> {
        let mut candidates = self
            .registry
            .stream()
            .filter_ok(move |m| m.is_executable_for(tag))
            .try_collect()?;
        match candidates.len() {
            0 => Err(ResolveError::UnresolvedModule(format!("executable module for {}", tag))),
            1 => Ok(candidates.remove(0)),
            _ => Err(ResolveError::AmbiguousResolution {
                query: format!("executable module for {}", tag),
                candidates: candidates.iter().map(|m| m.name().to_string()).collect(),
            }),
        }
    }

    /// Loops of the whole local tree, computed once
    pub fn cycle_report(&self) -> Result<Rc<CycleReport>> {
        let cached = self.cycles.borrow().clone();
        if let Some(report) = cached {
            return Ok(report);
        }
        let report = Rc::new(CycleAnalyzer::new(self.resolver.clone()).analyze()?);
        *self.cycles.borrow_mut() = Some(Rc::clone(&report));
        Ok(report)
    }

    pub fn loops_containing(&self, a: &str, b: &str) -> Result<Vec<DependencyLoop>> {
        Ok(self
            .cycle_report()?
            .loops_containing(a, b)
            .into_iter()
            .cloned()
            .collect())
    }

    pub fn ensure_acyclic(&self) -> Result<()> {
        self.cycle_report()?.ensure_acyclic()
    }

    pub fn create_module(&self, parent: &str, name: &str) -> Result<ModuleRef> {
        let parent = self.registry.get_or_create(parent)?;
        let module = self.registry.create_dev_module(&parent, name)?;
        self.invalidate();
        Ok(module)
    }

    pub fn rename_module(&self, name: &str, new_name: &str) -> Result<ModuleRef> {
        let module = self.registry.get_or_create(name)?;
        let renamed = self.registry.rename_module(&module, new_name)?;
        self.invalidate();
        Ok(renamed)
    }

    pub fn rewrite_descriptor(&self, name: &str, descriptor: ModuleDescriptor) -> Result<()> {
        let module = self.registry.get_or_create(name)?;
        self.registry.rewrite_descriptor(&module, descriptor)?;
        self.invalidate();
        Ok(())
    }

    fn invalidate(&self) {
        self.resolver.invalidate();
        self.cycles.borrow_mut().take();
        info!("Workspace caches reset after a descriptor change");
    }
}
