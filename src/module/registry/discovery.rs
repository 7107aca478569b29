//! Local module discovery
//!
//! Walks the local project tree breadth-first from the root directory,
//! guided by each descriptor's declared children. The walk is resumable: the
//! registry pulls one module at a time and later lookups continue from the
//! same frontier instead of re-walking the tree.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::module::registry::manifest::{ModuleDescriptor, DESCRIPTOR_FILE};
use crate::module::traits::{DescriptorStore, ResolveError, Result};
use crate::module::validation::{DescriptorValidator, ValidationResult};

/// Discovered module information
#[derive(Debug, Clone)]
pub struct DiscoveredModule {
    /// Module directory path
    pub directory: PathBuf,
    /// Module name (descriptor name, else directory name)
    pub name: String,
    /// Parent module name; `None` for the root
    pub parent: Option<String>,
    /// Module descriptor
    pub descriptor: ModuleDescriptor,
    /// Outcome of descriptor validation; problems are logged, not fatal
    pub validation: ValidationResult,
}

#[derive(Debug, Clone)]
struct PendingModule {
    directory: PathBuf,
    parent: Option<String>,
}

/// Resumable local tree walk
pub struct ModuleDiscovery {
    frontier: VecDeque<PendingModule>,
    validator: DescriptorValidator,
    discovered: usize,
}

impl ModuleDiscovery {
    /// Create a walk rooted at `root_dir`
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back(PendingModule {
            directory: root_dir.as_ref().to_path_buf(),
            parent: None,
        });
        Self {
            frontier,
            validator: DescriptorValidator::new(),
            discovered: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Number of modules discovered so far
    pub fn discovered(&self) -> usize {
        self.discovered
    }

    /// Discover the next module of the walk
    pub fn discover_next(&mut self, store: &dyn DescriptorStore) -> Result<Option<DiscoveredModule>> {
        let Some(pending) = self.frontier.pop_front() else {
            return Ok(None);
        };

        let descriptor = store.read(&pending.directory)?.ok_or_else(|| match &pending.parent {
            Some(parent) => ResolveError::malformed(
                parent,
                format!(
                    "declares child {:?} but no {} was found there",
                    pending.directory, DESCRIPTOR_FILE
                ),
            ),
            None => ResolveError::UnresolvedModule(format!(
                "no root {} in {:?}",
                DESCRIPTOR_FILE, pending.directory
            )),
        })?;

        let name = match &descriptor.name {
            Some(name) => name.clone(),
            None => directory_name(&pending.directory)?,
        };

        // Warn and continue; broken fields fail when they are needed
        let validation = self.validator.validate(&name, &descriptor);

        for child in &descriptor.modules {
            self.frontier.push_back(PendingModule {
                directory: pending.directory.join(child),
                parent: Some(name.clone()),
            });
        }

        self.discovered += 1;
        debug!("Discovered module {} in {:?}", name, pending.directory);
        if self.frontier.is_empty() {
            info!("Local tree walk complete: {} modules", self.discovered);
        }

        Ok(Some(DiscoveredModule {
            directory: pending.directory,
            name,
            parent: pending.parent,
            descriptor,
            validation,
        }))
    }

    /// Discover every remaining module
    pub fn discover_all(&mut self, store: &dyn DescriptorStore) -> Result<Vec<DiscoveredModule>> {
        let mut modules = Vec::new();
        while let Some(module) = self.discover_next(store)? {
            modules.push(module);
        }
        Ok(modules)
    }
}

fn directory_name(directory: &Path) -> Result<String> {
    directory
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            ResolveError::malformed(
                &directory.display().to_string(),
                "module directory has no name",
            )
        })
}
