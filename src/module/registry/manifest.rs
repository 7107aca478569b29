//! Module descriptor parsing
//!
//! Handles parsing `module.toml` descriptors, the export snapshots embedded
//! in them, and the TOML-backed [`DescriptorStore`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::module::dependency::DependencyType;
use crate::module::target::{Target, TargetTag};
use crate::module::traits::{DescriptorStore, ResolveError, Result};
use crate::module::usage::UsageSet;

/// File name of a module descriptor inside its directory
pub const DESCRIPTOR_FILE: &str = "module.toml";

/// Module descriptor (`module.toml` structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// Module name; defaults to the directory name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packaging: Option<String>,
    /// Children, as sub-directory names
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub interface: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub aggregate: bool,
    /// Interface modules this module implements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<String>,
    /// Explicit platform tags; inferred from the name when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<TargetTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_inject: Vec<AutoInjectCondition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uses_services: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provides: Vec<ServiceProviderDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exported_packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_packages: Vec<String>,
    /// Third-party and published libraries visible to this subtree
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<LibraryDecl>,
    /// Pre-recorded usage, typically carried by snapshot entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_snapshot: Option<ExportSnapshot>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A declared dependency edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDecl {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: DependencyType,
    #[serde(default, skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub transitive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable_target: Option<TargetTag>,
}

impl DependencyDecl {
    pub fn source(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: DependencyType::Source,
            optional: false,
            transitive: false,
            scope: None,
            classifier: None,
            executable_target: None,
        }
    }
}

/// "Include me in any module that statically uses ..."
///
/// Every listed item must be used for the condition to hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoInjectCondition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub if_uses_java_packages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub if_uses_java_classes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub if_uses_services: Vec<String>,
}

impl AutoInjectCondition {
    pub fn is_empty(&self) -> bool {
        self.if_uses_java_packages.is_empty()
            && self.if_uses_java_classes.is_empty()
            && self.if_uses_services.is_empty()
    }

    pub fn is_satisfied_by(&self, usage: &UsageSet) -> bool {
        !self.is_empty()
            && self
                .if_uses_java_packages
                .iter()
                .all(|p| usage.uses_package(p))
            && self.if_uses_java_classes.iter().all(|c| usage.uses_class(c))
            && self.if_uses_services.iter().all(|s| usage.uses_service(s))
    }
}

/// `[[provides]]` entry; the interface is checked when providers are queried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderDecl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default)]
    pub implementations: Vec<String>,
}

/// `[[libraries]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryDecl {
    pub name: String,
    pub group_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Project modules published by this library
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exported_packages: Vec<String>,
}

impl LibraryDecl {
    pub fn artifact_id(&self) -> &str {
        self.artifact_id.as_deref().unwrap_or(&self.name)
    }

    pub fn provides_module(&self, name: &str) -> bool {
        self.name == name || self.modules.iter().any(|m| m == name)
    }
}

/// Serialized copies of resolved module descriptors
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportSnapshot {
    #[serde(default)]
    pub modules: Vec<ModuleDescriptor>,
}

impl ModuleDescriptor {
    /// Parse a descriptor from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let descriptor: ModuleDescriptor = toml::from_str(text)?;
        Ok(descriptor)
    }

    /// Load descriptor from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ResolveError::Io(format!("Failed to read descriptor {}: {}", path.display(), e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            ResolveError::malformed(
                &path.display().to_string(),
                format!("Failed to parse descriptor TOML: {}", e),
            )
        })
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Named descriptor for the given fallback name
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            ..Self::default()
        }
    }

    /// Declared target, or the one inferred from `name`
    pub fn target_for(&self, name: &str) -> Target {
        if self.target.is_empty() {
            Target::from_module_name(name)
        } else {
            self.target.iter().copied().collect()
        }
    }

    /// Snapshot entries, each guaranteed to carry a name
    pub fn snapshot_entries(&self, owner: &str) -> Result<Vec<(String, ModuleDescriptor)>> {
        let Some(snapshot) = &self.export_snapshot else {
            return Ok(Vec::new());
        };
        snapshot
            .modules
            .iter()
            .map(|entry| match &entry.name {
                Some(name) if !name.is_empty() => Ok((name.clone(), entry.clone())),
                _ => Err(ResolveError::malformed(
                    owner,
                    "export snapshot entry without a name",
                )),
            })
            .collect()
    }
}

/// [`DescriptorStore`] backed by `module.toml` files
#[derive(Debug, Clone, Default)]
pub struct TomlDescriptorStore;

impl TomlDescriptorStore {
    pub fn new() -> Self {
        Self
    }
}

impl DescriptorStore for TomlDescriptorStore {
    fn read(&self, module_dir: &Path) -> Result<Option<ModuleDescriptor>> {
        let path = module_dir.join(DESCRIPTOR_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        ModuleDescriptor::from_file(&path).map(Some)
    }

    fn write(&self, module_dir: &Path, descriptor: &ModuleDescriptor) -> Result<()> {
        std::fs::create_dir_all(module_dir)?;
        let text = descriptor.to_toml_string()?;
        std::fs::write(module_dir.join(DESCRIPTOR_FILE), text)?;
        Ok(())
    }

    fn read_file(&self, path: &Path) -> Result<ModuleDescriptor> {
        ModuleDescriptor::from_file(path)
    }
}
