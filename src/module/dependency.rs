//! Dependency edges and build context

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::module::registry::manifest::DependencyDecl;
use crate::module::target::{Target, TargetTag};

/// Purpose of a dependency edge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    #[default]
    Source,
    /// Only materialized by executable builds
    Plugin,
    Resource,
    /// Injected by an auto-injection condition or a required service
    ImplicitProvider,
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyType::Source => "SOURCE",
            DependencyType::Plugin => "PLUGIN",
            DependencyType::Resource => "RESOURCE",
            DependencyType::ImplicitProvider => "IMPLICIT_PROVIDER",
        };
        f.write_str(name)
    }
}

/// Directed edge between two modules, by name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModuleDependency {
    pub source: String,
    pub destination: String,
    pub kind: DependencyType,
    pub optional: bool,
    /// Visibility propagates to consumers of `source`
    pub transitive: bool,
    pub scope: Option<String>,
    pub classifier: Option<String>,
    /// Edge only applies to executable builds for this platform
    pub executable_target: Option<TargetTag>,
}

impl ModuleDependency {
    pub fn new(source: &str, destination: &str, kind: DependencyType) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            kind,
            optional: false,
            transitive: false,
            scope: None,
            classifier: None,
            executable_target: None,
        }
    }

    pub fn from_decl(source: &str, decl: &DependencyDecl) -> Self {
        Self {
            source: source.to_string(),
            destination: decl.name.clone(),
            kind: decl.kind,
            optional: decl.optional,
            transitive: decl.transitive,
            scope: decl.scope.clone(),
            classifier: decl.classifier.clone(),
            executable_target: decl.executable_target,
        }
    }

    pub fn implicit(source: &str, destination: &str) -> Self {
        Self::new(source, destination, DependencyType::ImplicitProvider)
    }

    pub fn is_implicit(&self) -> bool {
        self.kind == DependencyType::ImplicitProvider
    }

    /// Key used when deduplicating edges: one edge per (destination, purpose)
    pub fn dedup_key(&self) -> (String, DependencyType) {
        (self.destination.clone(), self.kind)
    }

    /// Whether the edge takes part in a build described by `build`
    pub fn applies_to(&self, build: &BuildInfo) -> bool {
        if self.kind == DependencyType::Plugin && !build.executable {
            return false;
        }
        match self.executable_target {
            Some(tag) => build.executable && build.target.satisfies(tag),
            None => true,
        }
    }
}

impl fmt::Display for ModuleDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.source, self.kind, self.destination)
    }
}

/// How a module is being resolved right now
///
/// Passed explicitly to every resolution call; the same module resolves
/// differently depending on who asks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BuildInfo {
    pub executable: bool,
    pub web_transpiled: bool,
    pub catalog_view: bool,
    pub desktop_packaged: bool,
    pub target: Target,
}

impl BuildInfo {
    /// Plain library build: no platform, no executable
    pub fn library() -> Self {
        Self::default()
    }

    /// Executable build for `target`, deriving the platform flags from its tags
    pub fn executable(target: Target) -> Self {
        Self {
            executable: true,
            web_transpiled: target.is_web(),
            catalog_view: false,
            desktop_packaged: target.satisfies(TargetTag::Desktop),
            target,
        }
    }

    /// Registry/catalog listing
    pub fn catalog() -> Self {
        Self {
            catalog_view: true,
            ..Self::default()
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.web_transpiled = self.web_transpiled || target.is_web();
        self.target = target;
        self
    }

    pub fn is_web_executable(&self) -> bool {
        self.web_transpiled && self.executable
    }

    /// Neither web, desktop, executable nor catalog
    pub fn is_plain_library(&self) -> bool {
        !(self.web_transpiled || self.desktop_packaged || self.executable || self.catalog_view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_edges_need_executable() {
        let edge = ModuleDependency::new("a", "b", DependencyType::Plugin);
        assert!(!edge.applies_to(&BuildInfo::library()));
        assert!(edge.applies_to(&BuildInfo::executable(Target::single(TargetTag::Jre))));
    }

    #[test]
    fn test_executable_target_restriction() {
        let mut edge = ModuleDependency::new("a", "b", DependencyType::Source);
        edge.executable_target = Some(TargetTag::Web);
        assert!(!edge.applies_to(&BuildInfo::library()));
        assert!(edge.applies_to(&BuildInfo::executable(Target::single(TargetTag::Gwt))));
        assert!(!edge.applies_to(&BuildInfo::executable(Target::single(TargetTag::OpenJfx))));
    }

    #[test]
    fn test_executable_flags() {
        let build = BuildInfo::executable(Target::single(TargetTag::J2cl));
        assert!(build.is_web_executable());
        assert!(!build.desktop_packaged);
        assert!(BuildInfo::library().is_plain_library());
        assert!(!BuildInfo::catalog().is_plain_library());
    }
}
