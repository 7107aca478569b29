//! Artifact coordinate resolution
//!
//! Maps a module and a build context to the published coordinates a build
//! descriptor must reference. The emulation, redirect and drop tables live
//! in [`ArtifactPolicy`] so a configuration file can extend them.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::module::dependency::{BuildInfo, ModuleDependency};
use crate::module::registry::catalog::{OPENJFX_GROUP_ID, OPENJFX_VERSION};
use crate::module::traits::Result;
use crate::module::{ArtifactCoordinates, Module, ModuleRef};
use crate::resolve::dependencies::DependencyResolver;

pub const PROVIDED_SCOPE: &str = "provided";
pub const SOURCES_CLASSIFIER: &str = "sources";
pub const SHADED_SOURCES_CLASSIFIER: &str = "shaded-sources";

/// Fixed artifact-mapping tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactPolicy {
    /// Emulation module -> the platform artifact it emulates
    pub emulations: BTreeMap<String, String>,
    /// Group and version of the emulated platform artifacts
    pub emulated_group_id: String,
    pub emulated_version: Option<String>,
    /// Platform emulation modules start with this prefix...
    pub platform_emulation_prefix: String,
    /// ...and contain this marker
    pub platform_emulation_marker: String,
    /// Catalog view: platform artifact -> emulation module of record
    pub catalog_redirects: BTreeMap<String, String>,
    /// Artifacts dropped from web-transpiled executables
    pub web_dropped: BTreeSet<String>,
    /// Runtime artifact -> development-tool artifact, web-transpiled executables
    pub web_substitutions: BTreeMap<String, String>,
    /// UI toolkit artifacts a plain library build gets as `provided`
    pub provided_toolkit: BTreeSet<String>,
    /// Compiler and runtime libraries that never take a sources classifier
    pub compiler_libraries: BTreeSet<String>,
}

fn names(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for ArtifactPolicy {
    fn default() -> Self {
        let emulations = ["base", "graphics", "controls", "media"]
            .iter()
            .map(|layer| {
                (
                    format!("webfx-kit-javafx{}-emul", layer),
                    format!("javafx-{}", layer),
                )
            })
            .collect();
        Self {
            emulations,
            emulated_group_id: OPENJFX_GROUP_ID.to_string(),
            emulated_version: Some(OPENJFX_VERSION.to_string()),
            platform_emulation_prefix: "webfx-platform-java".to_string(),
            platform_emulation_marker: "-emul".to_string(),
            catalog_redirects: [(
                "javafx-graphics".to_string(),
                "webfx-kit-javafxgraphics-emul".to_string(),
            )]
            .into_iter()
            .collect(),
            web_dropped: names(&[
                "jsinterop-annotations",
                "jsinterop-base",
                "javafx-base",
                "javafx-graphics",
                "javafx-controls",
                "javafx-media",
            ]),
            web_substitutions: [("gwt-user".to_string(), "gwt-dev".to_string())]
                .into_iter()
                .collect(),
            provided_toolkit: names(&[
                "javafx-base",
                "javafx-graphics",
                "javafx-controls",
                "javafx-media",
                "javafx-web",
                "javafx-fxml",
            ]),
            compiler_libraries: names(&[
                "gwt-user",
                "gwt-dev",
                "elemental2-core",
                "elemental2-dom",
                "jsinterop-base",
                "jsinterop-annotations",
                "j2cl-annotations",
            ]),
        }
    }
}

impl ArtifactPolicy {
    pub fn is_platform_emulation(&self, name: &str) -> bool {
        name.starts_with(&self.platform_emulation_prefix)
            && name.contains(&self.platform_emulation_marker)
    }

    pub fn is_emulation(&self, name: &str) -> bool {
        self.emulations.contains_key(name)
    }
}

/// Final coordinates of one dependency declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArtifact {
    /// Module the declaration was resolved from
    pub module: String,
    pub group_id: String,
    pub artifact_id: String,
    pub version: Option<String>,
    pub scope: Option<String>,
    pub classifier: Option<String>,
}

impl ResolvedArtifact {
    /// `groupId:artifactId`
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }

    pub fn coordinates(&self) -> ArtifactCoordinates {
        ArtifactCoordinates {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: self.version.clone(),
        }
    }
}

pub struct ArtifactResolver {
    resolver: DependencyResolver,
    policy: ArtifactPolicy,
}

impl ArtifactResolver {
    pub fn new(resolver: DependencyResolver, policy: ArtifactPolicy) -> Self {
        Self {
            resolver,
            policy,
        }
    }

    pub fn policy(&self) -> &ArtifactPolicy {
        &self.policy
    }

    /// Coordinates of `module` in `build`; `None` when no external artifact
    /// is needed
    pub fn artifact_for(&self, module: &Module, build: &BuildInfo) -> Result<Option<ArtifactCoordinates>> {
        let policy = &self.policy;
        let name = module.name();

        if module.is_platform() {
            return Ok(None);
        }
        if policy.is_platform_emulation(name) {
            if build.is_web_executable() {
                return Ok(Some(self.own_coordinates(module)));
            }
            return Ok(None);
        }

        if let Some(emulated) = policy.emulations.get(name) {
            if build.web_transpiled || build.catalog_view {
                return Ok(Some(self.own_coordinates(module)));
            }
            return Ok(Some(ArtifactCoordinates::new(
                &policy.emulated_group_id,
                emulated,
                policy.emulated_version.as_deref(),
            )));
        }

        let own = self.own_coordinates(module);

        if build.catalog_view {
            let redirect = policy
                .catalog_redirects
                .get(name)
                .or_else(|| policy.catalog_redirects.get(&own.artifact_id));
            if let Some(target) = redirect {
                debug!("Catalog view redirects {} to {}", name, target);
                return self.redirected(target).map(Some);
            }
        }

        if build.is_web_executable() {
            if policy.web_dropped.contains(name) || policy.web_dropped.contains(&own.artifact_id) {
                debug!("Dropping {} from web executable", name);
                return Ok(None);
            }
            let substitute = policy
                .web_substitutions
                .get(name)
                .or_else(|| policy.web_substitutions.get(&own.artifact_id));
            if let Some(substitute) = substitute {
                return Ok(Some(ArtifactCoordinates {
                    artifact_id: substitute.clone(),
                    ..own
                }));
            }
        }

        Ok(Some(own))
    }

    /// Scope of a declaration: explicit, else `provided` for interfaces,
    /// optional edges and (in plain library builds only) the UI toolkit
    pub fn scope_for(
        &self,
        edge: &ModuleDependency,
        destination: &Module,
        artifact_id: &str,
        build: &BuildInfo,
    ) -> Option<String> {
        if let Some(scope) = &edge.scope {
            return Some(scope.clone());
        }
        if destination.is_interface() || edge.optional {
            return Some(PROVIDED_SCOPE.to_string());
        }
        if build.is_plain_library() && self.policy.provided_toolkit.contains(artifact_id) {
            return Some(PROVIDED_SCOPE.to_string());
        }
        None
    }

    /// Classifier of a declaration: explicit, else source forms for
    /// web-transpiled executables
    pub fn classifier_for(
        &self,
        edge: &ModuleDependency,
        destination: &Module,
        artifact_id: &str,
        build: &BuildInfo,
    ) -> Option<String> {
        if let Some(classifier) = &edge.classifier {
            return Some(classifier.clone());
        }
        if !build.is_web_executable() || self.policy.compiler_libraries.contains(artifact_id) {
            return None;
        }
        if self.policy.is_platform_emulation(destination.name()) {
            Some(SHADED_SOURCES_CLASSIFIER.to_string())
        } else {
            Some(SOURCES_CLASSIFIER.to_string())
        }
    }

    /// Full declaration for a (possibly merged) edge towards `destination`
    pub fn resolve(
        &self,
        edge: &ModuleDependency,
        destination: &Module,
        build: &BuildInfo,
    ) -> Result<Option<ResolvedArtifact>> {
        let Some(coordinates) = self.artifact_for(destination, build)? else {
            return Ok(None);
        };
        let scope = self.scope_for(edge, destination, &coordinates.artifact_id, build);
        let classifier = self.classifier_for(edge, destination, &coordinates.artifact_id, build);
        Ok(Some(ResolvedArtifact {
            module: destination.name().to_string(),
            group_id: coordinates.group_id,
            artifact_id: coordinates.artifact_id,
            version: coordinates.version,
            scope,
            classifier,
        }))
    }

    /// Artifact declarations for everything `module` needs in `build`
    ///
    /// Executable builds materialize the transitive closure, other builds the
    /// direct dependencies. Edges are grouped by resolved destination, then
    /// deduplicated by `groupId:artifactId`.
    pub fn artifacts(&self, module: &ModuleRef, build: &BuildInfo) -> Result<Vec<ResolvedArtifact>> {
        let edges = if build.executable {
            self.resolver.transitive_dependencies(module, build)
        } else {
            self.resolver.direct_dependencies(module, build)
        };

        let mut groups: Vec<(ModuleRef, Vec<ModuleDependency>)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for edge in edges.iter() {
            let edge = edge?;
            let destination = match self.resolver.resolve_destination(&edge, build) {
                Ok(destination) => destination,
                Err(e) if edge.optional && e.is_unresolved() => continue,
                Err(e) => return Err(e),
            };
            if destination.name() == module.name() {
                continue;
            }
            match index.get(destination.name()) {
                Some(&slot) => groups[slot].1.push(edge),
                None => {
                    index.insert(destination.name().to_string(), groups.len());
                    groups.push((destination, vec![edge]));
                }
            }
        }

        let mut seen = HashSet::new();
        let mut artifacts = Vec::new();
        for (destination, edges) in groups {
            let merged = merge_edges(&edges);
            if let Some(artifact) = self.resolve(&merged, &destination, build)? {
                if seen.insert(artifact.key()) {
                    artifacts.push(artifact);
                } else {
                    debug!("{} already declared, skipping {}", artifact.key(), destination.name());
                }
            }
        }
        Ok(artifacts)
    }

    fn own_coordinates(&self, module: &Module) -> ArtifactCoordinates {
        let registry = self.resolver.registry();
        registry.effective_coordinates(module).unwrap_or_else(|| {
            let settings = registry.settings();
            ArtifactCoordinates::new(
                &settings.default_group_id,
                module.name(),
                settings.default_version.as_deref(),
            )
        })
    }

    fn redirected(&self, target: &str) -> Result<ArtifactCoordinates> {
        let registry = self.resolver.registry();
        match registry.get_or_create(target) {
            Ok(module) => Ok(self.own_coordinates(&module)),
            Err(e) if e.is_unresolved() => {
                let settings = registry.settings();
                Ok(ArtifactCoordinates::new(
                    &settings.default_group_id,
                    target,
                    settings.default_version.as_deref(),
                ))
            }
            Err(e) => Err(e),
        }
    }
}

/// One declaration for several edges to the same module
///
/// Optional only if every edge is; the first explicit scope and classifier
/// win.
fn merge_edges(edges: &[ModuleDependency]) -> ModuleDependency {
    let mut merged = edges[0].clone();
    merged.optional = edges.iter().all(|e| e.optional);
    merged.scope = edges.iter().find_map(|e| e.scope.clone());
    merged.classifier = edges.iter().find_map(|e| e.classifier.clone());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::dependency::DependencyType;
    use crate::module::registry::{
        LocalRepository, ModuleRegistry, RegistrySettings, TomlDescriptorStore, DESCRIPTOR_FILE,
    };
    use crate::module::target::{Target, TargetTag};
    use crate::module::usage::DescriptorUsage;
    use std::path::Path;
    use std::rc::Rc;

    fn write(dir: &Path, text: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), text).unwrap();
    }

    fn fixture(root: &Path) -> ArtifactResolver {
        write(
            root,
            "name = \"webfx-kit\"\ngroup_id = \"dev.webfx\"\nversion = \"0.1.0\"\nmodules = [\"webfx-kit-javafxgraphics-emul\", \"webfx-platform-javabase-emul\", \"app\"]\n",
        );
        write(&root.join("webfx-kit-javafxgraphics-emul"), "");
        write(&root.join("webfx-platform-javabase-emul"), "");
        write(&root.join("app"), "[[dependencies]]\nname = \"webfx-kit-javafxgraphics-emul\"\n\n[[dependencies]]\nname = \"webfx-kit-javafxgraphics-emul\"\ntype = \"resource\"\n\n[[dependencies]]\nname = \"javafx-graphics\"\n");
        let registry = ModuleRegistry::open(
            root,
            Rc::new(TomlDescriptorStore::new()),
            Rc::new(LocalRepository::new(root.join(".repo"))),
            RegistrySettings::default(),
        )
        .unwrap();
        ArtifactResolver::new(
            DependencyResolver::new(registry, Rc::new(DescriptorUsage)),
            ArtifactPolicy::default(),
        )
    }

    fn web_executable() -> BuildInfo {
        BuildInfo::executable(Target::single(TargetTag::Gwt))
    }

    #[test]
    fn test_emulation_in_plain_library_build() {
        let temp = tempfile::tempdir().unwrap();
        let artifacts = fixture(temp.path());
        let module = artifacts
            .resolver
            .registry()
            .get_or_create("webfx-kit-javafxgraphics-emul")
            .unwrap();
        let edge = ModuleDependency::new("app", module.name(), DependencyType::Source);

        let resolved = artifacts
            .resolve(&edge, &module, &BuildInfo::library())
            .unwrap()
            .unwrap();
        assert_eq!(resolved.group_id, "org.openjfx");
        assert_eq!(resolved.artifact_id, "javafx-graphics");
        assert_eq!(resolved.scope.as_deref(), Some(PROVIDED_SCOPE));
        assert_eq!(resolved.classifier, None);
    }

    #[test]
    fn test_emulation_in_web_executable_build() {
        let temp = tempfile::tempdir().unwrap();
        let artifacts = fixture(temp.path());
        let registry = Rc::clone(artifacts.resolver.registry());
        let emul = registry.get_or_create("webfx-kit-javafxgraphics-emul").unwrap();
        let edge = ModuleDependency::new("app", emul.name(), DependencyType::Source);

        let resolved = artifacts.resolve(&edge, &emul, &web_executable()).unwrap().unwrap();
        assert_eq!(resolved.artifact_id, "webfx-kit-javafxgraphics-emul");
        assert_eq!(resolved.group_id, "dev.webfx");
        assert_eq!(resolved.classifier.as_deref(), Some(SOURCES_CLASSIFIER));
        assert_eq!(resolved.scope, None);

        let shaded = registry.get_or_create("webfx-platform-javabase-emul").unwrap();
        let edge = ModuleDependency::new("app", shaded.name(), DependencyType::Source);
        let resolved = artifacts.resolve(&edge, &shaded, &web_executable()).unwrap().unwrap();
        assert_eq!(resolved.classifier.as_deref(), Some(SHADED_SOURCES_CLASSIFIER));
        assert!(artifacts
            .artifact_for(&shaded, &BuildInfo::library())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_catalog_view_redirects_platform_artifact() {
        let temp = tempfile::tempdir().unwrap();
        let artifacts = fixture(temp.path());
        let graphics = artifacts
            .resolver
            .registry()
            .get_or_create("javafx-graphics")
            .unwrap();

        let catalog = artifacts
            .artifact_for(&graphics, &BuildInfo::catalog())
            .unwrap()
            .unwrap();
        assert_eq!(catalog.artifact_id, "webfx-kit-javafxgraphics-emul");
        let plain = artifacts
            .artifact_for(&graphics, &BuildInfo::library())
            .unwrap()
            .unwrap();
        assert_eq!(plain.artifact_id, "javafx-graphics");
        assert!(artifacts
            .artifact_for(&graphics, &web_executable())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_web_executable_substitution_and_platform_modules() {
        let temp = tempfile::tempdir().unwrap();
        let artifacts = fixture(temp.path());
        let registry = Rc::clone(artifacts.resolver.registry());
        let java_base = registry.get_or_create("java-base").unwrap();
        assert!(artifacts
            .artifact_for(&java_base, &web_executable())
            .unwrap()
            .is_none());

        let gwt_user = Module::library(
            "gwt-user",
            ArtifactCoordinates::new("org.gwtproject", "gwt-user", Some("2.10.0")),
            Vec::new(),
        );
        let substituted = artifacts
            .artifact_for(&gwt_user, &web_executable())
            .unwrap()
            .unwrap();
        assert_eq!(substituted.to_string(), "org.gwtproject:gwt-dev:2.10.0");
        let edge = ModuleDependency::new("app", "gwt-user", DependencyType::Source);
        let resolved = artifacts.resolve(&edge, &gwt_user, &web_executable()).unwrap().unwrap();
        assert_eq!(resolved.classifier, None);
    }

    #[test]
    fn test_grouping_merges_edges_and_is_deterministic() {
        let temp = tempfile::tempdir().unwrap();
        let artifacts = fixture(temp.path());
        let app = artifacts.resolver.registry().get_or_create("app").unwrap();

        let first = artifacts.artifacts(&app, &BuildInfo::library()).unwrap();
        let keys: Vec<String> = first.iter().map(ResolvedArtifact::key).collect();
        // The emulation and the platform artifact collapse to one coordinate
        assert_eq!(keys, vec!["org.openjfx:javafx-graphics"]);
        assert_eq!(first, artifacts.artifacts(&app, &BuildInfo::library()).unwrap());
    }

    #[test]
    fn test_policy_overrides_keep_defaults() {
        let policy = ArtifactPolicy::default();
        let text = serde_json::to_string(&policy).unwrap();
        let back: ArtifactPolicy = serde_json::from_str(&text).unwrap();
        assert_eq!(back, policy);
        let partial: ArtifactPolicy = toml::from_str("web_dropped = [\"x\"]").unwrap();
        assert_eq!(partial.web_dropped.len(), 1);
        assert_eq!(partial.emulations.len(), 4);
    }
}
