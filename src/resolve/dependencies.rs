//! Dependency resolution
//!
//! Computes, per module and build context, the declared edges, the implicit
//! edges injected by auto-injection conditions, and the transitive closure.
//! Every query is a lazy [`Seq`]; direct and transitive results are cached
//! per `(module, BuildInfo)` and replayed to every consumer.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use tracing::{debug, warn};

use crate::module::dependency::{BuildInfo, DependencyType, ModuleDependency};
use crate::module::registry::ModuleRegistry;
use crate::module::target::Target;
use crate::module::traits::{ResolveError, Result, UsageAnalyzer};
use crate::module::usage::UsageSet;
use crate::module::{Module, ModuleRef};
use crate::seq::Seq;

/// Lazy stream of dependency edges
pub type DependencySeq = Seq<Result<ModuleDependency>>;

type CacheKey = (String, BuildInfo);

struct ResolverState {
    registry: Rc<ModuleRegistry>,
    analyzer: Rc<dyn UsageAnalyzer>,
    direct: RefCell<HashMap<CacheKey, DependencySeq>>,
    transitive: RefCell<HashMap<CacheKey, DependencySeq>>,
    usage: RefCell<HashMap<String, UsageSet>>,
}

/// Dependency resolver over a shared registry
///
/// Cloning is cheap; clones share caches.
#[derive(Clone)]
pub struct DependencyResolver {
    state: Rc<ResolverState>,
}

impl DependencyResolver {
    pub fn new(registry: Rc<ModuleRegistry>, analyzer: Rc<dyn UsageAnalyzer>) -> Self {
        Self {
            state: Rc::new(ResolverState {
                registry,
                analyzer,
                direct: RefCell::new(HashMap::new()),
                transitive: RefCell::new(HashMap::new()),
                usage: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.state.registry
    }

    /// Drop every cached result, e.g. after a descriptor rewrite
    pub fn invalidate(&self) {
        self.state.direct.borrow_mut().clear();
        self.state.transitive.borrow_mut().clear();
        self.state.usage.borrow_mut().clear();
        debug!("Dependency caches invalidated");
    }

    /// Edges declared in the module's descriptor that apply to `build`
    pub fn declared_dependencies(&self, module: &ModuleRef, build: &BuildInfo) -> DependencySeq {
        let module = Rc::clone(module);
        let build = build.clone();
        Seq::from_fn(move || {
            let edges: Vec<ModuleDependency> = module
                .descriptor()
                .map(|descriptor| {
                    descriptor
                        .dependencies
                        .iter()
                        .map(|decl| ModuleDependency::from_decl(module.name(), decl))
                        .collect()
                })
                .unwrap_or_default();
            let build = build.clone();
            edges
                .into_iter()
                .filter(move |edge| edge.applies_to(&build))
                .map(Ok)
        })
    }

    /// Packages, classes and services the module statically uses
    ///
    /// Combines the analyzer's result with the services the descriptor
    /// declares it uses.
    pub fn usage_of(&self, module: &Module) -> Result<UsageSet> {
        if let Some(usage) = self.state.usage.borrow().get(module.name()) {
            return Ok(usage.clone());
        }
        let mut usage = self.state.analyzer.analyze(module)?;
        usage.services.extend(module.used_services());
        self.state
            .usage
            .borrow_mut()
            .insert(module.name().to_string(), usage.clone());
        Ok(usage)
    }

    /// IMPLICIT_PROVIDER edges towards every module whose auto-injection
    /// condition the consumer's usage satisfies
    ///
    /// Candidates come from the registration stream: the local tree first,
    /// then the wider catalog.
    pub fn implicit_dependencies(&self, module: &ModuleRef, build: &BuildInfo) -> DependencySeq {
        if !module.is_project() {
            return Seq::empty();
        }
        let resolver = self.clone();
        let consumer = Rc::clone(module);
        let usage: Seq<Result<UsageSet>> =
            Seq::once_with(move || resolver.usage_of(&consumer)).cache();

        let registry = Rc::clone(&self.state.registry);
        let consumer = Rc::clone(module);
        let required = required_target(module, build);
        usage.flat_map_ok(move |usage| {
            if usage.is_empty() {
                return Seq::empty();
            }
            let consumer_name = consumer.name().to_string();
            let source = consumer_name.clone();
            let required = required.clone();
            registry
                .stream()
                .filter_ok(move |candidate| {
                    candidate.name() != consumer_name
                        && candidate.target().grade(&required) >= 0
                        && candidate
                            .auto_inject_conditions()
                            .iter()
                            .any(|condition| condition.is_satisfied_by(&usage))
                })
                .map_ok(move |candidate| {
                    debug!("Auto-injecting {} into {}", candidate.name(), source);
                    ModuleDependency::implicit(&source, candidate.name())
                })
        })
    }

    /// Declared plus implicit edges, one per (destination, type)
    pub fn direct_dependencies(&self, module: &ModuleRef, build: &BuildInfo) -> DependencySeq {
        let key = (module.name().to_string(), build.clone());
        let cached = self.state.direct.borrow().get(&key).cloned();
        if let Some(seq) = cached {
            return seq;
        }

        let seq = self
            .declared_dependencies(module, build)
            .concat(&self.implicit_dependencies(module, build))
            .distinct_by(|edge| edge.as_ref().ok().map(ModuleDependency::dedup_key))
            .cache();
        self.state.direct.borrow_mut().insert(key, seq.clone());
        seq
    }

    /// Transitive closure of the module's direct dependencies
    pub fn transitive_dependencies(&self, module: &ModuleRef, build: &BuildInfo) -> DependencySeq {
        let key = (module.name().to_string(), build.clone());
        let cached = self.state.transitive.borrow().get(&key).cloned();
        if let Some(seq) = cached {
            return seq;
        }

        let seq = self
            .expansion(
                self.direct_dependencies(module, build),
                Some(module.name().to_string()),
                build,
            )
            .cache();
        self.state.transitive.borrow_mut().insert(key, seq.clone());
        seq
    }

    /// Re-apply the transitive expansion to an arbitrary seed
    ///
    /// Every seed edge counts as a first hop. The closure of a closure is
    /// the closure itself.
    pub fn closure_from(&self, seed: &DependencySeq, build: &BuildInfo) -> DependencySeq {
        self.expansion(seed.clone(), None, build)
    }

    fn expansion(&self, seed: DependencySeq, origin: Option<String>, build: &BuildInfo) -> DependencySeq {
        let resolver = self.clone();
        let build = build.clone();
        Seq::from_fn(move || ClosureWalk::new(resolver.clone(), seed.iter(), origin.clone(), build.clone()))
    }

    /// Module an edge points at under `build`
    ///
    /// Interface destinations are replaced by their best implementation in
    /// executable or platform-targeted builds; the edge itself keeps the
    /// interface name.
    pub fn resolve_destination(&self, edge: &ModuleDependency, build: &BuildInfo) -> Result<ModuleRef> {
        let destination = self.state.registry.get_or_create(&edge.destination)?;
        if !destination.is_interface() || !substitutes_interfaces(build) {
            return Ok(destination);
        }
        match self.implementation_of(&destination, &build.target)? {
            Some(implementation) => {
                debug!(
                    "Interface {} resolved to {} for {}",
                    destination.name(),
                    implementation.name(),
                    build.target
                );
                Ok(implementation)
            }
            None => {
                warn!(
                    "No implementation of {} compatible with {}",
                    destination.name(),
                    build.target
                );
                Ok(destination)
            }
        }
    }

    /// Most specific implementation of `interface` compatible with `target`
    pub fn implementation_of(&self, interface: &Module, target: &Target) -> Result<Option<ModuleRef>> {
        let interface_name = interface.name().to_string();
        let candidates = self
            .state
            .registry
            .stream()
            .filter_ok(move |m| m.implements(&interface_name))
            .try_collect()?;

        let mut best: Vec<ModuleRef> = Vec::new();
        let mut best_grade = -1;
        for candidate in candidates {
            let grade = candidate.target().grade(target);
            if grade < 0 {
                continue;
            }
            if grade > best_grade {
                best_grade = grade;
                best.clear();
            }
            if grade == best_grade {
                best.push(candidate);
            }
        }

        match best.len() {
            0 => Ok(None),
            1 => Ok(best.pop()),
            _ => Err(ResolveError::AmbiguousResolution {
                query: format!("implementation of {} for {}", interface.name(), target),
                candidates: best.iter().map(|m| m.name().to_string()).collect(),
            }),
        }
    }

    /// Modules providing `service` that are compatible with `target`,
    /// most specific first
    pub fn service_providers(&self, service: &str, target: &Target) -> Seq<Result<ModuleRef>> {
        let stream = self.state.registry.stream();
        let service = service.to_string();
        let target = target.clone();
        Seq::from_fn(move || {
            let mut graded: Vec<(i32, ModuleRef)> = Vec::new();
            let mut failure = None;
            for item in stream.iter() {
                let provides = item.and_then(|m| Ok((m.provides_service(&service)?, m)));
                match provides {
                    Ok((true, module)) => {
                        let grade = module.target().grade(&target);
                        if grade >= 0 {
                            graded.push((grade, module));
                        }
                    }
                    Ok((false, _)) => {}
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            graded.sort_by_key(|(grade, _)| Reverse(*grade));
            graded
                .into_iter()
                .map(|(_, module)| Ok(module))
                .chain(failure.map(Err))
        })
    }
}

fn substitutes_interfaces(build: &BuildInfo) -> bool {
    build.executable || !build.target.is_universal()
}

/// Target candidates are graded against: the build's, else the consumer's own
fn required_target(module: &Module, build: &BuildInfo) -> Target {
    if build.target.is_universal() {
        module.target()
    } else {
        build.target.clone()
    }
}

/// Breadth-first closure walk
///
/// Seed edges are emitted first; past them only transitive and implicit
/// edges propagate, except in executable builds. Each destination is
/// expanded once.
struct ClosureWalk {
    resolver: DependencyResolver,
    build: BuildInfo,
    seed: Box<dyn Iterator<Item = Result<ModuleDependency>>>,
    seed_done: bool,
    pending: VecDeque<ModuleDependency>,
    origin: Option<String>,
    visited: HashSet<String>,
    visit_order: Vec<ModuleRef>,
    emitted: HashSet<(String, String, DependencyType)>,
    checked_services: HashSet<String>,
    failed: bool,
}

impl ClosureWalk {
    fn new(
        resolver: DependencyResolver,
        seed: Box<dyn Iterator<Item = Result<ModuleDependency>>>,
        origin: Option<String>,
        build: BuildInfo,
    ) -> Self {
        let mut walk = Self {
            resolver,
            build,
            seed,
            seed_done: false,
            pending: VecDeque::new(),
            origin: None,
            visited: HashSet::new(),
            visit_order: Vec::new(),
            emitted: HashSet::new(),
            checked_services: HashSet::new(),
            failed: false,
        };
        if let Some(origin) = origin {
            walk.set_origin(&origin);
        }
        walk
    }

    fn set_origin(&mut self, origin: &str) {
        self.origin = Some(origin.to_string());
        if self.visited.insert(origin.to_string()) {
            if let Some(module) = self.resolver.registry().lookup(origin) {
                self.visit_order.push(module);
            }
        }
    }

    fn next_edge(&mut self) -> Result<Option<ModuleDependency>> {
        loop {
            if !self.seed_done {
                match self.seed.next() {
                    Some(edge) => {
                        let edge = edge?;
                        if self.origin.is_none() {
                            let source = edge.source.clone();
                            self.set_origin(&source);
                        }
                        return Ok(Some(edge));
                    }
                    None => self.seed_done = true,
                }
            }
            if let Some(edge) = self.pending.pop_front() {
                return Ok(Some(edge));
            }
            if !self.build.executable || !self.inject_service_providers()? {
                return Ok(None);
            }
        }
    }

    /// Queue the destination's propagating edges; `false` when the edge is
    /// skipped altogether
    fn expand(&mut self, edge: &ModuleDependency) -> Result<bool> {
        let destination = match self.resolver.resolve_destination(edge, &self.build) {
            Ok(destination) => destination,
            Err(e) if edge.optional && e.is_unresolved() => {
                debug!("Skipping unresolved optional dependency {}", edge);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        if !self.visited.insert(destination.name().to_string()) {
            return Ok(true);
        }
        self.visit_order.push(Rc::clone(&destination));

        let executable = self.build.executable;
        for next in self
            .resolver
            .direct_dependencies(&destination, &self.build)
            .iter()
        {
            let next = next?;
            if executable || next.transitive || next.is_implicit() {
                self.pending.push_back(next);
            }
        }
        Ok(true)
    }

    /// Inject providers for services used but not provided in the closure
    ///
    /// Returns whether anything new was queued.
    fn inject_service_providers(&mut self) -> Result<bool> {
        let Some(origin) = self.origin.clone() else {
            return Ok(false);
        };
        let mut used = BTreeSet::new();
        let mut provided = HashSet::new();
        for module in &self.visit_order {
            used.extend(self.resolver.usage_of(module)?.services);
            for (interface, _) in module.provided_services()? {
                provided.insert(interface);
            }
        }

        let mut injected = false;
        for service in used {
            if provided.contains(&service) || !self.checked_services.insert(service.clone()) {
                continue;
            }
            match self
                .resolver
                .service_providers(&service, &self.build.target)
                .find_first()
            {
                Some(provider) => {
                    let provider = provider?;
                    debug!("Injecting {} as provider of {}", provider.name(), service);
                    self.pending
                        .push_back(ModuleDependency::implicit(&origin, provider.name()));
                    injected = true;
                }
                None => warn!("No provider of service {} for {}", service, self.build.target),
            }
        }
        Ok(injected)
    }
}

impl Iterator for ClosureWalk {
    type Item = Result<ModuleDependency>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            let edge = match self.next_edge() {
                Ok(Some(edge)) => edge,
                Ok(None) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            };
            let identity = (edge.source.clone(), edge.destination.clone(), edge.kind);
            if !self.emitted.insert(identity) {
                continue;
            }
            match self.expand(&edge) {
                Ok(true) => return Some(Ok(edge)),
                Ok(false) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::registry::{
        LocalRepository, RegistrySettings, TomlDescriptorStore, DESCRIPTOR_FILE,
    };
    use crate::module::target::TargetTag;
    use crate::module::usage::{DescriptorUsage, StaticUsage};
    use std::path::Path;

    fn write(dir: &Path, text: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(DESCRIPTOR_FILE), text).unwrap();
    }

    fn resolver(root: &Path, analyzer: Rc<dyn UsageAnalyzer>) -> DependencyResolver {
        let registry = ModuleRegistry::open(
            root,
            Rc::new(TomlDescriptorStore::new()),
            Rc::new(LocalRepository::new(root.join(".repo"))),
            RegistrySettings::default(),
        )
        .unwrap();
        DependencyResolver::new(registry, analyzer)
    }

    fn destinations(seq: &DependencySeq) -> Vec<String> {
        seq.try_collect()
            .unwrap()
            .into_iter()
            .map(|e| e.destination)
            .collect()
    }

    #[test]
    fn test_plugin_edges_only_for_executables() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"app\"\nmodules = [\"lib\", \"plugin\"]\n\n[[dependencies]]\nname = \"lib\"\n\n[[dependencies]]\nname = \"plugin\"\ntype = \"plugin\"\n");
        write(&root.join("lib"), "");
        write(&root.join("plugin"), "");
        let resolver = resolver(root, Rc::new(DescriptorUsage));
        let app = resolver.registry().root().unwrap();

        let library = resolver.declared_dependencies(&app, &BuildInfo::library());
        assert_eq!(destinations(&library), vec!["lib"]);
        let executable = resolver.declared_dependencies(
            &app,
            &BuildInfo::executable(Target::single(TargetTag::Jre)),
        );
        assert_eq!(destinations(&executable), vec!["lib", "plugin"]);
    }

    #[test]
    fn test_direct_dependencies_are_cached_per_build() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"app\"\nmodules = [\"lib\"]\n\n[[dependencies]]\nname = \"lib\"\n");
        write(&root.join("lib"), "");
        let resolver = resolver(root, Rc::new(DescriptorUsage));
        let app = resolver.registry().root().unwrap();

        let first = resolver.direct_dependencies(&app, &BuildInfo::library());
        let second = resolver.direct_dependencies(&app, &BuildInfo::library());
        assert_eq!(first.try_collect().unwrap(), second.try_collect().unwrap());
        assert_eq!(resolver.state.direct.borrow().len(), 1);
        resolver.direct_dependencies(&app, &BuildInfo::catalog());
        assert_eq!(resolver.state.direct.borrow().len(), 2);
    }

    #[test]
    fn test_implicit_provider_from_class_usage() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"root\"\nmodules = [\"x\", \"y\"]\n");
        write(&root.join("x"), "[[auto_inject]]\nif_uses_java_classes = [\"foo.Bar\"]\n");
        write(&root.join("y"), "");
        let usage = StaticUsage::new();
        usage.record("y", UsageSet::new().with_classes(["foo.Bar"]));
        let resolver = resolver(root, Rc::new(usage));
        let y = resolver.registry().get_or_create("y").unwrap();

        let direct = resolver
            .direct_dependencies(&y, &BuildInfo::library())
            .try_collect()
            .unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct[0].destination, "x");
        assert_eq!(direct[0].kind, DependencyType::ImplicitProvider);
    }

    #[test]
    fn test_ambiguous_implementation() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"root\"\nmodules = [\"api\", \"impl-a-gwt\", \"impl-b-gwt\"]\n");
        write(&root.join("api"), "interface = true\n");
        write(&root.join("impl-a-gwt"), "implements = [\"api\"]\n");
        write(&root.join("impl-b-gwt"), "implements = [\"api\"]\n");
        let resolver = resolver(root, Rc::new(DescriptorUsage));
        let api = resolver.registry().get_or_create("api").unwrap();

        let err = resolver
            .implementation_of(&api, &Target::single(TargetTag::Gwt))
            .unwrap_err();
        assert!(matches!(err, ResolveError::AmbiguousResolution { .. }));
        assert!(resolver
            .implementation_of(&api, &Target::single(TargetTag::OpenJfx))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_service_provider_injection_in_executables() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"root\"\nmodules = [\"app\", \"storage-web\", \"storage-jre\"]\n");
        write(&root.join("app"), "executable = true\ntarget = [\"gwt\"]\nuses_services = [\"x.Storage\"]\n");
        write(&root.join("storage-web"), "target = [\"web\"]\n[[provides]]\ninterface = \"x.Storage\"\nimplementations = [\"x.WebStorage\"]\n");
        write(&root.join("storage-jre"), "target = [\"jre\"]\n[[provides]]\ninterface = \"x.Storage\"\nimplementations = [\"x.JreStorage\"]\n");
        let resolver = resolver(root, Rc::new(DescriptorUsage));
        let app = resolver.registry().get_or_create("app").unwrap();

        let build = BuildInfo::executable(Target::single(TargetTag::Gwt));
        let closure = resolver.transitive_dependencies(&app, &build);
        assert_eq!(destinations(&closure), vec!["storage-web"]);
        assert!(destinations(&resolver.transitive_dependencies(&app, &BuildInfo::library())).is_empty());
    }

    #[test]
    fn test_unresolved_optional_edge_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        write(root, "name = \"app\"\n[[dependencies]]\nname = \"ghost\"\noptional = true\n\n[[dependencies]]\nname = \"java-base\"\n");
        let resolver = resolver(root, Rc::new(DescriptorUsage));
        let app = resolver.registry().root().unwrap();
        let closure = resolver.transitive_dependencies(&app, &BuildInfo::library());
        assert_eq!(destinations(&closure), vec!["java-base"]);
    }
}
