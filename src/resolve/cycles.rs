//! Cyclic dependency detection
//!
//! Depth-first walk of the direct-dependency relation from every local
//! module, carrying the current path. Revisiting a module on the path
//! records the sub-path as a loop. Loops are reported, never broken.

use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

use crate::module::dependency::BuildInfo;
use crate::module::traits::{ResolveError, Result};
use crate::module::ModuleRef;
use crate::resolve::dependencies::DependencyResolver;

/// Ordered list of module names, each depending on the next and the last on
/// the first
pub type DependencyLoop = Vec<String>;

/// Every loop found in a workspace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    loops: Vec<DependencyLoop>,
}

impl CycleReport {
    pub fn loops(&self) -> &[DependencyLoop] {
        &self.loops
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Loops going through both `a` and `b`
    pub fn loops_containing(&self, a: &str, b: &str) -> Vec<&DependencyLoop> {
        self.loops
            .iter()
            .filter(|l| l.iter().any(|m| m == a) && l.iter().any(|m| m == b))
            .collect()
    }

    /// Fail with the first loop, for callers that cannot tolerate cycles
    pub fn ensure_acyclic(&self) -> Result<()> {
        match self.loops.first() {
            Some(first) => Err(ResolveError::CyclicDependency(first.clone())),
            None => Ok(()),
        }
    }
}

pub struct CycleAnalyzer {
    resolver: DependencyResolver,
    build: BuildInfo,
}

impl CycleAnalyzer {
    pub fn new(resolver: DependencyResolver) -> Self {
        Self {
            resolver,
            build: BuildInfo::library(),
        }
    }

    /// Analyze the graph as seen by `build` instead of a plain library build
    pub fn with_build(mut self, build: BuildInfo) -> Self {
        self.build = build;
        self
    }

    pub fn analyze(&self) -> Result<CycleReport> {
        let mut loops = BTreeSet::new();
        let mut explored = HashSet::new();
        let mut path = Vec::new();

        for module in self.resolver.registry().local_modules()? {
            if !explored.contains(module.name()) {
                self.visit(&module, &mut path, &mut explored, &mut loops)?;
            }
        }

        let report = CycleReport {
            loops: loops.into_iter().collect(),
        };
        info!("Cycle analysis found {} loop(s)", report.loops.len());
        Ok(report)
    }

    fn visit(
        &self,
        module: &ModuleRef,
        path: &mut Vec<String>,
        explored: &mut HashSet<String>,
        loops: &mut BTreeSet<DependencyLoop>,
    ) -> Result<()> {
        path.push(module.name().to_string());

        for edge in self.resolver.direct_dependencies(module, &self.build).iter() {
            let edge = edge?;
            if let Some(start) = path.iter().position(|name| *name == edge.destination) {
                let cycle = normalize(&path[start..]);
                debug!("Dependency loop: {}", cycle.join(" -> "));
                loops.insert(cycle);
                continue;
            }
            if explored.contains(&edge.destination) {
                continue;
            }
            let destination = match self.resolver.registry().get_or_create(&edge.destination) {
                Ok(destination) => destination,
                Err(e) if edge.optional && e.is_unresolved() => continue,
                Err(e) => return Err(e),
            };
            self.visit(&destination, path, explored, loops)?;
        }

        path.pop();
        explored.insert(module.name().to_string());
        Ok(())
    }
}

/// Rotate a loop so that it starts at its smallest name
fn normalize(cycle: &[String]) -> DependencyLoop {
    let start = cycle
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(i, _)| i)
        .unwrap_or(0);
    cycle[start..].iter().chain(&cycle[..start]).cloned().collect()
}
