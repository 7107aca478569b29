//! Static usage of packages, classes and services
//!
//! The source analyzer itself lives outside the crate; this module only
//! holds its results and two analyzers that replay them.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use crate::module::traits::{Result, UsageAnalyzer};
use crate::module::Module;

/// Packages, classes and services a module statically references
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSet {
    #[serde(default)]
    pub packages: BTreeSet<String>,
    #[serde(default)]
    pub classes: BTreeSet<String>,
    #[serde(default)]
    pub services: BTreeSet<String>,
}

impl UsageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.packages.extend(packages.into_iter().map(Into::into));
        self
    }

    pub fn with_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.classes.extend(classes.into_iter().map(Into::into));
        self
    }

    pub fn with_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services.extend(services.into_iter().map(Into::into));
        self
    }

    /// A used class `a.b.C` also counts as a use of package `a.b`
    pub fn uses_package(&self, package: &str) -> bool {
        self.packages.contains(package)
            || self
                .classes
                .iter()
                .any(|class| class.rsplit_once('.').map(|(p, _)| p) == Some(package))
    }

    pub fn uses_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn uses_service(&self, service: &str) -> bool {
        self.services.contains(service)
    }

    pub fn merge(&mut self, other: &UsageSet) {
        self.packages.extend(other.packages.iter().cloned());
        self.classes.extend(other.classes.iter().cloned());
        self.services.extend(other.services.iter().cloned());
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.classes.is_empty() && self.services.is_empty()
    }
}

/// Analyzer that reports the usage recorded in each module's descriptor
#[derive(Debug, Clone, Default)]
pub struct DescriptorUsage;

impl UsageAnalyzer for DescriptorUsage {
    fn analyze(&self, module: &Module) -> Result<UsageSet> {
        Ok(module
            .descriptor()
            .and_then(|d| d.usage.clone())
            .unwrap_or_default())
    }
}

/// In-memory usage table fed by an external source analyzer
///
/// Falls back to the descriptor's recorded usage for modules not in the table.
#[derive(Debug, Default)]
pub struct StaticUsage {
    table: RefCell<HashMap<String, UsageSet>>,
}

impl StaticUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, module: &str, usage: UsageSet) {
        self.table
            .borrow_mut()
            .entry(module.to_string())
            .or_default()
            .merge(&usage);
    }
}

impl UsageAnalyzer for StaticUsage {
    fn analyze(&self, module: &Module) -> Result<UsageSet> {
        if let Some(usage) = self.table.borrow().get(module.name()) {
            return Ok(usage.clone());
        }
        DescriptorUsage.analyze(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_implies_package() {
        let usage = UsageSet::new().with_classes(["foo.bar.Baz"]);
        assert!(usage.uses_package("foo.bar"));
        assert!(!usage.uses_package("foo"));
        assert!(usage.uses_class("foo.bar.Baz"));
    }

    #[test]
    fn test_merge() {
        let mut usage = UsageSet::new().with_packages(["a"]);
        usage.merge(&UsageSet::new().with_services(["s.S"]));
        assert!(usage.uses_package("a"));
        assert!(usage.uses_service("s.S"));
        assert!(!usage.is_empty());
    }
}
