//! WebFX module graph - module resolution core of the WebFX build tooling
//!
//! This crate discovers the modules of a multi-module project tree, resolves
//! the dependency relation between them, and maps every edge to a published
//! artifact coordinate. The same module resolves differently depending on
//! who asks: a web executable, a desktop executable or a plain library build.
//!
//! ## Layers
//!
//! 1. [`seq`]: restartable lazy sequences with cached replay
//! 2. [`module`]: module entities, targets, descriptors and the registry
//! 3. [`resolve`]: dependency closure with implicit providers, artifact
//!    mapping and cycle analysis
//! 4. [`config`] / [`utils`]: configuration loading and logging setup
//!
//! ## Design Principles
//!
//! 1. **Lazy**: nothing is read or computed before a consumer pulls it
//! 2. **Single identity**: one instance per module name for a whole run
//! 3. **Explicit context**: the build description is passed to every query
//!
//! ## Example
//!
//! ```rust,no_run
//! use webfx_modgraph::{BuildInfo, ResolverConfig, Target, TargetTag, Workspace};
//!
//! let config = ResolverConfig::for_workspace("path/to/project");
//! let workspace = Workspace::open(&config)?;
//! let app = workspace.find_executable(TargetTag::Gwt)?;
//! let build = BuildInfo::executable(Target::single(TargetTag::Gwt));
//! for artifact in workspace.artifacts().artifacts(&app, &build)? {
//!     println!("{}", artifact.coordinates());
//! }
//! # Ok::<(), webfx_modgraph::ResolveError>(())
//! ```

pub mod config;
pub mod module;
pub mod resolve;
pub mod seq;
pub mod utils;

pub use config::{LoggingConfig, RepositoryConfig, ResolverConfig, WorkspaceConfig};
pub use module::dependency::{BuildInfo, DependencyType, ModuleDependency};
pub use module::registry::{ModuleDescriptor, ModuleRegistry};
pub use module::target::{Target, TargetTag};
pub use module::traits::{DescriptorStore, RepositoryClient, ResolveError, Result, UsageAnalyzer};
pub use module::usage::UsageSet;
pub use module::{ArtifactCoordinates, Module, ModuleKind, ModuleRef};
pub use resolve::{
    ArtifactPolicy, ArtifactResolver, CycleAnalyzer, CycleReport, DependencyLoop,
    DependencyResolver, ResolvedArtifact, Workspace,
};
pub use seq::Seq;
