//! Module registry tests

use std::rc::Rc;
use webfx_modgraph::module::registry::DESCRIPTOR_FILE;
use webfx_modgraph::{ArtifactCoordinates, ModuleDescriptor, ModuleKind, ResolveError};
mod common;
use common::*;

fn demo_tree() -> ProjectTree {
    ProjectTree::new(
        "name = \"demo\"\ngroup_id = \"org.demo\"\nversion = \"2.0.0\"\nmodules = [\"demo-platform\", \"demo-app\"]\n",
    )
    .with_module(
        "demo-platform",
        "modules = [\"demo-platform-api\", \"demo-platform-gwt\"]\n",
    )
    .with_module("demo-platform/demo-platform-api", "interface = true\n")
    .with_module(
        "demo-platform/demo-platform-gwt",
        "implements = [\"demo-platform-api\"]\n",
    )
    .with_module(
        "demo-app",
        "[[dependencies]]\nname = \"demo-platform-api\"\n\n[[dependencies]]\nname = \"java-base\"\n",
    )
}

#[test]
fn test_identity_is_stable_across_lookup_paths() {
    let tree = demo_tree();
    let workspace = tree.open();
    let registry = workspace.registry();

    let streamed = registry
        .stream()
        .try_find(|m| m.name() == "demo-platform-gwt")
        .unwrap()
        .unwrap();
    let looked_up = workspace.module("demo-platform-gwt").unwrap();
    assert!(Rc::ptr_eq(&streamed, &looked_up));
    assert!(Rc::ptr_eq(&looked_up, &registry.get_or_create("demo-platform-gwt").unwrap()));

    let base = registry.get_or_create("java-base").unwrap();
    assert!(Rc::ptr_eq(&base, &registry.get_or_create("java-base").unwrap()));
}

#[test]
fn test_stream_only_walks_as_far_as_needed() {
    let tree = demo_tree();
    let workspace = tree.open();
    let registry = workspace.registry();
    assert_eq!(registry.registered_count(), 1);

    let platform = registry
        .stream()
        .try_find(|m| m.name() == "demo-platform")
        .unwrap();
    assert!(platform.is_some());
    assert_eq!(registry.registered_count(), 2);

    // A second consumer replays the known modules, then resumes the walk
    let all = registry.stream().try_collect().unwrap();
    assert_eq!(
        names(&all),
        vec![
            "demo",
            "demo-platform",
            "demo-app",
            "demo-platform-api",
            "demo-platform-gwt"
        ]
    );
}

#[test]
fn test_parent_and_children_links() {
    let tree = demo_tree();
    let workspace = tree.open();
    let registry = workspace.registry();

    let root = workspace.root().unwrap();
    assert!(root.is_root());
    assert_eq!(names(&registry.children_of(&root).unwrap()), vec!["demo-platform", "demo-app"]);

    let gwt = workspace.module("demo-platform-gwt").unwrap();
    let parent = registry.parent_of(&gwt).unwrap().unwrap();
    assert_eq!(parent.name(), "demo-platform");
    assert!(registry.parent_of(&root).unwrap().is_none());
    assert_eq!(
        gwt.home().unwrap(),
        tree.root.join("demo-platform").join("demo-platform-gwt")
    );
}

#[test]
fn test_unknown_module_is_reported() {
    let tree = demo_tree();
    let workspace = tree.open();
    assert_eq!(
        workspace.module("missing-module").unwrap_err(),
        ResolveError::UnresolvedModule("missing-module".to_string())
    );
    // Failed lookups leave earlier results usable
    assert!(workspace.module("demo-app").is_ok());
}

#[test]
fn test_published_module_inherits_root_coordinates() {
    let tree = demo_tree();
    tree.publish(
        &ArtifactCoordinates::new("org.demo", "demo-shared", Some("2.0.0")),
        "exported_packages = [\"org.demo.shared\"]\n",
    );
    let workspace = tree.open();

    let shared = workspace.module("demo-shared").unwrap();
    assert!(matches!(shared.kind(), ModuleKind::Published(_)));
    assert_eq!(
        workspace
            .registry()
            .effective_coordinates(&shared)
            .unwrap()
            .to_string(),
        "org.demo:demo-shared:2.0.0"
    );

    let gwt = workspace.module("demo-platform-gwt").unwrap();
    assert_eq!(
        workspace.registry().effective_coordinates(&gwt).unwrap().to_string(),
        "org.demo:demo-platform-gwt:2.0.0"
    );
}

#[test]
fn test_create_and_rename_through_workspace() {
    let tree = demo_tree();
    let workspace = tree.open();

    let created = workspace.create_module("demo", "demo-tools").unwrap();
    assert!(tree.root.join("demo-tools").join(DESCRIPTOR_FILE).is_file());
    assert_eq!(created.parent_name().as_deref(), Some("demo"));
    assert!(workspace.create_module("demo", "demo-app").is_err());

    let renamed = workspace
        .rename_module("demo-platform-api", "demo-platform-spi")
        .unwrap();
    assert_eq!(renamed.name(), "demo-platform-spi");
    assert!(workspace.registry().lookup("demo-platform-api").is_none());

    let app = workspace.module("demo-app").unwrap();
    let direct = workspace
        .resolver()
        .direct_dependencies(&app, &webfx_modgraph::BuildInfo::library());
    assert_eq!(destinations(&direct), vec!["demo-platform-spi", "java-base"]);

    let gwt = workspace.module("demo-platform-gwt").unwrap();
    assert!(gwt.implements("demo-platform-spi"));

    let on_disk = ModuleDescriptor::from_file(tree.root.join("demo-platform").join(DESCRIPTOR_FILE)).unwrap();
    assert_eq!(on_disk.modules, vec!["demo-platform-spi", "demo-platform-gwt"]);
}

#[test]
fn test_root_cannot_be_renamed() {
    let tree = demo_tree();
    let workspace = tree.open();
    let err = workspace.rename_module("demo", "demo2").unwrap_err();
    assert!(matches!(err, ResolveError::MalformedDescriptor { .. }));
}
