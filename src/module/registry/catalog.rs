//! Built-in module catalog
//!
//! Platform modules ship with the runtime and never map to an external
//! artifact. Built-in libraries are the platform-native toolkit artifacts
//! every project may reference without declaring them.

use crate::module::registry::manifest::LibraryDecl;

/// JDK modules available on every Java platform
pub const PLATFORM_MODULES: &[&str] = &[
    "java-base",
    "java-desktop",
    "java-logging",
    "java-net-http",
    "java-sql",
    "java-xml",
    "jdk-jfr",
    "jdk-jsobject",
];

/// Group of the platform-native UI toolkit artifacts
pub const OPENJFX_GROUP_ID: &str = "org.openjfx";

/// Version of the platform-native UI toolkit artifacts
pub const OPENJFX_VERSION: &str = "21.0.1";

const OPENJFX_MODULES: &[(&str, &str)] = &[
    ("javafx-base", "javafx.beans"),
    ("javafx-graphics", "javafx.scene"),
    ("javafx-controls", "javafx.scene.control"),
    ("javafx-media", "javafx.scene.media"),
    ("javafx-web", "javafx.scene.web"),
    ("javafx-fxml", "javafx.fxml"),
];

pub fn is_platform_module(name: &str) -> bool {
    PLATFORM_MODULES.contains(&name)
}

/// Built-in library declaration for `name`, if any
pub fn builtin_library(name: &str) -> Option<LibraryDecl> {
    OPENJFX_MODULES
        .iter()
        .find(|(module, _)| *module == name)
        .map(|(module, package)| LibraryDecl {
            name: module.to_string(),
            group_id: OPENJFX_GROUP_ID.to_string(),
            artifact_id: None,
            version: Some(OPENJFX_VERSION.to_string()),
            modules: Vec::new(),
            exported_packages: vec![package.to_string()],
        })
}
