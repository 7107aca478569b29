//! Descriptor validation framework
//!
//! Validates module descriptors for structure and naming. Discovery logs the
//! problems and keeps going; a field that is actually broken fails later, at
//! the point it is needed.

use tracing::{debug, warn};

use crate::module::registry::manifest::ModuleDescriptor;

/// Validation result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Descriptor is valid
    Valid,
    /// Descriptor is invalid with specific errors
    Invalid(Vec<String>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }
}

/// Descriptor validator
pub struct DescriptorValidator {
    /// Maximum module name length
    max_name_len: usize,
}

impl DescriptorValidator {
    /// Create a new descriptor validator
    pub fn new() -> Self {
        Self { max_name_len: 128 }
    }

    /// Validate the descriptor of the module called `name`
    pub fn validate(&self, name: &str, descriptor: &ModuleDescriptor) -> ValidationResult {
        let mut errors = Vec::new();

        if !self.is_valid_name(name) {
            errors.push(format!(
                "Invalid module name: {} (must be alphanumeric with dashes/underscores/dots)",
                name
            ));
        }

        if let Some(version) = &descriptor.version {
            if !self.is_valid_version(version) {
                errors.push(format!(
                    "Invalid version format: {} (expected major.minor[.patch][-qualifier])",
                    version
                ));
            }
        }

        for child in &descriptor.modules {
            if !self.is_valid_name(child) {
                errors.push(format!("Invalid child module name: {}", child));
            }
        }

        for dependency in &descriptor.dependencies {
            if !self.is_valid_name(&dependency.name) {
                errors.push(format!("Invalid dependency name: {}", dependency.name));
            }
            if dependency.name == name {
                errors.push(format!("Module {} depends on itself", name));
            }
        }

        if descriptor.auto_inject.iter().any(|c| c.is_empty()) {
            errors.push("Empty auto_inject condition".to_string());
        }

        if descriptor.interface && descriptor.executable {
            errors.push("An interface module cannot be executable".to_string());
        }

        if errors.is_empty() {
            debug!("Descriptor validation passed for module: {}", name);
            ValidationResult::Valid
        } else {
            warn!("Descriptor validation failed for module {}: {:?}", name, errors);
            ValidationResult::Invalid(errors)
        }
    }

    /// Validate module name format
    #[inline]
    fn is_valid_name(&self, name: &str) -> bool {
        if name.is_empty() || name.len() > self.max_name_len {
            return false;
        }

        if !name.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return false;
        }

        name.chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '.')
    }

    /// Validate version format
    ///
    /// Accepts: major.minor[.patch][-qualifier], e.g. `0.1.0-SNAPSHOT`
    #[inline]
    fn is_valid_version(&self, version: &str) -> bool {
        let version_part = match version.split_once('-') {
            Some((base, qualifier)) => {
                if qualifier.is_empty() {
                    return false;
                }
                base
            }
            None => version,
        };

        let nums: Vec<&str> = version_part.split('.').collect();
        if nums.len() < 2 || nums.len() > 3 {
            return false;
        }

        nums.iter()
            .all(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
    }
}

impl Default for DescriptorValidator {
    fn default() -> Self {
        Self::new()
    }
}
