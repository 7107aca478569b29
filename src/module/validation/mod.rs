//! Module validation framework
//!
//! Provides descriptor validation: naming, versions, dependency
//! declarations and auto-injection conditions.

pub mod manifest_validator;

pub use manifest_validator::{DescriptorValidator, ValidationResult};
