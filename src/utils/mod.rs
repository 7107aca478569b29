//! Utility modules shared by the resolver layers

pub mod env;
pub mod logging;

// Re-export commonly used items
pub use env::{env_bool, env_opt, env_or_default};
pub use logging::{init_logging, init_logging_from_config};
#[cfg(feature = "json-logging")]
pub use logging::init_json_logging;
