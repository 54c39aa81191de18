//! Configuration for the Switchyard runtime.
//!
//! Layered loading via figment, the schema, and validation.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogOutput, LoggingConfig, SpanEventConfig, SwitchyardConfig,
};
pub use validation::validate_config;
