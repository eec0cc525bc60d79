//! Configuration loading and shared configuration types for fieldsync services.

mod environment;
mod load;
pub mod shared;

pub use environment::{ENVIRONMENT_VAR, Environment, UnknownEnvironment};
pub use load::{CONFIG_DIR_VAR, Config, LoadConfigError, load_config, load_config_from};
