//! Configuration for the storefront session gateway.
//!
//! TOML files layered user config → project-local → environment, merged
//! field by field. See [`discovery`] for the resolution order.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
