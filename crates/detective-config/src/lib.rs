//! Configuration system for the Detective video investigation backend.
//!
//! Provides TOML-based configuration with:
//! - Sections for the key-value store, session lifetime, uploads and analysis
//! - Config file layering (XDG user config + project-local overrides)
//! - Secret resolution (env var → config file → default)
//!
//! Components do not read this crate's types directly; the binary converts
//! each section into the owning crate's own config struct.

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    ResolvedSecret, SecretSource, redact_url, resolve_api_key, resolve_store_url,
};
pub use types::*;
