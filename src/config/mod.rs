//! Agent configuration.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `DEVCFG_CONFIG` environment variable (explicit path)
//! 2. `./devcfg.toml` (current directory)
//! 3. `devcfg.toml` in the platform config directory (`~/.config/devcfg/` on Linux)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Any configuration value can be overridden via environment variables.
//! The pattern is: `DEVCFG_<SECTION>_<KEY>`
//!
//! Examples:
//! - `DEVCFG_SERVER_PORT=8080`
//! - `DEVCFG_STORAGE_PATH=/data/device-config.json`
//! - `DEVCFG_RESTART_METHOD=command`
//!
//! # Example
//!
//! ```rust,no_run
//! use device_config_agent::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//!
//! println!("Listening on {}", config.server.bind_address());
//! println!("State file: {}", config.storage.state_path().display());
//! # Ok::<(), device_config_agent::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, DeviceIdentityConfig, LogFormat, LoggingConfig, RestartConfig, RestartMethod,
    ServerConfig, StorageConfig, ValidationConfig, DEFAULT_STATE_FILE,
};
