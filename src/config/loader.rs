//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat, RestartMethod};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "DEVCFG";

/// Config file name
const CONFIG_FILE_NAME: &str = "devcfg.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "DEVCFG_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `DEVCFG_CONFIG` environment variable (explicit path)
    /// 2. `./devcfg.toml` (current directory)
    /// 3. `devcfg.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables can override any config file values. The result
    /// is not validated; callers apply their own overrides (CLI flags) and
    /// then call [`Config::validate`] once.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path. Like [`ConfigLoader::load`],
    /// this does not validate.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. Platform config directory
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    // 4. No config file found - will use defaults
    None
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(key: &str) -> Option<(String, String)> {
    let name = format!("{ENV_PREFIX}_{key}");
    std::env::var(&name).ok().map(|val| (name, val))
}

fn parse_env<T: FromStr>(name: &str, val: &str, what: &str) -> ConfigResult<T> {
    val.trim()
        .parse()
        .map_err(|_| ConfigError::env_parse(name, format!("Invalid {what}")))
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `DEVCFG_<SECTION>_<KEY>`
/// For example:
/// - `DEVCFG_SERVER_PORT=8080`
/// - `DEVCFG_STORAGE_PATH=/data/device.json`
/// - `DEVCFG_RESTART_COMMAND="systemctl reboot"`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Server overrides
    if let Some((_, val)) = env_var("SERVER_HOST") {
        config.server.host = val;
    }
    if let Some((name, val)) = env_var("SERVER_PORT") {
        config.server.port = parse_env(&name, &val, "port number")?;
    }
    if let Some((_, val)) = env_var("SERVER_LOG_LEVEL") {
        config.server.log_level = val;
    }

    // Storage / device
    if let Some((_, val)) = env_var("STORAGE_PATH") {
        config.storage.path = Some(PathBuf::from(val));
    }
    if let Some((_, val)) = env_var("DEVICE_MAC") {
        config.device.mac = val;
    }

    // Validation
    if let Some((name, val)) = env_var("VALIDATION_ALLOW_PRIVILEGED_PORTS") {
        config.validation.allow_privileged_ports = parse_env(&name, &val, "boolean")?;
    }
    if let Some((name, val)) = env_var("VALIDATION_MAX_DEVICE_ID") {
        config.validation.max_device_id = parse_env(&name, &val, "device id")?;
    }

    // Restart
    if let Some((name, val)) = env_var("RESTART_METHOD") {
        config.restart.method = match val.trim().to_ascii_lowercase().as_str() {
            "exit" => RestartMethod::Exit,
            "command" => RestartMethod::Command,
            _ => return Err(ConfigError::env_parse(name, "expected 'exit' or 'command'")),
        };
    }
    if let Some((_, val)) = env_var("RESTART_COMMAND") {
        config.restart.command = val.split_whitespace().map(str::to_string).collect();
    }
    if let Some((name, val)) = env_var("RESTART_DRAIN_DELAY_MS") {
        config.restart.drain_delay_ms = parse_env(&name, &val, "duration")?;
    }
    if let Some((name, val)) = env_var("RESTART_TIMEOUT_SECS") {
        config.restart.restart_timeout_secs = parse_env(&name, &val, "duration")?;
    }

    // Logging
    if let Some((name, val)) = env_var("LOGGING_FORMAT") {
        config.logging.format =
            LogFormat::from_str(&val).map_err(|msg| ConfigError::env_parse(name, msg))?;
    }

    Ok(())
}

/// Get the default config directory for creating new config files.
pub fn get_default_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "devcfg").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}
