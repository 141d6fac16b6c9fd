//! Where the mothership and tank binaries read their settings from: a
//! `config.toml` keyed by environment variable names, falling back to the
//! environment for keys the file leaves out.

use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingSource {
    table: Option<toml::Table>,
}

impl SettingSource {
    /// `./config.toml` if present, otherwise the environment alone.
    pub fn default_sources() -> Result<Self, ConfigError> {
        let config_path = Path::new(DEFAULT_CONFIG_FILE_NAME);
        if config_path.exists() {
            return Self::from_config_file(config_path);
        }
        Ok(Self::env())
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml_str(&content).map_err(|err| match err {
            ConfigError::ParseConfigFile { message, .. } => ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let table: toml::Table =
            toml::from_str(content).map_err(|err| ConfigError::ParseConfigFile {
                path: "<inline>".to_string(),
                message: err.to_string(),
            })?;
        Ok(Self { table: Some(table) })
    }

    pub fn env() -> Self {
        Self { table: None }
    }

    /// The file's value for `key`, or the environment's when the file has
    /// none. Tables and arrays in the file count as absent.
    pub fn get(&self, key: &str) -> Option<String> {
        self.table
            .as_ref()
            .and_then(|table| table.get(key))
            .and_then(toml_value_to_string)
            .or_else(|| std::env::var(key).ok())
    }
}

fn toml_value_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(value) => Some(value.clone()),
        toml::Value::Integer(value) => Some(value.to_string()),
        toml::Value::Float(value) => Some(value.to_string()),
        toml::Value::Boolean(value) => Some(value.to_string()),
        _ => None,
    }
}

/// The trimmed value for `key`; blank counts as unset.
pub fn non_empty<F>(getter: &mut F, key: &str) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    getter(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Parses `key` as `T`, returning `default` when unset. A value that fails
/// to parse or to satisfy `valid` is an error.
pub fn parse_setting<T, F>(
    getter: &mut F,
    key: &'static str,
    default: T,
    valid: impl Fn(&T) -> bool,
) -> Result<T, ConfigError>
where
    T: FromStr,
    F: FnMut(&str) -> Option<String>,
{
    match non_empty(getter, key) {
        Some(value) => value
            .parse::<T>()
            .ok()
            .filter(|parsed| valid(parsed))
            .ok_or(ConfigError::InvalidValue { key, value }),
        None => Ok(default),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
    ReadConfigFile { path: String, message: String },
    ParseConfigFile { path: String, message: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for {key}: {value}")
            }
            ConfigError::ReadConfigFile { path, message } => {
                write!(f, "read config file failed ({path}): {message}")
            }
            ConfigError::ParseConfigFile { path, message } => {
                write!(f, "parse config file failed ({path}): {message}")
            }
        }
    }
}

impl Error for ConfigError {}
