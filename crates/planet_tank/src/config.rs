//! Tank settings. Same sources as the mothership: `config.toml` keyed by
//! environment variable names, then the environment, then defaults.

use std::path::Path;
use std::time::Duration;

use planet_net::settings::{non_empty, parse_setting, SettingSource};
use planet_net::MothershipClientConfig;

pub use planet_net::ConfigError;

pub const ENV_MOTHERSHIP_IP: &str = "TANK_MOTHERSHIP_IP";
pub const ENV_MOTHERSHIP_PORT: &str = "TANK_MOTHERSHIP_PORT";
pub const ENV_RETRY_INTERVAL_MS: &str = "TANK_RETRY_INTERVAL_MS";
pub const ENV_MAX_CONNECT_ATTEMPTS: &str = "TANK_MAX_CONNECT_ATTEMPTS";
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "TANK_HANDSHAKE_TIMEOUT_MS";
pub const ENV_RESPONSE_TIMEOUT_MS: &str = "TANK_RESPONSE_TIMEOUT_MS";

pub const DEFAULT_MOTHERSHIP_IP: &str = "127.0.0.1";
pub const DEFAULT_MOTHERSHIP_PORT: u16 = 65432;
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 500;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TankConfig {
    pub mothership_ip: String,
    pub mothership_port: u16,
    pub retry_interval_ms: u64,
    /// Zero retries forever.
    pub max_connect_attempts: u32,
    pub handshake_timeout_ms: u64,
    /// Zero waits forever.
    pub response_timeout_ms: u64,
}

impl Default for TankConfig {
    fn default() -> Self {
        Self {
            mothership_ip: DEFAULT_MOTHERSHIP_IP.to_string(),
            mothership_port: DEFAULT_MOTHERSHIP_PORT,
            retry_interval_ms: DEFAULT_RETRY_INTERVAL_MS,
            max_connect_attempts: 0,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            response_timeout_ms: 0,
        }
    }
}

impl TankConfig {
    pub fn from_default_sources() -> Result<Self, ConfigError> {
        let source = SettingSource::default_sources()?;
        Self::from_env_with(|key| source.get(key))
    }

    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let source = SettingSource::from_config_file(path)?;
        Self::from_env_with(|key| source.get(key))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mothership_ip = non_empty(&mut getter, ENV_MOTHERSHIP_IP)
            .unwrap_or_else(|| DEFAULT_MOTHERSHIP_IP.to_string());
        let mothership_port = parse_setting(
            &mut getter,
            ENV_MOTHERSHIP_PORT,
            DEFAULT_MOTHERSHIP_PORT,
            |port: &u16| *port > 0,
        )?;
        let retry_interval_ms =
            parse_setting(&mut getter, ENV_RETRY_INTERVAL_MS, DEFAULT_RETRY_INTERVAL_MS, any)?.max(1);
        let max_connect_attempts = parse_setting(&mut getter, ENV_MAX_CONNECT_ATTEMPTS, 0_u32, any)?;
        let handshake_timeout_ms = parse_setting(
            &mut getter,
            ENV_HANDSHAKE_TIMEOUT_MS,
            DEFAULT_HANDSHAKE_TIMEOUT_MS,
            any,
        )?
        .max(1);
        let response_timeout_ms = parse_setting(&mut getter, ENV_RESPONSE_TIMEOUT_MS, 0_u64, any)?;
        Ok(Self {
            mothership_ip,
            mothership_port,
            retry_interval_ms,
            max_connect_attempts,
            handshake_timeout_ms,
            response_timeout_ms,
        })
    }

    pub fn mothership_addr(&self) -> String {
        if self.mothership_ip.contains(':') {
            format!("[{}]:{}", self.mothership_ip, self.mothership_port)
        } else {
            format!("{}:{}", self.mothership_ip, self.mothership_port)
        }
    }

    pub fn client_config(&self) -> MothershipClientConfig {
        let response_timeout =
            (self.response_timeout_ms > 0).then(|| Duration::from_millis(self.response_timeout_ms));
        MothershipClientConfig::new(self.mothership_addr())
            .with_retry_interval(Duration::from_millis(self.retry_interval_ms))
            .with_max_attempts(self.max_connect_attempts)
            .with_handshake_timeout(Duration::from_millis(self.handshake_timeout_ms))
            .with_response_timeout(response_timeout)
    }
}

fn any<T>(_: &T) -> bool {
    true
}
