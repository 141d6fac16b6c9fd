//! Mothership settings from `config.toml` and the environment. Keys in the
//! file are the environment variable names; a key missing from the file
//! falls back to the environment, then to the default.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use planet_map::{Direction, NodeId};
use planet_net::settings::{non_empty, parse_setting, SettingSource};
use planet_net::TankLinkConfig;

pub use planet_net::ConfigError;

pub const ENV_BIND_ADDR: &str = "MOTHERSHIP_BIND_ADDR";
pub const ENV_TICK_MS: &str = "MOTHERSHIP_TICK_MS";
pub const ENV_ACCEPT_TIMEOUT_MS: &str = "MOTHERSHIP_ACCEPT_TIMEOUT_MS";
pub const ENV_RECV_TIMEOUT_MS: &str = "MOTHERSHIP_RECV_TIMEOUT_MS";
pub const ENV_HANDSHAKE_TIMEOUT_MS: &str = "MOTHERSHIP_HANDSHAKE_TIMEOUT_MS";
pub const ENV_TANK_IP: &str = "MOTHERSHIP_TANK_IP";
pub const ENV_PLANET_FILE: &str = "MOTHERSHIP_PLANET_FILE";
pub const ENV_START_NODE: &str = "MOTHERSHIP_START_NODE";
pub const ENV_ARRIVAL_FROM: &str = "MOTHERSHIP_ARRIVAL_FROM";
pub const ENV_AUTO_START: &str = "MOTHERSHIP_AUTO_START";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:65432";
pub const DEFAULT_TICK_MS: u64 = 100;
pub const DEFAULT_ACCEPT_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_RECV_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_ARRIVAL_FROM: Direction = Direction::South;

#[derive(Debug, Clone, PartialEq)]
pub struct MothershipConfig {
    pub bind_addr: String,
    pub tick_ms: u64,
    pub accept_timeout_ms: u64,
    pub recv_timeout_ms: u64,
    pub handshake_timeout_ms: u64,
    pub tank_ip: Option<IpAddr>,
    pub planet_file: Option<PathBuf>,
    pub start_node: Option<NodeId>,
    pub arrival_from: Direction,
    pub auto_start: bool,
}

impl Default for MothershipConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            tick_ms: DEFAULT_TICK_MS,
            accept_timeout_ms: DEFAULT_ACCEPT_TIMEOUT_MS,
            recv_timeout_ms: DEFAULT_RECV_TIMEOUT_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            tank_ip: None,
            planet_file: None,
            start_node: None,
            arrival_from: DEFAULT_ARRIVAL_FROM,
            auto_start: true,
        }
    }
}

impl MothershipConfig {
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
        let bind_addr = non_empty(&mut getter, ENV_BIND_ADDR)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let tick_ms = parse_setting(&mut getter, ENV_TICK_MS, DEFAULT_TICK_MS, positive)?;
        let accept_timeout_ms = parse_setting(
            &mut getter,
            ENV_ACCEPT_TIMEOUT_MS,
            DEFAULT_ACCEPT_TIMEOUT_MS,
            positive,
        )?;
        let recv_timeout_ms = parse_setting(
            &mut getter,
            ENV_RECV_TIMEOUT_MS,
            DEFAULT_RECV_TIMEOUT_MS,
            positive,
        )?;
        let handshake_timeout_ms = parse_setting(
            &mut getter,
            ENV_HANDSHAKE_TIMEOUT_MS,
            DEFAULT_HANDSHAKE_TIMEOUT_MS,
            positive,
        )?;
        let tank_ip = match non_empty(&mut getter, ENV_TANK_IP) {
            Some(value) => Some(value.parse::<IpAddr>().map_err(|_| {
                ConfigError::InvalidValue {
                    key: ENV_TANK_IP,
                    value,
                }
            })?),
            None => None,
        };
        let planet_file = non_empty(&mut getter, ENV_PLANET_FILE).map(PathBuf::from);
        let start_node = non_empty(&mut getter, ENV_START_NODE);
        let arrival_from = match non_empty(&mut getter, ENV_ARRIVAL_FROM) {
            Some(value) => value
                .parse::<Direction>()
                .ok()
                .filter(|direction| direction.is_cardinal())
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_ARRIVAL_FROM,
                    value,
                })?,
            None => DEFAULT_ARRIVAL_FROM,
        };
        let auto_start = match non_empty(&mut getter, ENV_AUTO_START) {
            Some(value) => parse_bool(&value).ok_or(ConfigError::InvalidValue {
                key: ENV_AUTO_START,
                value,
            })?,
            None => true,
        };
        Ok(Self {
            bind_addr,
            tick_ms,
            accept_timeout_ms,
            recv_timeout_ms,
            handshake_timeout_ms,
            tank_ip,
            planet_file,
            start_node,
            arrival_from,
            auto_start,
        })
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn link_config(&self) -> TankLinkConfig {
        TankLinkConfig::default()
            .with_bind_addr(self.bind_addr.clone())
            .with_accept_timeout(Duration::from_millis(self.accept_timeout_ms))
            .with_recv_timeout(Duration::from_millis(self.recv_timeout_ms))
            .with_handshake_timeout(Duration::from_millis(self.handshake_timeout_ms))
            .with_allowed_peer(self.tank_ip)
    }
}

fn positive(ms: &u64) -> bool {
    *ms > 0
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
