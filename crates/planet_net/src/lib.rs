//! TCP transport between the mothership and a single tank.

mod client;
mod error;
pub mod settings;
mod tank_link;


pub use client::{retry_backoff, MothershipClient, MothershipClientConfig};
pub use error::LinkError;
pub use settings::{ConfigError, SettingSource};
pub use tank_link::{LinkEvent, TankLink, TankLinkConfig};
