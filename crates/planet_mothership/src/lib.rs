//! Mothership side of planet exploration: the authoritative planet, the
//! tank entity and the tick loop that serves the tank.

pub mod config;
mod error;
mod events;
mod mothership;
mod state;
mod tank_entity;

#[cfg(test)]
mod tests;

pub use config::{ConfigError, MothershipConfig};
pub use error::{MothershipError, StateError};
pub use events::UpdateEvent;
pub use mothership::{Mothership, StartPosition, DEFAULT_TANK_ID};
pub use state::PlanetStateManager;
pub use tank_entity::TankEntity;
