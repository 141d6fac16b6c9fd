//! Tank side of planet exploration: the local planet, path choice and the
//! state machine that talks to the mothership between drives.

pub mod config;
mod driver;
mod error;
mod explorer;
mod robot;


pub use config::{ConfigError, TankConfig};
pub use driver::{DriverError, FollowOutcome, InstantDriver, MotionDriver, ScriptedDriver};
pub use error::TankRobotError;
pub use explorer::Explorer;
pub use robot::{ExplorationOutcome, MothershipChannel, TankRobot, TankState};
