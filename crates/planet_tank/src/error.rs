use std::error::Error;
use std::fmt;

use planet_map::PlanetError;
use planet_net::LinkError;

use crate::config::ConfigError;
use crate::driver::DriverError;

#[derive(Debug, Clone, PartialEq)]
pub enum TankRobotError {
    Link(LinkError),
    Driver(DriverError),
    Planet(PlanetError),
    Config(ConfigError),
    LineFollowingTimedOut,
}

impl fmt::Display for TankRobotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TankRobotError::Link(err) => write!(f, "mothership link: {err}"),
            TankRobotError::Driver(err) => write!(f, "{err}"),
            TankRobotError::Planet(err) => write!(f, "local planet: {err}"),
            TankRobotError::Config(err) => write!(f, "config: {err}"),
            TankRobotError::LineFollowingTimedOut => {
                write!(f, "no node reached before the line-following timeout")
            }
        }
    }
}

impl Error for TankRobotError {}

impl From<LinkError> for TankRobotError {
    fn from(value: LinkError) -> Self {
        TankRobotError::Link(value)
    }
}

impl From<DriverError> for TankRobotError {
    fn from(value: DriverError) -> Self {
        TankRobotError::Driver(value)
    }
}

impl From<PlanetError> for TankRobotError {
    fn from(value: PlanetError) -> Self {
        TankRobotError::Planet(value)
    }
}

impl From<ConfigError> for TankRobotError {
    fn from(value: ConfigError) -> Self {
        TankRobotError::Config(value)
    }
}
