use std::error::Error;
use std::fmt;

use planet_map::{NodeId, PlanetError};
use planet_net::LinkError;

use crate::config::ConfigError;

/// Topology conflicts and missing state in the planet state manager.
#[derive(Debug, Clone, PartialEq)]
pub enum StateError {
    NoPlanet,
    NoTank,
    UnknownStartNode { node_id: NodeId },
    NoDeparture { node_id: NodeId },
    Planet(PlanetError),
}

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateError::NoPlanet => write!(f, "no planet loaded"),
            StateError::NoTank => write!(f, "no tank registered"),
            StateError::UnknownStartNode { node_id } => {
                write!(f, "start node {node_id} is not on the planet")
            }
            StateError::NoDeparture { node_id } => {
                write!(f, "tank has no approved departure from {node_id}")
            }
            StateError::Planet(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StateError {}

impl From<PlanetError> for StateError {
    fn from(err: PlanetError) -> Self {
        StateError::Planet(err)
    }
}

#[derive(Debug)]
pub enum MothershipError {
    Link(LinkError),
    State(StateError),
    Config(ConfigError),
    Planet(PlanetError),
}

impl fmt::Display for MothershipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MothershipError::Link(err) => write!(f, "link error: {err}"),
            MothershipError::State(err) => write!(f, "state error: {err}"),
            MothershipError::Config(err) => write!(f, "config error: {err}"),
            MothershipError::Planet(err) => write!(f, "planet error: {err}"),
        }
    }
}

impl Error for MothershipError {}

impl From<LinkError> for MothershipError {
    fn from(err: LinkError) -> Self {
        MothershipError::Link(err)
    }
}

impl From<StateError> for MothershipError {
    fn from(err: StateError) -> Self {
        MothershipError::State(err)
    }
}

impl From<ConfigError> for MothershipError {
    fn from(err: ConfigError) -> Self {
        MothershipError::Config(err)
    }
}

impl From<PlanetError> for MothershipError {
    fn from(err: PlanetError) -> Self {
        MothershipError::Planet(err)
    }
}
