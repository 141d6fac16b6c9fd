use std::fmt;
use std::io;

use crate::direction::Direction;
use crate::types::{NodeId, PathId};

#[derive(Debug, Clone, PartialEq)]
pub enum PlanetError {
    UnknownNode { node_id: NodeId },
    DuplicateNode { node_id: NodeId },
    DanglingPath { path_id: PathId, node_id: NodeId },
    UnknownPath { path_id: PathId },
    InvalidLength { path_id: PathId, length: f64 },
    InvalidDirection { node_id: NodeId, direction: Direction },
    PathUnavailable { node_id: NodeId, direction: Direction },
    NoPathInDirection { node_id: NodeId, direction: Direction },
    InconsistentNode { node_id: NodeId, message: String },
    Io(String),
    Serde(String),
}

impl fmt::Display for PlanetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanetError::UnknownNode { node_id } => write!(f, "unknown node {node_id}"),
            PlanetError::DuplicateNode { node_id } => write!(f, "node {node_id} already exists"),
            PlanetError::DanglingPath { path_id, node_id } => {
                write!(f, "cannot add path {path_id} with unknown node {node_id}")
            }
            PlanetError::UnknownPath { path_id } => write!(f, "unknown path {path_id}"),
            PlanetError::InvalidLength { path_id, length } => {
                write!(f, "path {path_id} has invalid length {length}")
            }
            PlanetError::InvalidDirection { node_id, direction } => {
                write!(f, "node {node_id} cannot have a path in direction {direction}")
            }
            PlanetError::PathUnavailable { node_id, direction } => {
                write!(f, "node {node_id} has no available path {direction}")
            }
            PlanetError::NoPathInDirection { node_id, direction } => {
                write!(f, "node {node_id} has no known path {direction}")
            }
            PlanetError::InconsistentNode { node_id, message } => {
                write!(f, "node {node_id} is inconsistent: {message}")
            }
            PlanetError::Io(message) => write!(f, "io error: {message}"),
            PlanetError::Serde(message) => write!(f, "serde error: {message}"),
        }
    }
}

impl std::error::Error for PlanetError {}

impl From<io::Error> for PlanetError {
    fn from(err: io::Error) -> Self {
        PlanetError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for PlanetError {
    fn from(err: serde_json::Error) -> Self {
        PlanetError::Serde(err.to_string())
    }
}
