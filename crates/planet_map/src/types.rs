use serde::{Deserialize, Serialize};

pub type NodeId = String;
pub type PathId = String;

/// Length given to paths whose real length is not known, e.g. edges the
/// tank discovers by driving them.
pub const DEFAULT_PATH_LENGTH: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}
