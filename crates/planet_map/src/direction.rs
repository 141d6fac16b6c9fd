//! Absolute compass directions and directions relative to a facing.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Absolute direction
// ============================================================================

/// Compass direction of an edge slot. Ordered by increasing degree, with the
/// `Unknown` sentinel last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Direction {
    North,
    East,
    South,
    West,
    #[default]
    Unknown,
}

impl Direction {
    pub const CARDINALS: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// The four real directions ordered by degree: N, E, S, W.
    pub fn cardinals() -> [Direction; 4] {
        Self::CARDINALS
    }

    pub fn degrees(self) -> Option<i32> {
        match self {
            Direction::North => Some(0),
            Direction::East => Some(90),
            Direction::South => Some(180),
            Direction::West => Some(270),
            Direction::Unknown => None,
        }
    }

    fn from_degrees(degrees: i32) -> Direction {
        match degrees.rem_euclid(360) {
            0 => Direction::North,
            90 => Direction::East,
            180 => Direction::South,
            270 => Direction::West,
            _ => Direction::Unknown,
        }
    }

    /// Slot index in a node's fixed four-entry edge table.
    pub fn index(self) -> Option<usize> {
        self.degrees().map(|degrees| (degrees / 90) as usize)
    }

    pub fn is_cardinal(self) -> bool {
        self != Direction::Unknown
    }

    /// Rotates clockwise by `rot_angle_deg`. Anything that is not a multiple
    /// of 90 degrees, or a rotation of `Unknown`, yields `Unknown`.
    pub fn rotated(self, rot_angle_deg: i32) -> Direction {
        let Some(degrees) = self.degrees() else {
            return Direction::Unknown;
        };
        if rot_angle_deg % 90 != 0 {
            return Direction::Unknown;
        }
        Self::from_degrees(degrees + rot_angle_deg)
    }

    pub fn inverted(self) -> Direction {
        self.rotated(180)
    }

    pub fn is_inverse_of(self, other: Direction) -> bool {
        self.is_cardinal() && self.inverted() == other
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            Direction::North => "N",
            Direction::East => "E",
            Direction::South => "S",
            Direction::West => "W",
            Direction::Unknown => "U",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::North => "NORTH",
            Direction::East => "EAST",
            Direction::South => "SOUTH",
            Direction::West => "WEST",
            Direction::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectionParseError {
    pub value: String,
}

impl fmt::Display for DirectionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a direction: {:?}", self.value)
    }
}

impl std::error::Error for DirectionParseError {}

impl FromStr for Direction {
    type Err = DirectionParseError;

    /// Accepts full names and single-letter abbreviations, case-insensitively.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NORTH" | "N" => Ok(Direction::North),
            "EAST" | "E" => Ok(Direction::East),
            "SOUTH" | "S" => Ok(Direction::South),
            "WEST" | "W" => Ok(Direction::West),
            "UNKNOWN" | "U" => Ok(Direction::Unknown),
            _ => Err(DirectionParseError {
                value: value.to_string(),
            }),
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

struct DirectionVisitor;

impl<'de> Visitor<'de> for DirectionVisitor {
    type Value = Direction;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a direction name or abbreviation")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Direction, E> {
        value.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Direction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(DirectionVisitor)
    }
}

/// Serde adapter writing a direction as its single-letter abbreviation.
/// Parsing accepts both forms.
pub mod abbreviated {
    use super::{Direction, DirectionVisitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(direction: &Direction, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(direction.abbreviation())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Direction, D::Error> {
        deserializer.deserialize_str(DirectionVisitor)
    }
}

// ============================================================================
// Relative direction
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelativeDirection {
    Ahead,
    Right,
    Behind,
    Left,
    Unknown,
}

impl RelativeDirection {
    fn quarter_turns(self) -> Option<i32> {
        match self {
            RelativeDirection::Ahead => Some(0),
            RelativeDirection::Right => Some(1),
            RelativeDirection::Behind => Some(2),
            RelativeDirection::Left => Some(3),
            RelativeDirection::Unknown => None,
        }
    }

    /// Where `target` lies as seen from `facing`.
    /// Example: facing NORTH, target EAST => RIGHT.
    pub fn from_absolute(facing: Direction, target: Direction) -> RelativeDirection {
        let (Some(facing_deg), Some(target_deg)) = (facing.degrees(), target.degrees()) else {
            return RelativeDirection::Unknown;
        };
        match ((target_deg - facing_deg) / 90).rem_euclid(4) {
            0 => RelativeDirection::Ahead,
            1 => RelativeDirection::Right,
            2 => RelativeDirection::Behind,
            _ => RelativeDirection::Left,
        }
    }

    /// Example: facing NORTH, RIGHT => EAST.
    pub fn absolute_direction(self, facing: Direction) -> Direction {
        match self.quarter_turns() {
            Some(turns) => facing.rotated(turns * 90),
            None => Direction::Unknown,
        }
    }
}
