//! Weighted edges between two (node, direction) endpoints.

use serde::{Deserialize, Serialize};

use crate::direction::Direction;
use crate::types::{NodeId, PathId, DEFAULT_PATH_LENGTH};

/// `"<node>:<abbr>"`, e.g. `"A:E"`.
pub fn endpoint_label(node_id: &str, direction: Direction) -> String {
    format!("{node_id}:{}", direction.abbreviation())
}

/// Deterministic id of the path from `(node_a, direction_a)` to
/// `(node_b, direction_b)`, e.g. `"A:E-B:W"`.
pub fn path_id(node_a: &str, direction_a: Direction, node_b: &str, direction_b: Direction) -> PathId {
    format!(
        "{}-{}",
        endpoint_label(node_a, direction_a),
        endpoint_label(node_b, direction_b)
    )
}

fn default_length() -> f64 {
    DEFAULT_PATH_LENGTH
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub name: PathId,
    pub node_a: NodeId,
    pub direction_a: Direction,
    pub node_b: NodeId,
    pub direction_b: Direction,
    /// Infinite once the path is blocked.
    #[serde(default = "default_length", with = "length_serde")]
    pub length: f64,
}

impl Path {
    pub fn new(
        node_a: impl Into<NodeId>,
        direction_a: Direction,
        node_b: impl Into<NodeId>,
        direction_b: Direction,
        length: f64,
    ) -> Self {
        let node_a = node_a.into();
        let node_b = node_b.into();
        Self {
            name: path_id(&node_a, direction_a, &node_b, direction_b),
            node_a,
            direction_a,
            node_b,
            direction_b,
            length,
        }
    }

    /// Stand-in for an edge that was blocked before its far end was ever
    /// confirmed: a self-loop that can never be traversed.
    pub fn blocked_placeholder(node_id: impl Into<NodeId>, direction: Direction) -> Self {
        let node_id = node_id.into();
        Self::new(node_id.clone(), direction, node_id, direction, f64::INFINITY)
    }

    pub fn is_blocked(&self) -> bool {
        !self.length.is_finite()
    }

    pub fn is_self_loop(&self) -> bool {
        self.node_a == self.node_b
    }

    pub fn block(&mut self) {
        self.length = f64::INFINITY;
    }

    /// The direction this path leaves `node_id` by.
    pub fn direction_at(&self, node_id: &str) -> Option<Direction> {
        if self.node_a == node_id {
            Some(self.direction_a)
        } else if self.node_b == node_id {
            Some(self.direction_b)
        } else {
            None
        }
    }

    /// The endpoint opposite to the one at `node_id`.
    pub fn other_end(&self, node_id: &str) -> Option<(&str, Direction)> {
        if self.node_a == node_id {
            Some((&self.node_b, self.direction_b))
        } else if self.node_b == node_id {
            Some((&self.node_a, self.direction_a))
        } else {
            None
        }
    }

    pub fn connects(&self, node_a: &str, direction_a: Direction, node_b: &str, direction_b: Direction) -> bool {
        (self.node_a == node_a
            && self.direction_a == direction_a
            && self.node_b == node_b
            && self.direction_b == direction_b)
            || (self.node_a == node_b
                && self.direction_a == direction_b
                && self.node_b == node_a
                && self.direction_b == direction_a)
    }
}

/// JSON has no infinity literal: blocked lengths are written as `"inf"` and
/// a number, `"inf"`, `"Infinity"` or `null` are accepted on read.
mod length_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum LengthRepr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(length: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if length.is_finite() {
            serializer.serialize_f64(*length)
        } else {
            serializer.serialize_str("inf")
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Option::<LengthRepr>::deserialize(deserializer)? {
            None => Ok(f64::INFINITY),
            Some(LengthRepr::Number(length)) => Ok(length),
            Some(LengthRepr::Text(text)) => match text.to_ascii_lowercase().as_str() {
                "inf" | "infinity" => Ok(f64::INFINITY),
                _ => Err(D::Error::custom(format!("invalid path length {text:?}"))),
            },
        }
    }
}
