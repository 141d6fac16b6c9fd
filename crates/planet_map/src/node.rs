//! Planet nodes and their fixed four-slot edge tables.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::direction::Direction;
use crate::error::PlanetError;
use crate::types::{Coord, NodeId, PathId};

/// Wire marker for "edge exists but its destination is not known yet".
const UNEXPLORED_MARKER: &str = "None";

/// What is known about the edge leaving a node in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EdgeSlot {
    #[default]
    NoEdge,
    Unexplored,
    Known(PathId),
}

impl EdgeSlot {
    pub fn path_id(&self) -> Option<&str> {
        match self {
            EdgeSlot::Known(path_id) => Some(path_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "NodeWire", try_from = "NodeWire")]
pub struct Node {
    pub name: NodeId,
    pub coord: Coord,
    available_paths: BTreeSet<Direction>,
    slots: [EdgeSlot; 4],
}

impl Node {
    pub fn new(name: impl Into<NodeId>, coord: Coord) -> Self {
        Self {
            name: name.into(),
            coord,
            available_paths: BTreeSet::new(),
            slots: Default::default(),
        }
    }

    /// A node whose listed directions lead somewhere not yet known.
    pub fn with_unknown_paths(
        name: impl Into<NodeId>,
        coord: Coord,
        available: impl IntoIterator<Item = Direction>,
    ) -> Self {
        let mut node = Self::new(name, coord);
        for direction in available {
            node.mark_available(direction);
        }
        node
    }

    pub fn slot(&self, direction: Direction) -> &EdgeSlot {
        static NO_EDGE: EdgeSlot = EdgeSlot::NoEdge;
        match direction.index() {
            Some(index) => &self.slots[index],
            None => &NO_EDGE,
        }
    }

    pub fn path_id(&self, direction: Direction) -> Option<&str> {
        self.slot(direction).path_id()
    }

    pub fn is_available(&self, direction: Direction) -> bool {
        self.available_paths.contains(&direction)
    }

    pub fn available_directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.available_paths.iter().copied()
    }

    /// Marks an edge as physically present without touching a known
    /// destination. `Unknown` is ignored.
    pub fn mark_available(&mut self, direction: Direction) {
        let Some(index) = direction.index() else {
            return;
        };
        self.available_paths.insert(direction);
        if self.slots[index] == EdgeSlot::NoEdge {
            self.slots[index] = EdgeSlot::Unexplored;
        }
    }

    pub fn set_path(&mut self, direction: Direction, path_id: impl Into<PathId>) -> Result<(), PlanetError> {
        let Some(index) = direction.index() else {
            return Err(PlanetError::InvalidDirection {
                node_id: self.name.clone(),
                direction,
            });
        };
        self.slots[index] = EdgeSlot::Known(path_id.into());
        self.available_paths.insert(direction);
        Ok(())
    }

    /// Forgets the destination in `direction`; the edge stays available.
    pub fn make_path_unknown(&mut self, direction: Direction) {
        if let Some(index) = direction.index() {
            if self.available_paths.contains(&direction) {
                self.slots[index] = EdgeSlot::Unexplored;
            }
        }
    }

    /// Removes `direction` from the available set and the edge table,
    /// returning the path id that was recorded there, if any.
    pub fn make_path_unavailable(&mut self, direction: Direction) -> Result<Option<PathId>, PlanetError> {
        let index = match direction.index() {
            Some(index) if self.available_paths.remove(&direction) => index,
            _ => {
                return Err(PlanetError::PathUnavailable {
                    node_id: self.name.clone(),
                    direction,
                })
            }
        };
        let previous = std::mem::take(&mut self.slots[index]);
        Ok(match previous {
            EdgeSlot::Known(path_id) => Some(path_id),
            _ => None,
        })
    }

    pub fn unexplored_directions(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::CARDINALS
            .into_iter()
            .filter(|direction| self.is_available(*direction))
            .filter(|direction| *self.slot(*direction) == EdgeSlot::Unexplored)
    }

    pub fn has_unexplored_paths(&self) -> bool {
        self.unexplored_directions().next().is_some()
    }
}

// ============================================================================
// Wire form
// ============================================================================

/// `direction_to_path_id` omits directions without an edge and uses the
/// string `"None"` for edges whose destination is unknown.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeWire {
    name: NodeId,
    coord: Coord,
    direction_to_path_id: BTreeMap<Direction, String>,
    available_paths: Vec<Direction>,
}

impl From<Node> for NodeWire {
    fn from(node: Node) -> Self {
        let direction_to_path_id = Direction::CARDINALS
            .into_iter()
            .filter_map(|direction| match node.slot(direction) {
                EdgeSlot::NoEdge => None,
                EdgeSlot::Unexplored => Some((direction, UNEXPLORED_MARKER.to_string())),
                EdgeSlot::Known(path_id) => Some((direction, path_id.clone())),
            })
            .collect();
        NodeWire {
            available_paths: node.available_paths.iter().copied().collect(),
            name: node.name,
            coord: node.coord,
            direction_to_path_id,
        }
    }
}

impl TryFrom<NodeWire> for Node {
    type Error = PlanetError;

    fn try_from(wire: NodeWire) -> Result<Self, Self::Error> {
        let mut node = Node::new(wire.name, wire.coord);
        for direction in wire.available_paths {
            if !direction.is_cardinal() {
                return Err(PlanetError::InvalidDirection {
                    node_id: node.name,
                    direction,
                });
            }
            node.mark_available(direction);
        }
        for (direction, value) in wire.direction_to_path_id {
            if !direction.is_cardinal() {
                return Err(PlanetError::InvalidDirection {
                    node_id: node.name,
                    direction,
                });
            }
            if value == UNEXPLORED_MARKER {
                continue;
            }
            if !node.is_available(direction) {
                return Err(PlanetError::InconsistentNode {
                    message: format!("path {value} in {direction} is not an available direction"),
                    node_id: node.name,
                });
            }
            node.set_path(direction, value)?;
        }
        Ok(node)
    }
}
