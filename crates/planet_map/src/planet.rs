//! One side's view of the world: every known node and path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path as FsPath;

use crate::direction::Direction;
use crate::error::PlanetError;
use crate::node::{EdgeSlot, Node};
use crate::path::{path_id, Path};
use crate::types::{Coord, NodeId, PathId};

/// Nodes keyed by name, paths keyed by their derived id. The agent and the
/// authority each own one; they are only reconciled through messages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "PlanetWire")]
pub struct Planet {
    nodes: BTreeMap<NodeId, Node>,
    paths: BTreeMap<PathId, Path>,
}

#[derive(Deserialize)]
struct PlanetWire {
    nodes: BTreeMap<NodeId, Node>,
    paths: BTreeMap<PathId, Path>,
}

impl TryFrom<PlanetWire> for Planet {
    type Error = PlanetError;

    fn try_from(wire: PlanetWire) -> Result<Self, Self::Error> {
        let mut planet = Planet::new();
        for (name, node) in wire.nodes {
            if name != node.name {
                return Err(PlanetError::InconsistentNode {
                    message: format!("keyed as {name}"),
                    node_id: node.name,
                });
            }
            planet.add_node(node)?;
        }
        for (name, mut path) in wire.paths {
            path.name = name;
            planet.add_path(path)?;
        }
        Ok(planet)
    }
}

impl Planet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    pub fn paths(&self) -> &BTreeMap<PathId, Path> {
        &self.paths
    }

    pub fn node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    pub fn path(&self, path_id: &str) -> Option<&Path> {
        self.paths.get(path_id)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn add_node(&mut self, node: Node) -> Result<(), PlanetError> {
        if self.nodes.contains_key(&node.name) {
            return Err(PlanetError::DuplicateNode { node_id: node.name });
        }
        self.nodes.insert(node.name.clone(), node);
        Ok(())
    }

    /// Adds a node whose `available` edges all lead somewhere unknown.
    pub fn add_node_with_unknown_paths(
        &mut self,
        name: impl Into<NodeId>,
        coord: Coord,
        available: impl IntoIterator<Item = Direction>,
    ) -> Result<(), PlanetError> {
        self.add_node(Node::with_unknown_paths(name, coord, available))
    }

    /// Adds `path` without touching the nodes' edge tables. Both endpoints
    /// must already be part of the planet.
    pub fn add_path(&mut self, path: Path) -> Result<(), PlanetError> {
        for node_id in [&path.node_a, &path.node_b] {
            if !self.nodes.contains_key(node_id.as_str()) {
                return Err(PlanetError::DanglingPath {
                    path_id: path.name.clone(),
                    node_id: node_id.clone(),
                });
            }
        }
        for direction in [path.direction_a, path.direction_b] {
            if !direction.is_cardinal() {
                return Err(PlanetError::InvalidDirection {
                    node_id: path.node_a.clone(),
                    direction,
                });
            }
        }
        if path.length.is_nan() || path.length < 0.0 {
            return Err(PlanetError::InvalidLength {
                path_id: path.name.clone(),
                length: path.length,
            });
        }
        self.paths.insert(path.name.clone(), path);
        Ok(())
    }

    /// Adds a path and records it in both endpoint nodes.
    pub fn connect(
        &mut self,
        node_a: &str,
        direction_a: Direction,
        node_b: &str,
        direction_b: Direction,
        length: f64,
    ) -> Result<PathId, PlanetError> {
        let path = Path::new(node_a, direction_a, node_b, direction_b, length);
        let id = path.name.clone();
        self.add_path(path)?;
        self.set_node_path(node_a, direction_a, &id)?;
        self.set_node_path(node_b, direction_b, &id)?;
        Ok(id)
    }

    fn set_node_path(&mut self, node_id: &str, direction: Direction, path_id: &str) -> Result<(), PlanetError> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| PlanetError::UnknownNode {
                node_id: node_id.to_string(),
            })?
            .set_path(direction, path_id)
    }

    /// The path joining the two endpoints, in either orientation.
    pub fn find_path(
        &self,
        node_a: &str,
        direction_a: Direction,
        node_b: &str,
        direction_b: Direction,
    ) -> Option<&Path> {
        self.paths
            .get(&path_id(node_a, direction_a, node_b, direction_b))
            .or_else(|| self.paths.get(&path_id(node_b, direction_b, node_a, direction_a)))
    }

    /// The path recorded in `node_id`'s edge table for `direction`.
    pub fn path_in_direction(&self, node_id: &str, direction: Direction) -> Option<&Path> {
        let path_id = self.nodes.get(node_id)?.path_id(direction)?;
        self.paths.get(path_id)
    }

    /// Marks the edge leaving `node_id` in `direction` as permanently
    /// blocked. The direction leaves the node's available set; an existing
    /// path keeps its record with infinite length, and an edge that was
    /// never confirmed is replaced by a blocked self-loop placeholder.
    pub fn block_path_in_direction(&mut self, node_id: &str, direction: Direction) -> Result<(), PlanetError> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| PlanetError::UnknownNode {
                node_id: node_id.to_string(),
            })?;
        match node.make_path_unavailable(direction)? {
            Some(path_id) => match self.paths.get_mut(&path_id) {
                Some(path) => path.block(),
                None => return Err(PlanetError::UnknownPath { path_id }),
            },
            None => {
                let placeholder = Path::blocked_placeholder(node_id, direction);
                self.paths.insert(placeholder.name.clone(), placeholder);
            }
        }
        tracing::debug!(node_id, %direction, "blocked path");
        Ok(())
    }

    /// Directions out of `node_id` the tank may currently take: available
    /// and not known to lead into a blocked path.
    pub fn open_directions(&self, node_id: &str) -> Vec<Direction> {
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };
        node.available_directions()
            .filter(|direction| match node.slot(*direction) {
                EdgeSlot::Known(path_id) => self
                    .paths
                    .get(path_id)
                    .map(|path| !path.is_blocked())
                    .unwrap_or(false),
                _ => true,
            })
            .collect()
    }

    pub fn has_unexplored_paths(&self) -> bool {
        self.nodes.values().any(Node::has_unexplored_paths)
    }

    // ========================================================================
    // JSON
    // ========================================================================

    pub fn to_json(&self) -> Result<String, PlanetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(input: &str) -> Result<Self, PlanetError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn save_json(&self, path: impl AsRef<FsPath>) -> Result<(), PlanetError> {
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<FsPath>) -> Result<Self, PlanetError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}
