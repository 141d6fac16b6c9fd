use serde::{Deserialize, Serialize};

use planet_map::{Direction, NodeId};

/// The mothership's record of where the tank is and where it is headed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TankEntity {
    pub tank_id: String,
    pub cur_node_id: NodeId,
    pub facing_direction: Direction,
    /// Direction of the last approved departure.
    pub departure_direction: Direction,
    pub reached_first_node: bool,
    pub returning_from_blocked: bool,
}

impl TankEntity {
    /// A tank placed at `starting_node_id` as if it had just driven in
    /// through the node's `arrival_from` exit.
    pub fn new(
        tank_id: impl Into<String>,
        starting_node_id: impl Into<NodeId>,
        arrival_from: Direction,
    ) -> Self {
        Self {
            tank_id: tank_id.into(),
            cur_node_id: starting_node_id.into(),
            facing_direction: arrival_from.inverted(),
            departure_direction: Direction::Unknown,
            reached_first_node: false,
            returning_from_blocked: false,
        }
    }
}
