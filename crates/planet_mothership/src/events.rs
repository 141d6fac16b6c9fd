use planet_map::{Direction, NodeId};
use planet_proto::InternalPlanetUpdate;

/// Everything that happened during one mothership tick, in the order it
/// was observed. Events are applied in the same tick they are produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateEvent {
    AddedTank {
        tank_ip: String,
        starting_node_id: NodeId,
        arrival_from: Direction,
    },
    DisconnectedTank {
        tank_ip: String,
    },
    TankConnectionLost {
        tank_ip: String,
    },
    TankPlanetUpdate(Box<InternalPlanetUpdate>),
    TankFinished {
        tank_ip: String,
    },
    TankStuck {
        tank_ip: String,
    },
}

impl UpdateEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UpdateEvent::AddedTank { .. } => "added_tank",
            UpdateEvent::DisconnectedTank { .. } => "disconnected_tank",
            UpdateEvent::TankConnectionLost { .. } => "tank_connection_lost",
            UpdateEvent::TankPlanetUpdate(_) => "tank_planet_update",
            UpdateEvent::TankFinished { .. } => "tank_finished",
            UpdateEvent::TankStuck { .. } => "tank_stuck",
        }
    }
}
