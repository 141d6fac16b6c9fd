use serde::{Deserialize, Serialize};

use planet_map::{abbreviated, Coord, Direction, NodeId, Planet, Route};

/// Messages the tank sends to the mothership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TankMessage {
    NodeArrival,
    PathChosen { direction: Direction },
    InternalPlanet(InternalPlanetUpdate),
    FinishedExploring,
    Stuck,
    PathBlocked,
}

impl TankMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            TankMessage::NodeArrival => "node_arrival",
            TankMessage::PathChosen { .. } => "path_chosen",
            TankMessage::InternalPlanet(_) => "internal_planet",
            TankMessage::FinishedExploring => "finished_exploring",
            TankMessage::Stuck => "stuck",
            TankMessage::PathBlocked => "path_blocked",
        }
    }
}

/// Messages the mothership sends to the tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MothershipMessage {
    ArrivalResponse(NodeArrivalInfo),
    PathChosenResponse { request_response: RequestResponse },
    Start,
    Error { msg: String },
}

impl MothershipMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            MothershipMessage::ArrivalResponse(_) => "arrival_response",
            MothershipMessage::PathChosenResponse { .. } => "path_chosen_response",
            MothershipMessage::Start => "start",
            MothershipMessage::Error { .. } => "error",
        }
    }
}

/// Ground truth about the node the tank just reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeArrivalInfo {
    pub node_id: NodeId,
    pub node_coord: Coord,
    pub facing_direction: Direction,
    pub available_paths: Vec<Direction>,
}

/// Snapshot of the tank's local planet, sent after every approved choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalPlanetUpdate {
    pub planet: Planet,
    pub cur_node: NodeId,
    pub target_node: Option<NodeId>,
    pub target_route: Option<Route>,
    #[serde(with = "abbreviated")]
    pub depart_dir: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResponse {
    pub is_approved: bool,
    pub message: String,
}

impl RequestResponse {
    pub fn approve(message: impl Into<String>) -> Self {
        Self {
            is_approved: true,
            message: message.into(),
        }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self {
            is_approved: false,
            message: message.into(),
        }
    }
}
