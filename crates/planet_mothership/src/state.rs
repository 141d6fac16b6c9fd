use planet_map::{Direction, NodeId, Planet, PlanetError};
use planet_proto::{NodeArrivalInfo, RequestResponse};

use crate::error::StateError;
use crate::tank_entity::TankEntity;

/// Owns the authoritative planet and the tank entity, and arbitrates every
/// move the tank asks for.
#[derive(Debug, Default)]
pub struct PlanetStateManager {
    planet: Option<Planet>,
    tank: Option<TankEntity>,
}

impl PlanetStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_planet(&mut self, planet: Planet) {
        tracing::info!(
            nodes = planet.nodes().len(),
            paths = planet.paths().len(),
            "planet loaded"
        );
        self.planet = Some(planet);
    }

    pub fn planet(&self) -> Option<&Planet> {
        self.planet.as_ref()
    }

    pub fn tank(&self) -> Option<&TankEntity> {
        self.tank.as_ref()
    }

    pub fn set_tank_entity(&mut self, tank: TankEntity) -> Result<(), StateError> {
        let planet = self.planet.as_ref().ok_or(StateError::NoPlanet)?;
        if !planet.contains_node(&tank.cur_node_id) {
            return Err(StateError::UnknownStartNode {
                node_id: tank.cur_node_id,
            });
        }
        tracing::info!(
            tank_id = %tank.tank_id,
            node_id = %tank.cur_node_id,
            facing = %tank.facing_direction,
            "tank registered"
        );
        self.tank = Some(tank);
        Ok(())
    }

    pub fn remove_tank(&mut self) -> Option<TankEntity> {
        let removed = self.tank.take();
        if let Some(tank) = &removed {
            tracing::info!(tank_id = %tank.tank_id, "tank removed");
        }
        removed
    }

    /// Advances the tank after it reports reaching a node.
    pub fn on_tank_arrival(&mut self) -> Result<(), StateError> {
        let planet = self.planet.as_ref().ok_or(StateError::NoPlanet)?;
        let tank = self.tank.as_mut().ok_or(StateError::NoTank)?;

        if !tank.reached_first_node {
            tank.reached_first_node = true;
            tracing::info!(node_id = %tank.cur_node_id, "tank reached its first node");
            return Ok(());
        }

        if tank.returning_from_blocked {
            tank.returning_from_blocked = false;
            // The tank left facing its departure direction and drove back.
            tank.facing_direction = tank.departure_direction.inverted();
            tank.departure_direction = Direction::Unknown;
            tracing::info!(
                node_id = %tank.cur_node_id,
                facing = %tank.facing_direction,
                "tank returned from blocked path"
            );
            return Ok(());
        }

        if !tank.departure_direction.is_cardinal() {
            return Err(StateError::NoDeparture {
                node_id: tank.cur_node_id.clone(),
            });
        }
        let (next_node, entry_direction) =
            far_endpoint(planet, &tank.cur_node_id, tank.departure_direction)?;
        tank.cur_node_id = next_node;
        tank.facing_direction = entry_direction.inverted();
        tank.departure_direction = Direction::Unknown;
        tracing::info!(
            node_id = %tank.cur_node_id,
            facing = %tank.facing_direction,
            "tank arrived"
        );
        Ok(())
    }

    /// Ground truth about the tank's current node.
    pub fn tank_arrival_response(&self) -> Result<NodeArrivalInfo, StateError> {
        let planet = self.planet.as_ref().ok_or(StateError::NoPlanet)?;
        let tank = self.tank.as_ref().ok_or(StateError::NoTank)?;
        let node = planet
            .node(&tank.cur_node_id)
            .ok_or_else(|| PlanetError::UnknownNode {
                node_id: tank.cur_node_id.clone(),
            })?;
        Ok(NodeArrivalInfo {
            node_id: node.name.clone(),
            node_coord: node.coord,
            facing_direction: tank.facing_direction,
            available_paths: planet.open_directions(&tank.cur_node_id),
        })
    }

    /// Approves `direction` iff it names a known, unblocked path out of the
    /// tank's node, and records it as the pending departure.
    pub fn tank_path_chosen_response(
        &mut self,
        direction: Direction,
    ) -> Result<RequestResponse, StateError> {
        let planet = self.planet.as_ref().ok_or(StateError::NoPlanet)?;
        let tank = self.tank.as_mut().ok_or(StateError::NoTank)?;

        let response = match planet.path_in_direction(&tank.cur_node_id, direction) {
            _ if !direction.is_cardinal() => {
                RequestResponse::deny(format!("{direction} is not a valid departure direction"))
            }
            None => RequestResponse::deny(format!(
                "there is no known path {direction} of {}",
                tank.cur_node_id
            )),
            Some(path) if path.is_blocked() => {
                RequestResponse::deny(format!("path {} is blocked", path.name))
            }
            Some(path) => {
                tank.departure_direction = direction;
                RequestResponse::approve(format!(
                    "{} may take path {}",
                    tank.tank_id, path.name
                ))
            }
        };
        tracing::info!(
            node_id = %tank.cur_node_id,
            %direction,
            approved = response.is_approved,
            message = %response.message,
            "path choice arbitrated"
        );
        Ok(response)
    }

    /// The tank hit an obstacle after its last approved departure: block
    /// that edge and expect the tank back at the same node.
    pub fn handle_tank_path_blocked(&mut self) -> Result<(), StateError> {
        let planet = self.planet.as_mut().ok_or(StateError::NoPlanet)?;
        let tank = self.tank.as_mut().ok_or(StateError::NoTank)?;
        if !tank.departure_direction.is_cardinal() {
            return Err(StateError::NoDeparture {
                node_id: tank.cur_node_id.clone(),
            });
        }
        tank.returning_from_blocked = true;
        planet.block_path_in_direction(&tank.cur_node_id, tank.departure_direction)?;
        tracing::warn!(
            node_id = %tank.cur_node_id,
            direction = %tank.departure_direction,
            "path blocked"
        );
        Ok(())
    }
}

/// The node reached by leaving `node_id` in `direction`, and the direction
/// the tank enters it through.
fn far_endpoint(
    planet: &Planet,
    node_id: &str,
    direction: Direction,
) -> Result<(NodeId, Direction), StateError> {
    let path = planet
        .path_in_direction(node_id, direction)
        .ok_or_else(|| PlanetError::NoPathInDirection {
            node_id: node_id.to_string(),
            direction,
        })?;
    if path.node_a == node_id && path.direction_a == direction {
        Ok((path.node_b.clone(), path.direction_b))
    } else {
        Ok((path.node_a.clone(), path.direction_a))
    }
}
