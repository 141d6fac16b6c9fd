//! The tank's local view of the planet and the choice of where to go next.

use std::collections::BTreeSet;

use planet_map::{
    Coord, Direction, Node, NodeId, Planet, PlanetError, Route, DEFAULT_PATH_LENGTH,
};
use planet_proto::{InternalPlanetUpdate, NodeArrivalInfo};

#[derive(Debug, Clone, Default)]
pub struct Explorer {
    planet: Planet,
    cur_node_id: Option<NodeId>,
    cur_node_coord: Coord,
    facing_direction: Direction,
    last_departure_direction: Direction,
    next_departure_direction: Direction,
    reached_first_node: bool,
    target_node_id: Option<NodeId>,
    target_route: Option<Route>,
    returned_from_path_blocked: bool,
}

impl Explorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planet(&self) -> &Planet {
        &self.planet
    }

    pub fn cur_node_id(&self) -> Option<&str> {
        self.cur_node_id.as_deref()
    }

    pub fn cur_node_coord(&self) -> Coord {
        self.cur_node_coord
    }

    pub fn facing_direction(&self) -> Direction {
        self.facing_direction
    }

    pub fn last_departure_direction(&self) -> Direction {
        self.last_departure_direction
    }

    pub fn next_departure_direction(&self) -> Direction {
        self.next_departure_direction
    }

    pub fn target_node_id(&self) -> Option<&str> {
        self.target_node_id.as_deref()
    }

    pub fn target_route(&self) -> Option<&Route> {
        self.target_route.as_ref()
    }

    pub fn returned_from_path_blocked(&self) -> bool {
        self.returned_from_path_blocked
    }

    /// The path the tank is on turned out to be blocked; it will drive back
    /// to the node it left.
    pub fn mark_path_blocked(&mut self) {
        self.returned_from_path_blocked = true;
    }

    pub fn set_next_departure(&mut self, direction: Direction) {
        self.next_departure_direction = direction;
    }

    /// Commits the approved departure and returns its direction.
    pub fn depart(&mut self) -> Direction {
        self.last_departure_direction = self.next_departure_direction;
        self.next_departure_direction = Direction::Unknown;
        self.last_departure_direction
    }

    /// Folds the mothership's description of the node just reached into the
    /// local planet, recording the path that led here.
    pub fn handle_arrival_response(&mut self, info: &NodeArrivalInfo) -> Result<(), PlanetError> {
        self.facing_direction = info.facing_direction;
        let available: BTreeSet<Direction> = info
            .available_paths
            .iter()
            .copied()
            .filter(|direction| direction.is_cardinal())
            .collect();
        let prev_node_id = self.cur_node_id.replace(info.node_id.clone());
        self.cur_node_coord = info.node_coord;
        tracing::info!(
            node_id = %info.node_id,
            facing = %self.facing_direction,
            available = ?available,
            "arrived at node"
        );

        if self.planet.contains_node(&info.node_id) {
            self.reconcile_available(&info.node_id, &available)?;
        } else {
            self.planet.add_node_with_unknown_paths(
                info.node_id.clone(),
                info.node_coord,
                available.iter().copied(),
            )?;
        }

        if !self.reached_first_node {
            self.reached_first_node = true;
            return Ok(());
        }

        if self.returned_from_path_blocked {
            self.returned_from_path_blocked = false;
            let blocked = self.last_departure_direction;
            let still_open = self
                .planet
                .node(&info.node_id)
                .is_some_and(|node| node.is_available(blocked));
            if still_open {
                self.planet.block_path_in_direction(&info.node_id, blocked)?;
            }
            tracing::info!(node_id = %info.node_id, direction = %blocked, "back from blocked path");
            return Ok(());
        }

        let Some(prev_node_id) = prev_node_id else {
            return Ok(());
        };
        let departure = self.last_departure_direction;
        let arrival = self.facing_direction.inverted();
        if self
            .planet
            .find_path(&prev_node_id, departure, &info.node_id, arrival)
            .is_none()
        {
            let path_id = self.planet.connect(
                &prev_node_id,
                departure,
                &info.node_id,
                arrival,
                DEFAULT_PATH_LENGTH,
            )?;
            tracing::info!(%path_id, "added path to local planet");
        }
        Ok(())
    }

    /// Brings a known node's available set in line with what the mothership
    /// reports now.
    fn reconcile_available(
        &mut self,
        node_id: &str,
        available: &BTreeSet<Direction>,
    ) -> Result<(), PlanetError> {
        let Some(node) = self.planet.node(node_id) else {
            return Ok(());
        };
        let vanished: Vec<Direction> = node
            .available_directions()
            .filter(|direction| !available.contains(direction))
            .collect();
        for direction in vanished {
            self.planet.block_path_in_direction(node_id, direction)?;
        }
        if let Some(node) = self.planet.node_mut(node_id) {
            for direction in available {
                if !node.is_available(*direction) {
                    node.mark_available(*direction);
                }
            }
        }
        Ok(())
    }

    /// Picks the next direction to request, never one in `rejected`.
    /// `Direction::Unknown` means there is nothing left to try.
    pub fn choose_path(&mut self, rejected: &BTreeSet<Direction>) -> Direction {
        if self.target_route.is_none() {
            self.choose_path_no_route(rejected)
        } else {
            self.choose_path_with_route(rejected)
        }
    }

    fn choose_path_no_route(&mut self, rejected: &BTreeSet<Direction>) -> Direction {
        let Some(cur_node_id) = self.cur_node_id.clone() else {
            return Direction::Unknown;
        };
        let Some(cur_node) = self.planet.node(&cur_node_id) else {
            return Direction::Unknown;
        };

        // Unexplored edges at the current node come first.
        if let Some(direction) = cur_node
            .unexplored_directions()
            .find(|direction| !rejected.contains(direction))
        {
            return direction;
        }

        let mut routes = self.planet.shortest_routes_from(&cur_node_id);
        let mut closest: Option<(f64, &NodeId)> = None;
        for (node_id, route) in &routes {
            if *node_id == cur_node_id
                || !self
                    .planet
                    .node(node_id)
                    .is_some_and(Node::has_unexplored_paths)
            {
                continue;
            }
            let Some(first_hop) = self.first_hop_direction(&cur_node_id, route) else {
                continue;
            };
            if rejected.contains(&first_hop) {
                continue;
            }
            if closest.map_or(true, |(length, _)| route.length < length) {
                closest = Some((route.length, node_id));
            }
        }

        let Some(target_node_id) = closest.map(|(_, node_id)| node_id.clone()) else {
            return Direction::Unknown;
        };
        tracing::info!(target = %target_node_id, "heading for node with unexplored paths");
        self.target_route = routes.remove(&target_node_id);
        self.target_node_id = Some(target_node_id);
        self.choose_path_with_route(rejected)
    }

    fn choose_path_with_route(&mut self, rejected: &BTreeSet<Direction>) -> Direction {
        if self.target_node_id == self.cur_node_id {
            self.clear_target();
            return self.choose_path_no_route(rejected);
        }
        let next = match (&self.cur_node_id, &self.target_route) {
            (Some(cur_node_id), Some(route)) => self.first_hop_direction(cur_node_id, route),
            _ => None,
        };
        match next {
            Some(direction) if !rejected.contains(&direction) => direction,
            _ => {
                tracing::debug!("abandoning target route");
                self.clear_target();
                self.choose_path_no_route(rejected)
            }
        }
    }

    /// Direction out of `node_id` along the route's next hop, without
    /// consuming it.
    fn first_hop_direction(&self, node_id: &str, route: &Route) -> Option<Direction> {
        let path = self.planet.path(route.next_path_id()?)?;
        path.direction_at(node_id)
    }

    fn clear_target(&mut self) {
        self.target_node_id = None;
        self.target_route = None;
    }

    /// Drops the hop that the approved departure is about to take.
    pub fn pop_route_hop(&mut self) {
        if let Some(route) = self.target_route.as_mut() {
            route.pop_next();
        }
    }

    /// True once no known node has an available edge with an unknown
    /// destination. Nodes only the mothership knows about do not count.
    pub fn finished_exploring(&self) -> bool {
        !self.planet.has_unexplored_paths()
    }

    pub fn internal_planet_update(&self, depart_dir: Direction) -> InternalPlanetUpdate {
        InternalPlanetUpdate {
            planet: self.planet.clone(),
            cur_node: self.cur_node_id.clone().unwrap_or_default(),
            target_node: self.target_node_id.clone(),
            target_route: self.target_route.clone(),
            depart_dir,
        }
    }
}
