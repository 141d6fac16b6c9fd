use std::collections::BTreeSet;

use planet_map::{Direction, RelativeDirection};
use planet_net::{LinkError, MothershipClient};
use planet_proto::{InternalPlanetUpdate, NodeArrivalInfo, RequestResponse};

use crate::driver::{FollowOutcome, MotionDriver};
use crate::error::TankRobotError;
use crate::explorer::Explorer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TankState {
    Initializing,
    LineFollowing,
    AtNode,
    ReadyToDepart,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplorationOutcome {
    /// Every edge the tank could reach has been driven.
    Finished,
    /// Edges remain unexplored but none can be reached.
    Stuck,
}

/// What the exploration loop needs from the mothership.
pub trait MothershipChannel {
    fn send_node_arrival(&mut self) -> Result<(), LinkError>;
    fn get_node_arrival_response(&mut self) -> Result<NodeArrivalInfo, LinkError>;
    fn send_path_chosen(&mut self, direction: Direction) -> Result<(), LinkError>;
    fn get_path_chosen_response(&mut self) -> Result<RequestResponse, LinkError>;
    fn send_internal_planet_update(&mut self, update: InternalPlanetUpdate)
        -> Result<(), LinkError>;
    fn send_path_blocked(&mut self) -> Result<(), LinkError>;
    fn send_finished_exploring(&mut self) -> Result<(), LinkError>;
    fn send_stuck(&mut self) -> Result<(), LinkError>;
}

impl MothershipChannel for MothershipClient {
    fn send_node_arrival(&mut self) -> Result<(), LinkError> {
        MothershipClient::send_node_arrival(self)
    }

    fn get_node_arrival_response(&mut self) -> Result<NodeArrivalInfo, LinkError> {
        MothershipClient::get_node_arrival_response(self)
    }

    fn send_path_chosen(&mut self, direction: Direction) -> Result<(), LinkError> {
        MothershipClient::send_path_chosen(self, direction)
    }

    fn get_path_chosen_response(&mut self) -> Result<RequestResponse, LinkError> {
        MothershipClient::get_path_chosen_response(self)
    }

    fn send_internal_planet_update(
        &mut self,
        update: InternalPlanetUpdate,
    ) -> Result<(), LinkError> {
        MothershipClient::send_internal_planet_update(self, update)
    }

    fn send_path_blocked(&mut self) -> Result<(), LinkError> {
        MothershipClient::send_path_blocked(self)
    }

    fn send_finished_exploring(&mut self) -> Result<(), LinkError> {
        MothershipClient::send_finished_exploring(self)
    }

    fn send_stuck(&mut self) -> Result<(), LinkError> {
        MothershipClient::send_stuck(self)
    }
}

/// Drives the tank from node to node, asking the mothership where it is and
/// whether it may leave.
pub struct TankRobot<C, D> {
    state: TankState,
    explorer: Explorer,
    channel: C,
    driver: D,
    outcome: Option<ExplorationOutcome>,
}

impl<C: MothershipChannel, D: MotionDriver> TankRobot<C, D> {
    pub fn new(channel: C, driver: D) -> Self {
        Self {
            state: TankState::Initializing,
            explorer: Explorer::new(),
            channel,
            driver,
            outcome: None,
        }
    }

    pub fn state(&self) -> TankState {
        self.state
    }

    pub fn explorer(&self) -> &Explorer {
        &self.explorer
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_parts(self) -> (Explorer, C, D) {
        (self.explorer, self.channel, self.driver)
    }

    /// Runs until the tank has finished or is stuck. Link, driver and
    /// topology failures end the loop early.
    pub fn core_loop(&mut self) -> Result<ExplorationOutcome, TankRobotError> {
        loop {
            match self.state {
                TankState::Initializing => self.switch_state(TankState::LineFollowing),
                TankState::LineFollowing => self.follow_line()?,
                TankState::AtNode => self.on_node()?,
                TankState::ReadyToDepart => self.depart()?,
                TankState::Finished => {
                    return Ok(self.outcome.unwrap_or(ExplorationOutcome::Stuck));
                }
            }
        }
    }

    fn switch_state(&mut self, next: TankState) {
        tracing::debug!(from = ?self.state, to = ?next, "tank state change");
        self.state = next;
    }

    fn follow_line(&mut self) -> Result<(), TankRobotError> {
        match self.driver.follow_to_next_node()? {
            FollowOutcome::ArrivedAtNode => self.switch_state(TankState::AtNode),
            FollowOutcome::PathBlocked => {
                tracing::warn!(
                    direction = %self.explorer.last_departure_direction(),
                    "path blocked, returning to node"
                );
                self.channel.send_path_blocked()?;
                self.explorer.mark_path_blocked();
            }
            FollowOutcome::TimedOut => return Err(TankRobotError::LineFollowingTimedOut),
        }
        Ok(())
    }

    fn on_node(&mut self) -> Result<(), TankRobotError> {
        self.channel.send_node_arrival()?;
        let info = self.channel.get_node_arrival_response()?;
        self.explorer.handle_arrival_response(&info)?;
        self.choose_path()
    }

    /// Proposes directions until one is approved. Each denied direction is
    /// excluded for the rest of this node visit.
    fn choose_path(&mut self) -> Result<(), TankRobotError> {
        let mut rejected = BTreeSet::new();
        loop {
            let direction = self.explorer.choose_path(&rejected);
            if direction == Direction::Unknown {
                return self.finish();
            }
            self.channel.send_path_chosen(direction)?;
            let response = self.channel.get_path_chosen_response()?;
            if response.is_approved {
                tracing::info!(%direction, message = %response.message, "departure approved");
                self.explorer.set_next_departure(direction);
                let update = self.explorer.internal_planet_update(direction);
                self.channel.send_internal_planet_update(update)?;
                self.explorer.pop_route_hop();
                self.switch_state(TankState::ReadyToDepart);
                return Ok(());
            }
            tracing::warn!(%direction, message = %response.message, "departure denied");
            rejected.insert(direction);
        }
    }

    fn finish(&mut self) -> Result<(), TankRobotError> {
        let outcome = if self.explorer.finished_exploring() {
            self.channel.send_finished_exploring()?;
            tracing::info!(
                nodes = self.explorer.planet().nodes().len(),
                paths = self.explorer.planet().paths().len(),
                "finished exploring"
            );
            ExplorationOutcome::Finished
        } else {
            self.channel.send_stuck()?;
            tracing::warn!("no reachable unexplored path left");
            ExplorationOutcome::Stuck
        };
        self.outcome = Some(outcome);
        self.switch_state(TankState::Finished);
        Ok(())
    }

    fn depart(&mut self) -> Result<(), TankRobotError> {
        let turn = RelativeDirection::from_absolute(
            self.explorer.facing_direction(),
            self.explorer.next_departure_direction(),
        );
        self.driver.depart(turn)?;
        let direction = self.explorer.depart();
        tracing::info!(%direction, ?turn, "departing");
        self.switch_state(TankState::LineFollowing);
        Ok(())
    }
}
