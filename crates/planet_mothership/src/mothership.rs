use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use planet_map::{Direction, NodeId, Planet};
use planet_net::{LinkEvent, TankLink, TankLinkConfig};
use planet_proto::{InternalPlanetUpdate, MothershipMessage, TankMessage};

use crate::error::{MothershipError, StateError};
use crate::events::UpdateEvent;
use crate::state::PlanetStateManager;
use crate::tank_entity::TankEntity;

pub const DEFAULT_TANK_ID: &str = "tank";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPosition {
    pub node_id: NodeId,
    pub arrival_from: Direction,
}

/// Event-driven authority loop: each tick drains the link, dispatches the
/// tank's messages and applies the resulting events.
pub struct Mothership {
    link: TankLink,
    state: PlanetStateManager,
    start_position: Option<StartPosition>,
    tick_interval: Duration,
    auto_start: bool,
    tank_ip: Option<String>,
    last_planet_update: Option<InternalPlanetUpdate>,
}

impl Mothership {
    pub fn bind(link_config: TankLinkConfig, planet: Planet) -> Result<Self, MothershipError> {
        let link = TankLink::bind(link_config)?;
        let mut state = PlanetStateManager::new();
        state.set_planet(planet);
        Ok(Self {
            link,
            state,
            start_position: None,
            tick_interval: Duration::from_millis(100),
            auto_start: true,
            tank_ip: None,
            last_planet_update: None,
        })
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Where the next tank to connect is placed.
    pub fn set_start_position(
        &mut self,
        node_id: impl Into<NodeId>,
        arrival_from: Direction,
    ) -> Result<(), MothershipError> {
        let node_id = node_id.into();
        let planet = self.state.planet().ok_or(StateError::NoPlanet)?;
        if !planet.contains_node(&node_id) {
            return Err(StateError::UnknownStartNode { node_id }.into());
        }
        tracing::info!(%node_id, %arrival_from, "start position set");
        self.start_position = Some(StartPosition {
            node_id,
            arrival_from,
        });
        Ok(())
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.link.local_addr()
    }

    pub fn state(&self) -> &PlanetStateManager {
        &self.state
    }

    pub fn tank_ip(&self) -> Option<&str> {
        self.tank_ip.as_deref()
    }

    pub fn last_planet_update(&self) -> Option<&InternalPlanetUpdate> {
        self.last_planet_update.as_ref()
    }

    /// Unblocks the tank's main loop.
    pub fn send_start(&mut self) -> Result<(), MothershipError> {
        if self.state.tank().is_none() {
            return Err(StateError::NoTank.into());
        }
        self.link.send(&MothershipMessage::Start)?;
        tracing::info!("start signal sent");
        Ok(())
    }

    pub fn disconnect_tank(&self) {
        self.link.request_disconnect();
    }

    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<(), MothershipError> {
        tracing::info!(addr = %self.local_addr(), "mothership running");
        while !shutdown.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick();
            if let Some(remaining) = self.tick_interval.checked_sub(started.elapsed()) {
                thread::sleep(remaining);
            }
        }
        tracing::info!("mothership stopped");
        Ok(())
    }

    /// One pass of the loop. Returns the events that were applied.
    pub fn tick(&mut self) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        for link_event in self.link.poll() {
            if let Some(event) = self.on_link_event(link_event) {
                events.push(event);
            }
        }
        for message in self.link.drain() {
            if let Some(event) = self.dispatch(message) {
                events.push(event);
            }
        }
        for event in &events {
            self.apply(event);
        }
        events
    }

    fn on_link_event(&mut self, event: LinkEvent) -> Option<UpdateEvent> {
        match event {
            LinkEvent::TankConnected { peer } => {
                let tank_ip = peer.ip().to_string();
                self.tank_ip = Some(tank_ip.clone());
                match &self.start_position {
                    Some(start) => Some(UpdateEvent::AddedTank {
                        tank_ip,
                        starting_node_id: start.node_id.clone(),
                        arrival_from: start.arrival_from,
                    }),
                    None => {
                        tracing::warn!(%tank_ip, "tank connected before a start position was set");
                        None
                    }
                }
            }
            LinkEvent::TankDisconnected { peer } => Some(UpdateEvent::DisconnectedTank {
                tank_ip: peer.ip().to_string(),
            }),
            LinkEvent::TankLost { peer, .. } => Some(UpdateEvent::TankConnectionLost {
                tank_ip: peer.ip().to_string(),
            }),
        }
    }

    fn dispatch(&mut self, message: TankMessage) -> Option<UpdateEvent> {
        let tank_ip = self.tank_ip.clone().unwrap_or_default();
        match message {
            TankMessage::NodeArrival => {
                let reply = self
                    .state
                    .on_tank_arrival()
                    .and_then(|()| self.state.tank_arrival_response())
                    .map(MothershipMessage::ArrivalResponse);
                self.reply(reply);
                None
            }
            TankMessage::PathChosen { direction } => {
                let reply = self
                    .state
                    .tank_path_chosen_response(direction)
                    .map(|request_response| MothershipMessage::PathChosenResponse {
                        request_response,
                    });
                self.reply(reply);
                None
            }
            TankMessage::PathBlocked => {
                if let Err(err) = self.state.handle_tank_path_blocked() {
                    self.reply(Err(err));
                }
                None
            }
            TankMessage::InternalPlanet(update) => {
                Some(UpdateEvent::TankPlanetUpdate(Box::new(update)))
            }
            TankMessage::FinishedExploring => Some(UpdateEvent::TankFinished { tank_ip }),
            TankMessage::Stuck => Some(UpdateEvent::TankStuck { tank_ip }),
        }
    }

    /// Sends `reply`, or reports the conflict to the tank as an `error`.
    fn reply(&mut self, reply: Result<MothershipMessage, StateError>) {
        let message = match reply {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(error = %err, "cannot serve tank request");
                MothershipMessage::Error {
                    msg: err.to_string(),
                }
            }
        };
        if let Err(err) = self.link.send(&message) {
            tracing::warn!(error = %err, kind = message.kind(), "reply not delivered");
        }
    }

    fn apply(&mut self, event: &UpdateEvent) {
        tracing::debug!(kind = event.kind(), "applying update event");
        match event {
            UpdateEvent::AddedTank {
                starting_node_id,
                arrival_from,
                ..
            } => {
                let tank = TankEntity::new(DEFAULT_TANK_ID, starting_node_id.clone(), *arrival_from);
                if let Err(err) = self.state.set_tank_entity(tank) {
                    tracing::error!(error = %err, "cannot place tank");
                    return;
                }
                if self.auto_start {
                    if let Err(err) = self.send_start() {
                        tracing::warn!(error = %err, "start signal not delivered");
                    }
                }
            }
            UpdateEvent::DisconnectedTank { tank_ip } => {
                tracing::info!(%tank_ip, "tank disconnected");
                self.forget_tank();
            }
            UpdateEvent::TankConnectionLost { tank_ip } => {
                tracing::warn!(%tank_ip, "lost connection to tank, awaiting a new one");
                self.forget_tank();
            }
            UpdateEvent::TankPlanetUpdate(update) => {
                tracing::info!(
                    cur_node = %update.cur_node,
                    target_node = update.target_node.as_deref().unwrap_or("-"),
                    depart_dir = %update.depart_dir,
                    known_nodes = update.planet.nodes().len(),
                    "tank planet update"
                );
                self.last_planet_update = Some((**update).clone());
            }
            UpdateEvent::TankFinished { tank_ip } => {
                tracing::info!(%tank_ip, "tank finished exploring");
            }
            UpdateEvent::TankStuck { tank_ip } => {
                tracing::warn!(%tank_ip, "tank is stuck");
            }
        }
    }

    fn forget_tank(&mut self) {
        self.state.remove_tank();
        self.tank_ip = None;
    }
}
