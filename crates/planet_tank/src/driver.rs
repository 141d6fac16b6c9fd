//! Seam between the exploration loop and the hardware that moves the tank.

use std::collections::VecDeque;
use std::fmt;

use planet_map::RelativeDirection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    ArrivedAtNode,
    /// An obstacle sits on the path; the driver turns around and the next
    /// call follows the line back to the node the tank left.
    PathBlocked,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    Hardware { message: String },
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverError::Hardware { message } => write!(f, "motion hardware failure: {message}"),
        }
    }
}

impl std::error::Error for DriverError {}

pub trait MotionDriver {
    /// Follows the line until something happens.
    fn follow_to_next_node(&mut self) -> Result<FollowOutcome, DriverError>;

    /// Turns onto the exit `direction` relative to the tank's heading.
    fn depart(&mut self, direction: RelativeDirection) -> Result<(), DriverError>;
}

/// Reaches the next node immediately. Used when no motion hardware is
/// attached.
#[derive(Debug, Default)]
pub struct InstantDriver;

impl MotionDriver for InstantDriver {
    fn follow_to_next_node(&mut self) -> Result<FollowOutcome, DriverError> {
        Ok(FollowOutcome::ArrivedAtNode)
    }

    fn depart(&mut self, direction: RelativeDirection) -> Result<(), DriverError> {
        tracing::debug!(?direction, "turning onto exit");
        Ok(())
    }
}

/// Replays queued outcomes, then arrives at every node. Records each turn.
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    outcomes: VecDeque<FollowOutcome>,
    departures: Vec<RelativeDirection>,
}

impl ScriptedDriver {
    pub fn new(outcomes: impl IntoIterator<Item = FollowOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            departures: Vec::new(),
        }
    }

    pub fn departures(&self) -> &[RelativeDirection] {
        &self.departures
    }
}

impl MotionDriver for ScriptedDriver {
    fn follow_to_next_node(&mut self) -> Result<FollowOutcome, DriverError> {
        Ok(self
            .outcomes
            .pop_front()
            .unwrap_or(FollowOutcome::ArrivedAtNode))
    }

    fn depart(&mut self, direction: RelativeDirection) -> Result<(), DriverError> {
        self.departures.push(direction);
        Ok(())
    }
}
