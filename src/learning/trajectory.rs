//! Episode trajectories

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Reward;
use crate::nim::{Action, State};

/// One decision of an agent within an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    /// State the agent faced
    pub state: State,
    /// Action it took
    pub action: Action,
    /// Reward observed after the action (R_{t+1}); filled in once known
    pub reward: Reward,
    /// Probability the behavior policy assigned to `action`
    pub behavior_probability: f64,
}

impl TimeStep {
    pub fn new(state: State, action: Action, behavior_probability: f64) -> Self {
        Self {
            state,
            action,
            reward: 0.0,
            behavior_probability,
        }
    }

    /// The afterstate produced by this step; the key its value lives under.
    pub fn afterstate(&self) -> State {
        self.state.child(&self.action)
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} -> reward {}",
            self.state, self.action, self.reward
        )
    }
}
