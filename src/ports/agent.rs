//! Agent port - the contract every playing strategy implements
//!
//! Learning algorithms, dynamic-programming solvers and baselines all sit
//! behind this one trait so the orchestrator can drive any pair of them.

use std::{
    any::Any,
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard},
};

use crate::{
    Error, Result,
    identifiers::GameId,
    learning::{Reward, ValueTable},
    nim::{Action, State},
    pipeline::Game,
};

/// An agent shared between its owner and the games it is attached to.
///
/// Games only ever hold a [`std::sync::Weak`] downgrade of this handle.
pub type SharedAgent = Arc<Mutex<dyn Agent>>;

/// Wrap an agent so it can be attached to games.
pub fn share<A: Agent + 'static>(agent: A) -> SharedAgent {
    Arc::new(Mutex::new(agent))
}

/// Lock a shared agent, turning a poisoned lock into an error.
pub fn lock(agent: &SharedAgent) -> Result<MutexGuard<'_, dyn Agent + 'static>> {
    agent.lock().map_err(|e| Error::AgentPoisoned {
        message: e.to_string(),
    })
}

/// Bookkeeping every agent carries: the state it last produced or observed,
/// and the games it is attached to.
#[derive(Debug, Clone, Default)]
pub struct AgentCore {
    current_state: State,
    games: HashSet<GameId>,
}

impl AgentCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> &State {
        &self.current_state
    }

    pub fn set_current_state(&mut self, state: State) {
        self.current_state = state;
    }

    /// Forget the per-episode state. Game attachments are kept.
    pub fn reset(&mut self) {
        self.current_state = State::default();
    }

    pub fn games(&self) -> &HashSet<GameId> {
        &self.games
    }

    pub fn is_attached_to(&self, game: GameId) -> bool {
        self.games.contains(&game)
    }

    pub(crate) fn attach(&mut self, game: GameId) {
        self.games.insert(game);
    }

    pub(crate) fn detach(&mut self, game: GameId) {
        self.games.remove(&game);
    }
}

/// Agent trait - uniform lifecycle across all strategies
///
/// # Lifecycle
///
/// 1. `initialize(state_space)` - once, when attached to a game
/// 2. For each episode:
///    - `reset()`
///    - `step(game, is_evaluation)` - on each of the agent's turns
///    - `update(prior, current, reward)` - on the terminal transition
///
/// Learning agents additionally update their values from inside `step`, as
/// soon as the outcome of their previous move is known.
pub trait Agent: Send {
    /// Get the agent's name.
    fn name(&self) -> &str;

    fn core(&self) -> &AgentCore;

    fn core_mut(&mut self) -> &mut AgentCore;

    /// Pre-populate internal tables from the full state space.
    ///
    /// Only dynamic-programming agents need this; the default does nothing.
    fn initialize(&mut self, _state_space: &[State]) -> Result<()> {
        Ok(())
    }

    /// Clear per-episode state. Learned values are kept.
    fn reset(&mut self) {
        self.core_mut().reset();
    }

    /// Choose an action for the game's current state.
    ///
    /// With `is_evaluation` set the agent neither explores nor learns.
    ///
    /// # Errors
    ///
    /// Returns an error if the game's state has no legal actions.
    fn step(&mut self, game: &Game, is_evaluation: bool) -> Result<Action> {
        let state = game.state();
        let action = self.policy(state, is_evaluation)?;
        self.core_mut().set_current_state(state.child(&action));
        Ok(action)
    }

    /// Pure selection step for `state`.
    fn policy(&mut self, state: &State, is_evaluation: bool) -> Result<Action>;

    /// Learn from the transition `prior → current` that paid `reward`.
    ///
    /// `prior` is the state the agent's own last move produced, `current` the
    /// state it observes next. The default only tracks `current`.
    fn update(&mut self, _prior: &State, current: &State, _reward: Reward) {
        self.core_mut().set_current_state(current.clone());
    }

    /// Snapshot of the learned values, for agents that have them.
    fn values(&self) -> Option<ValueTable> {
        None
    }

    /// Current exploration rate, for agents that explore.
    fn epsilon(&self) -> Option<f64> {
        None
    }

    fn set_epsilon(&mut self, _epsilon: f64) {}

    /// Seed the agent's private random number generators.
    fn set_rng_seed(&mut self, _seed: u64) {}

    /// Enable downcasting to concrete types.
    fn as_any(&self) -> &dyn Any;
}

/// Legal actions of `state` and the subset that is greedy under `values`.
pub(crate) fn candidates(values: &ValueTable, state: &State) -> Result<(Vec<Action>, Vec<Action>)> {
    let legal = state.legal_actions();
    if legal.is_empty() {
        return Err(Error::NoLegalActions {
            state: state.to_string(),
        });
    }
    let greedy = values.greedy_actions(state, &legal);
    Ok((legal, greedy))
}

pub(crate) fn no_legal_actions(state: &State) -> Error {
    Error::NoLegalActions {
        state: state.to_string(),
    }
}
