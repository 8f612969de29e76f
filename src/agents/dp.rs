//! Dynamic programming over the full state space
//!
//! Values are afterstate values from the perspective of the player who moved
//! into the state. A terminal state is a win for that player. Otherwise the
//! opponent moves next, so
//!
//! ```text
//! V(s) = -γ · agg_a Σ p(s' | s, a) · V(s')
//! ```
//!
//! with `agg = max` for value iteration and the mean over the current greedy
//! set for policy evaluation. Sweeps visit states in order of increasing
//! object count, so a deterministic game converges in a single pass.

use std::{any::Any, collections::HashMap, fmt};

use clap::ValueEnum;
use log::{debug, info};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::{
    Result,
    learning::{
        DEFAULT_GAMMA, DEFAULT_THRESHOLD, ValueTable, policy::build_rng, sample_action,
        value_table::is_tied,
    },
    nim::{Action, State},
    ports::{Agent, AgentCore, agent::no_legal_actions},
};

/// `(state, action) → [(successor, probability)]`
pub type TransitionModel = HashMap<(State, Action), Vec<(State, f64)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DpMethod {
    PolicyIteration,
    ValueIteration,
}

impl fmt::Display for DpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpMethod::PolicyIteration => f.write_str("policy-iteration"),
            DpMethod::ValueIteration => f.write_str("value-iteration"),
        }
    }
}

/// Deterministic Nim dynamics: every action has exactly one successor.
pub fn nim_transitions(states: &[State]) -> TransitionModel {
    states
        .iter()
        .flat_map(|state| {
            state
                .legal_actions()
                .into_iter()
                .map(move |action| ((state.clone(), action), vec![(state.child(&action), 1.0)]))
        })
        .collect()
}

/// Solves the game at initialization and then plays greedily.
#[derive(Debug, Clone)]
pub struct DynamicProgrammingAgent {
    name: String,
    core: AgentCore,
    method: DpMethod,
    threshold: f64,
    gamma: f64,
    values: ValueTable,
    transitions: TransitionModel,
    custom_transitions: bool,
    /// State space, sorted by increasing object count
    states: Vec<State>,
    sweeps: usize,
    rng: StdRng,
}

impl DynamicProgrammingAgent {
    pub fn new(method: DpMethod) -> Self {
        Self {
            name: method.to_string(),
            core: AgentCore::new(),
            method,
            threshold: DEFAULT_THRESHOLD,
            gamma: DEFAULT_GAMMA,
            values: ValueTable::new(),
            transitions: TransitionModel::new(),
            custom_transitions: false,
            states: Vec::new(),
            sweeps: 0,
            rng: build_rng(None),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the convergence threshold on the largest change in one sweep
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_rng_seed(seed);
        self
    }

    pub fn method(&self) -> DpMethod {
        self.method
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn transitions(&self) -> &TransitionModel {
        &self.transitions
    }

    /// Sweeps performed by the last solve.
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn value_table(&self) -> &ValueTable {
        &self.values
    }

    /// Replace the transition model.
    ///
    /// The replacement survives later calls to `initialize`. If a state space
    /// is already known the values are solved again right away.
    pub fn set_transitions(&mut self, transitions: TransitionModel) {
        self.transitions = transitions;
        self.custom_transitions = true;
        if !self.states.is_empty() {
            self.solve();
        }
    }

    /// Expected value of taking `action` in `state` under the model.
    ///
    /// Pairs missing from the model fall back to the deterministic child.
    pub fn action_value(&self, state: &State, action: &Action) -> f64 {
        match self.transitions.get(&(state.clone(), *action)) {
            Some(outcomes) => outcomes
                .iter()
                .map(|(successor, probability)| probability * self.values.get(successor))
                .sum(),
            None => self.values.action_value(state, action),
        }
    }

    fn greedy_actions(&self, state: &State, legal: &[Action]) -> Vec<Action> {
        let action_values: Vec<f64> = legal
            .iter()
            .map(|action| self.action_value(state, action))
            .collect();
        let max = action_values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        legal
            .iter()
            .zip(&action_values)
            .filter(|&(_, &value)| is_tied(value, max))
            .map(|(action, _)| *action)
            .collect()
    }

    fn solve(&mut self) {
        self.values.ensure_states(&self.states);
        self.sweeps = 0;
        match self.method {
            DpMethod::ValueIteration => self.value_iteration(),
            DpMethod::PolicyIteration => self.policy_iteration(),
        }
        info!(
            "{} converged after {} sweeps over {} states",
            self.method,
            self.sweeps,
            self.states.len()
        );
    }

    /// One in-place sweep; returns the largest change.
    fn sweep(&mut self, greedy: Option<&HashMap<State, Vec<Action>>>) -> f64 {
        let states = std::mem::take(&mut self.states);
        let mut delta: f64 = 0.0;
        for state in &states {
            let value = if state.is_terminal() {
                1.0
            } else {
                let actions = match greedy.and_then(|greedy| greedy.get(state)) {
                    Some(actions) => actions.clone(),
                    None => state.legal_actions(),
                };
                let action_values = actions.iter().map(|action| self.action_value(state, action));
                let aggregate = if greedy.is_some() {
                    action_values.sum::<f64>() / actions.len() as f64
                } else {
                    action_values.fold(f64::NEG_INFINITY, f64::max)
                };
                -self.gamma * aggregate
            };
            delta = delta.max((value - self.values.get(state)).abs());
            self.values.set(state.clone(), value);
        }
        self.states = states;
        self.sweeps += 1;
        delta
    }

    fn value_iteration(&mut self) {
        while self.sweep(None) >= self.threshold {}
    }

    fn policy_iteration(&mut self) {
        // Start from the uniform policy
        let mut greedy: HashMap<State, Vec<Action>> = self
            .states
            .iter()
            .filter(|state| !state.is_terminal())
            .map(|state| (state.clone(), state.legal_actions()))
            .collect();

        let mut improvements = 0;
        loop {
            while self.sweep(Some(&greedy)) >= self.threshold {}

            let mut stable = true;
            for (state, actions) in greedy.iter_mut() {
                let improved = self.greedy_actions(state, &state.legal_actions());
                if improved != *actions {
                    stable = false;
                    *actions = improved;
                }
            }
            improvements += 1;
            debug!("policy improvement {improvements}: stable = {stable}");
            if stable {
                break;
            }
        }
    }
}

impl Agent for DynamicProgrammingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    /// Build the model over `state_space` (unless one was supplied) and solve.
    fn initialize(&mut self, state_space: &[State]) -> Result<()> {
        let mut states = state_space.to_vec();
        states.sort();
        states.dedup();
        if !self.custom_transitions {
            self.transitions = nim_transitions(&states);
        }
        self.states = states;
        self.solve();
        Ok(())
    }

    fn policy(&mut self, state: &State, _is_evaluation: bool) -> Result<Action> {
        let legal = state.legal_actions();
        let greedy = self.greedy_actions(state, &legal);
        sample_action(&greedy, &mut self.rng).ok_or_else(|| no_legal_actions(state))
    }

    fn values(&self) -> Option<ValueTable> {
        Some(self.values.clone())
    }

    fn set_rng_seed(&mut self, seed: u64) {
        self.rng = build_rng(Some(seed));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
