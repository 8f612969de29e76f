//! First-visit Monte-Carlo control
//!
//! The agent records its own decisions during an episode and learns once the
//! outcome is known, walking the trajectory backwards with
//! `G ← γ·G + R_{t+1}`.
//!
//! ## Modes
//!
//! - **On-policy**: ε-greedy behavior, incremental average of returns
//! - **Off-policy**: ε-greedy behavior, greedy target, importance sampling
//!   (weighted or ordinary) to correct for the mismatch
//! - **Exploring starts**: first move of each episode uniform, then greedy

use std::{any::Any, collections::HashMap, fmt};

use clap::ValueEnum;
use log::trace;
use serde::{Deserialize, Serialize};

use super::td::choose;
use crate::{
    Result,
    learning::{DEFAULT_GAMMA, EpsilonGreedy, Reward, TimeStep, ValueTable, greedy_probability},
    nim::{Action, State},
    pipeline::Game,
    ports::{
        Agent, AgentCore,
        agent::{candidates, no_legal_actions},
    },
};

/// Importance-sampling estimator for off-policy Monte-Carlo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceSampling {
    /// Weighted importance sampling (biased, low variance)
    #[default]
    Weighted,
    /// Ordinary importance sampling (unbiased, high variance)
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonteCarloMode {
    OnPolicy,
    OffPolicy(ImportanceSampling),
    ExploringStarts,
}

impl fmt::Display for MonteCarloMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonteCarloMode::OnPolicy => f.write_str("on-policy-mc"),
            MonteCarloMode::OffPolicy(ImportanceSampling::Weighted) => {
                f.write_str("off-policy-mc-weighted")
            }
            MonteCarloMode::OffPolicy(ImportanceSampling::Normal) => {
                f.write_str("off-policy-mc-normal")
            }
            MonteCarloMode::ExploringStarts => f.write_str("exploring-starts-mc"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonteCarloAgent {
    name: String,
    core: AgentCore,
    mode: MonteCarloMode,
    gamma: f64,
    values: ValueTable,
    /// Visit counts (averaging modes) or cumulative weights (weighted IS)
    totals: HashMap<State, f64>,
    behavior: EpsilonGreedy,
    trajectory: Vec<TimeStep>,
}

impl MonteCarloAgent {
    pub fn new(mode: MonteCarloMode) -> Self {
        Self {
            name: mode.to_string(),
            core: AgentCore::new(),
            mode,
            gamma: DEFAULT_GAMMA,
            values: ValueTable::new(),
            totals: HashMap::new(),
            behavior: EpsilonGreedy::default(),
            trajectory: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_policy(mut self, behavior: EpsilonGreedy) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.behavior.reseed(seed);
        self
    }

    pub fn mode(&self) -> MonteCarloMode {
        self.mode
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn value_table(&self) -> &ValueTable {
        &self.values
    }

    pub fn set_values(&mut self, values: ValueTable) {
        self.values = values;
    }

    /// Decisions recorded so far in the current episode.
    pub fn trajectory(&self) -> &[TimeStep] {
        &self.trajectory
    }

    /// Pick a training action and the probability the behavior gave it.
    fn behave(&mut self, state: &State, legal: &[Action], greedy: &[Action]) -> Result<(Action, f64)> {
        match self.mode {
            MonteCarloMode::ExploringStarts if self.trajectory.is_empty() => {
                let action = self
                    .behavior
                    .select_random(legal)
                    .ok_or_else(|| no_legal_actions(state))?;
                Ok((action, 1.0 / legal.len() as f64))
            }
            MonteCarloMode::ExploringStarts => {
                let action = choose(&mut self.behavior, state, legal, greedy, true)?;
                Ok((action, greedy_probability(&action, greedy)))
            }
            MonteCarloMode::OnPolicy | MonteCarloMode::OffPolicy(_) => {
                let action = choose(&mut self.behavior, state, legal, greedy, false)?;
                Ok((action, self.behavior.probability(&action, legal, greedy)))
            }
        }
    }

    /// Backward first-visit pass over the finished episode.
    fn learn_episode(&mut self) {
        let mut first_visit = HashMap::with_capacity(self.trajectory.len());
        for (t, step) in self.trajectory.iter().enumerate() {
            first_visit.entry(step.afterstate()).or_insert(t);
        }

        let mut g = 0.0;
        let mut w = 1.0;
        for (t, step) in self.trajectory.iter().enumerate().rev() {
            g = self.gamma * g + step.reward;
            let afterstate = step.afterstate();
            let is_first = first_visit.get(&afterstate) == Some(&t);

            match self.mode {
                MonteCarloMode::OnPolicy | MonteCarloMode::ExploringStarts => {
                    if is_first {
                        let n = self.totals.entry(afterstate.clone()).or_insert(0.0);
                        *n += 1.0;
                        let step_size = 1.0 / *n;
                        self.values.step_towards(&afterstate, g, step_size);
                    }
                }
                MonteCarloMode::OffPolicy(ImportanceSampling::Weighted) => {
                    if is_first {
                        let c = self.totals.entry(afterstate.clone()).or_insert(0.0);
                        *c += w;
                        let step_size = w / *c;
                        self.values.step_towards(&afterstate, g, step_size);
                    }
                    let pi = self.target_probability(step);
                    if pi == 0.0 {
                        trace!("weighted IS stops at non-greedy step {t}");
                        break;
                    }
                    w *= pi / step.behavior_probability;
                }
                MonteCarloMode::OffPolicy(ImportanceSampling::Normal) => {
                    if is_first {
                        let n = self.totals.entry(afterstate.clone()).or_insert(0.0);
                        *n += 1.0;
                        let step_size = 1.0 / *n;
                        self.values.step_towards(&afterstate, w * g, step_size);
                    }
                    let pi = self.target_probability(step);
                    w = if pi == 0.0 {
                        0.0
                    } else {
                        w * pi / step.behavior_probability
                    };
                }
            }
        }
    }

    /// Probability of the step's action under the greedy target policy.
    fn target_probability(&self, step: &TimeStep) -> f64 {
        let greedy = self
            .values
            .greedy_actions(&step.state, &step.state.legal_actions());
        greedy_probability(&step.action, &greedy)
    }
}

impl Agent for MonteCarloAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn initialize(&mut self, state_space: &[State]) -> Result<()> {
        self.values.ensure_states(state_space);
        Ok(())
    }

    fn reset(&mut self) {
        self.core.reset();
        self.trajectory.clear();
    }

    fn step(&mut self, game: &Game, is_evaluation: bool) -> Result<Action> {
        let state = game.state();
        let (legal, greedy) = candidates(&self.values, state)?;

        let action = if is_evaluation {
            choose(&mut self.behavior, state, &legal, &greedy, true)?
        } else {
            let (action, probability) = self.behave(state, &legal, &greedy)?;
            self.trajectory
                .push(TimeStep::new(state.clone(), action, probability));
            self.behavior.decay_after_step();
            action
        };

        self.core.set_current_state(state.child(&action));
        Ok(action)
    }

    fn policy(&mut self, state: &State, is_evaluation: bool) -> Result<Action> {
        let (legal, greedy) = candidates(&self.values, state)?;
        let greedy_only = is_evaluation || self.mode == MonteCarloMode::ExploringStarts;
        choose(&mut self.behavior, state, &legal, &greedy, greedy_only)
    }

    fn update(&mut self, _prior: &State, current: &State, reward: Reward) {
        if let Some(last) = self.trajectory.last_mut() {
            last.reward = reward;
        }
        self.learn_episode();
        self.trajectory.clear();
        self.behavior.decay_after_episode();
        self.core.set_current_state(current.clone());
    }

    fn values(&self) -> Option<ValueTable> {
        Some(self.values.clone())
    }

    fn epsilon(&self) -> Option<f64> {
        match self.mode {
            MonteCarloMode::ExploringStarts => None,
            _ => Some(self.behavior.epsilon()),
        }
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.behavior.set_epsilon(epsilon);
    }

    fn set_rng_seed(&mut self, seed: u64) {
        self.behavior.reseed(seed);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(agent: &mut MonteCarloAgent, steps: &[([u32; 1], Action, f64)], reward: Reward) {
        agent.trajectory = steps
            .iter()
            .map(|&(piles, action, b)| TimeStep::new(State::from(piles), action, b))
            .collect();
        let prior = agent.trajectory[agent.trajectory.len() - 1].afterstate();
        agent.update(&prior, &State::from([0]), reward);
    }

    #[test]
    fn test_on_policy_averages_returns() {
        let mut agent = MonteCarloAgent::new(MonteCarloMode::OnPolicy);
        let steps = [([3], Action::new(0, 1), 1.0), ([1], Action::new(0, 1), 1.0)];
        episode(&mut agent, &steps, 1.0);
        assert_eq!(agent.values.get(&State::from([2])), 1.0);
        assert_eq!(agent.values.get(&State::from([0])), 1.0);

        episode(&mut agent, &steps, -1.0);
        assert_eq!(agent.values.get(&State::from([2])), 0.0);
        assert!(agent.trajectory.is_empty());
    }

    #[test]
    fn test_discounted_returns() {
        let mut agent = MonteCarloAgent::new(MonteCarloMode::OnPolicy).with_gamma(0.5);
        let steps = [([3], Action::new(0, 1), 1.0), ([1], Action::new(0, 1), 1.0)];
        episode(&mut agent, &steps, 1.0);
        assert_eq!(agent.values.get(&State::from([2])), 0.5);
    }

    #[test]
    fn test_weighted_sampling_stops_at_non_greedy_action() {
        let mut agent = MonteCarloAgent::new(MonteCarloMode::OffPolicy(ImportanceSampling::Weighted));
        agent.values.set(State::from([1]), 2.0);
        let steps = [([4], Action::new(0, 1), 0.5), ([2], Action::new(0, 2), 0.5)];
        episode(&mut agent, &steps, 1.0);
        assert_eq!(agent.values.get(&State::from([0])), 1.0);
        // {2} -> {0} is not greedy while {1} is worth 2, so {3} is never reached
        assert!(!agent.totals.contains_key(&State::from([3])));
    }

    #[test]
    fn test_ordinary_sampling_zeroes_earlier_returns() {
        let mut agent = MonteCarloAgent::new(MonteCarloMode::OffPolicy(ImportanceSampling::Normal));
        agent.values.set(State::from([1]), 2.0);
        agent.values.set(State::from([3]), 0.5);
        let steps = [([4], Action::new(0, 1), 0.5), ([2], Action::new(0, 2), 0.5)];
        episode(&mut agent, &steps, 1.0);
        assert_eq!(agent.values.get(&State::from([0])), 1.0);
        assert_eq!(agent.values.get(&State::from([3])), 0.0);
    }

    #[test]
    fn test_exploring_starts_is_greedy_after_first_move() {
        let mut agent = MonteCarloAgent::new(MonteCarloMode::ExploringStarts).with_seed(2);
        agent.values.set(State::from([0]), 1.0);
        let mut game = Game::new(State::from([5]));
        game.set_state(State::from([5]));
        agent.step(&game, false).unwrap();
        assert_eq!(agent.trajectory.len(), 1);

        game.set_state(State::from([3]));
        let action = agent.step(&game, false).unwrap();
        assert_eq!(action, Action::new(0, 3));
        assert_eq!(agent.trajectory[1].behavior_probability, 1.0);
    }
}
