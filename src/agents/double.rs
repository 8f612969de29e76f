//! Double-estimator TD control
//!
//! Two independent value stores. Each update flips a fair coin to pick the
//! store that learns; the other store evaluates the bootstrap, which removes
//! the maximization bias of the single-store rules. Behavior is ε-greedy over
//! the average of both stores.

use std::any::Any;

use rand::{Rng, rngs::StdRng};

use super::td::{TdRule, choose};
use crate::{
    Result,
    learning::{
        DEFAULT_ALPHA, DEFAULT_GAMMA, EpsilonGreedy, Reward, ValueTable, greedy_probability,
        policy::build_rng, value_table::is_tied,
    },
    nim::{Action, State},
    pipeline::Game,
    ports::{Agent, AgentCore, agent::no_legal_actions},
};

#[derive(Debug, Clone)]
pub struct DoubleTemporalDifferenceAgent {
    name: String,
    core: AgentCore,
    rule: TdRule,
    alpha: f64,
    gamma: f64,
    stores: [ValueTable; 2],
    behavior: EpsilonGreedy,
    coin: StdRng,
    previous: Option<State>,
}

impl DoubleTemporalDifferenceAgent {
    pub fn new(rule: TdRule) -> Self {
        Self {
            name: format!("double-{rule}"),
            core: AgentCore::new(),
            rule,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            stores: [ValueTable::new(), ValueTable::new()],
            behavior: EpsilonGreedy::default(),
            coin: build_rng(None),
            previous: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
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
        self.set_rng_seed(seed);
        self
    }

    pub fn rule(&self) -> TdRule {
        self.rule
    }

    /// The two estimators, in update order (store 0 wins heads).
    pub fn stores(&self) -> (&ValueTable, &ValueTable) {
        (&self.stores[0], &self.stores[1])
    }

    /// Start both stores from the same values.
    pub fn set_values(&mut self, values: ValueTable) {
        self.stores = [values.clone(), values];
    }

    fn averaged_value(&self, state: &State, action: &Action) -> f64 {
        (self.stores[0].action_value(state, action) + self.stores[1].action_value(state, action))
            / 2.0
    }

    /// Legal actions and the greedy subset under the averaged stores.
    fn candidates(&self, state: &State) -> Result<(Vec<Action>, Vec<Action>)> {
        let legal = state.legal_actions();
        if legal.is_empty() {
            return Err(no_legal_actions(state));
        }
        let averaged: Vec<f64> = legal
            .iter()
            .map(|action| self.averaged_value(state, action))
            .collect();
        let max = averaged.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let greedy = legal
            .iter()
            .zip(&averaged)
            .filter(|&(_, &value)| is_tied(value, max))
            .map(|(action, _)| *action)
            .collect();
        Ok((legal, greedy))
    }

    /// Bootstrap for `next` where `learner` is updated and the other store
    /// evaluates.
    fn bootstrap(&self, learner: usize, next: &State, next_action: &Action, legal: &[Action]) -> f64 {
        let own = &self.stores[learner];
        let other = &self.stores[1 - learner];
        match self.rule {
            TdRule::QLearning => {
                // Ties in the learner's argmax share the evaluation evenly
                let selected = own.greedy_actions(next, legal);
                selected
                    .iter()
                    .map(|action| greedy_probability(action, &selected) * other.action_value(next, action))
                    .sum()
            }
            TdRule::Sarsa => other.action_value(next, next_action),
            TdRule::ExpectedSarsa => {
                let greedy = own.greedy_actions(next, legal);
                legal
                    .iter()
                    .map(|action| {
                        self.behavior.probability(action, legal, &greedy)
                            * other.action_value(next, action)
                    })
                    .sum()
            }
        }
    }

    fn flip(&mut self) -> usize {
        if self.coin.random_bool(0.5) { 0 } else { 1 }
    }

    fn learn(&mut self, learner: usize, afterstate: &State, reward: Reward, bootstrap: f64) {
        let target = reward + self.gamma * bootstrap;
        self.stores[learner].step_towards(afterstate, target, self.alpha);
        self.behavior.decay_after_step();
    }
}

impl Agent for DoubleTemporalDifferenceAgent {
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
        for store in &mut self.stores {
            store.ensure_states(state_space);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.core.reset();
        self.previous = None;
    }

    fn step(&mut self, game: &Game, is_evaluation: bool) -> Result<Action> {
        let state = game.state();
        let (legal, greedy) = self.candidates(state)?;
        let action = choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)?;

        if !is_evaluation && let Some(previous) = self.previous.take() {
            let learner = self.flip();
            let bootstrap = self.bootstrap(learner, state, &action, &legal);
            self.learn(learner, &previous, 0.0, bootstrap);
        }

        let afterstate = state.child(&action);
        if !is_evaluation {
            self.previous = Some(afterstate.clone());
        }
        self.core.set_current_state(afterstate);
        Ok(action)
    }

    fn policy(&mut self, state: &State, is_evaluation: bool) -> Result<Action> {
        let (legal, greedy) = self.candidates(state)?;
        choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)
    }

    fn update(&mut self, prior: &State, current: &State, reward: Reward) {
        let learner = self.flip();
        self.learn(learner, prior, reward, 0.0);
        self.previous = None;
        self.behavior.decay_after_episode();
        self.core.set_current_state(current.clone());
    }

    /// Element-wise average of both stores.
    fn values(&self) -> Option<ValueTable> {
        Some(self.stores[0].average(&self.stores[1]))
    }

    fn epsilon(&self) -> Option<f64> {
        Some(self.behavior.epsilon())
    }

    fn set_epsilon(&mut self, epsilon: f64) {
        self.behavior.set_epsilon(epsilon);
    }

    fn set_rng_seed(&mut self, seed: u64) {
        self.behavior.reseed(seed);
        self.coin = build_rng(Some(seed.wrapping_add(1)));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_updates_split_between_stores() {
        let mut agent = DoubleTemporalDifferenceAgent::new(TdRule::QLearning)
            .with_alpha(1.0)
            .with_seed(5);
        for _ in 0..50 {
            agent.update(&State::from([0]), &State::from([0]), 1.0);
        }
        let (a, b) = agent.stores();
        // With α = 1 a single update is enough for either store
        assert_eq!(a.get(&State::from([0])), 1.0);
        assert_eq!(b.get(&State::from([0])), 1.0);
    }

    #[test]
    fn test_values_are_the_average() {
        let mut agent = DoubleTemporalDifferenceAgent::new(TdRule::Sarsa);
        agent.stores[0].set(State::from([1]), 1.0);
        agent.stores[1].set(State::from([1]), 0.0);
        assert_eq!(agent.values().unwrap().get(&State::from([1])), 0.5);
    }

    #[test]
    fn test_behavior_uses_averaged_stores() {
        let mut agent = DoubleTemporalDifferenceAgent::new(TdRule::QLearning)
            .with_policy(EpsilonGreedy::new(0.0, 1.0, 0.0))
            .with_seed(3);
        let state = State::from([2]);
        // {1} averages 0.4, {0} averages 0.3
        agent.stores[0].set(State::from([1]), 0.8);
        agent.stores[1].set(State::from([0]), 0.6);
        assert_eq!(agent.policy(&state, true).unwrap(), Action::new(0, 1));
    }

    #[test]
    fn test_double_q_evaluates_with_other_store() {
        let mut agent = DoubleTemporalDifferenceAgent::new(TdRule::QLearning);
        let next = State::from([2]);
        let legal = next.legal_actions();
        agent.stores[0].set(State::from([1]), 1.0);
        agent.stores[1].set(State::from([1]), -0.5);
        agent.stores[1].set(State::from([0]), 0.7);
        // Store 0 selects {1}; store 1 values it at -0.5
        assert_eq!(agent.bootstrap(0, &next, &legal[0], &legal), -0.5);
        // Store 1 selects {0}; store 0 values it at 0
        assert_eq!(agent.bootstrap(1, &next, &legal[0], &legal), 0.0);
    }
}
