//! One-step temporal difference control: Q-learning, SARSA, Expected SARSA
//!
//! The agent learns just in time: when it is asked to move again it knows
//! which state its previous move led to, and updates that afterstate towards
//!
//! ```text
//! R + γ · target(S')
//! ```
//!
//! where `S'` is the state it now faces. The terminal transition arrives
//! through [`Agent::update`] and bootstraps zero.

use std::{any::Any, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    learning::{DEFAULT_ALPHA, DEFAULT_GAMMA, EpsilonGreedy, Reward, ValueTable},
    nim::{Action, State},
    pipeline::Game,
    ports::{
        Agent, AgentCore,
        agent::{candidates, no_legal_actions},
    },
};

/// Bootstrap target of a one-step update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TdRule {
    /// Best next action value (off-policy)
    QLearning,
    /// Value of the next action actually chosen (on-policy)
    Sarsa,
    /// Expected next value under the ε-greedy behavior policy
    ExpectedSarsa,
}

impl fmt::Display for TdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TdRule::QLearning => "q-learning",
            TdRule::Sarsa => "sarsa",
            TdRule::ExpectedSarsa => "expected-sarsa",
        };
        f.write_str(name)
    }
}

/// Expected value of `state` under ε-greedy `policy` over `values`.
pub(crate) fn expected_value(
    policy: &EpsilonGreedy,
    values: &ValueTable,
    state: &State,
    legal: &[Action],
    greedy: &[Action],
) -> f64 {
    legal
        .iter()
        .map(|action| policy.probability(action, legal, greedy) * values.action_value(state, action))
        .sum()
}

/// Greedy-or-ε-greedy pick shared by the value-based agents.
pub(crate) fn choose(
    policy: &mut EpsilonGreedy,
    state: &State,
    legal: &[Action],
    greedy: &[Action],
    is_evaluation: bool,
) -> Result<Action> {
    let action = if is_evaluation {
        policy.select_greedy(greedy)
    } else {
        policy.select(legal, greedy)
    };
    action.ok_or_else(|| no_legal_actions(state))
}

/// Tabular one-step TD control agent
#[derive(Debug, Clone)]
pub struct TemporalDifferenceAgent {
    name: String,
    core: AgentCore,
    rule: TdRule,
    alpha: f64,
    gamma: f64,
    values: ValueTable,
    behavior: EpsilonGreedy,
    previous: Option<State>,
}

impl TemporalDifferenceAgent {
    pub fn new(rule: TdRule) -> Self {
        Self {
            name: rule.to_string(),
            core: AgentCore::new(),
            rule,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            values: ValueTable::new(),
            behavior: EpsilonGreedy::default(),
            previous: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set step size α
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set discount γ
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

    pub fn rule(&self) -> TdRule {
        self.rule
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
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

    fn bootstrap(&self, next: &State, next_action: &Action, legal: &[Action], greedy: &[Action]) -> f64 {
        match self.rule {
            TdRule::QLearning => self.values.max_value(next, legal),
            TdRule::Sarsa => self.values.action_value(next, next_action),
            TdRule::ExpectedSarsa => expected_value(&self.behavior, &self.values, next, legal, greedy),
        }
    }

    fn learn(&mut self, afterstate: &State, reward: Reward, bootstrap: f64) {
        let target = reward + self.gamma * bootstrap;
        self.values.step_towards(afterstate, target, self.alpha);
        self.behavior.decay_after_step();
    }
}

impl Agent for TemporalDifferenceAgent {
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
        self.previous = None;
    }

    fn step(&mut self, game: &Game, is_evaluation: bool) -> Result<Action> {
        let state = game.state();
        let (legal, greedy) = candidates(&self.values, state)?;
        let action = choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)?;

        if !is_evaluation && let Some(previous) = self.previous.take() {
            let bootstrap = self.bootstrap(state, &action, &legal, &greedy);
            self.learn(&previous, 0.0, bootstrap);
        }

        let afterstate = state.child(&action);
        if !is_evaluation {
            self.previous = Some(afterstate.clone());
        }
        self.core.set_current_state(afterstate);
        Ok(action)
    }

    fn policy(&mut self, state: &State, is_evaluation: bool) -> Result<Action> {
        let (legal, greedy) = candidates(&self.values, state)?;
        choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)
    }

    fn update(&mut self, prior: &State, current: &State, reward: Reward) {
        self.learn(prior, reward, 0.0);
        self.previous = None;
        self.behavior.decay_after_episode();
        self.core.set_current_state(current.clone());
    }

    fn values(&self) -> Option<ValueTable> {
        Some(self.values.clone())
    }

    fn epsilon(&self) -> Option<f64> {
        Some(self.behavior.epsilon())
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
