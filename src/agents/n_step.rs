//! n-step bootstrapping
//!
//! Decisions are kept in a trajectory indexed by time. Once `n` further
//! decisions have been made (or the episode has ended) the decision at
//! `τ = t - n` is updated towards the n-step return
//!
//! ```text
//! G = Σ_{i=τ+1}^{min(τ+n, T)} γ^{i-τ-1} R_i  +  γ^n · bootstrap(S_{τ+n})   (if τ + n < T)
//! ```
//!
//! Step `i` of the trajectory stores `S_i`, `A_i` and `R_{i+1}`. With `n = 1`
//! the SARSA and Expected SARSA rules perform exactly the one-step updates of
//! [`TemporalDifferenceAgent`](super::TemporalDifferenceAgent).

use std::{any::Any, fmt};

use serde::{Deserialize, Serialize};

use super::td::{choose, expected_value};
use crate::{
    Result,
    learning::{
        DEFAULT_ALPHA, DEFAULT_GAMMA, EpsilonGreedy, Reward, TimeStep, ValueTable,
        greedy_probability,
    },
    nim::{Action, State},
    pipeline::Game,
    ports::{Agent, AgentCore, agent::candidates},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NStepRule {
    Sarsa,
    ExpectedSarsa,
    /// SARSA target corrected by importance sampling towards the greedy policy.
    ///
    /// The step size is `α·ρ`; once it exceeds 1 an update overshoots its
    /// target, so keep ε low when `n` is large.
    OffPolicySarsa,
    /// Expected SARSA under the greedy policy, corrected by importance sampling.
    /// Shares the `α·ρ` step size of [`NStepRule::OffPolicySarsa`].
    OffPolicyExpectedSarsa,
    /// Tree backup with a greedy target; no importance sampling
    TreeBackup,
}

impl fmt::Display for NStepRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NStepRule::Sarsa => "n-step-sarsa",
            NStepRule::ExpectedSarsa => "n-step-expected-sarsa",
            NStepRule::OffPolicySarsa => "off-policy-n-step-sarsa",
            NStepRule::OffPolicyExpectedSarsa => "off-policy-n-step-expected-sarsa",
            NStepRule::TreeBackup => "n-step-tree-backup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct NStepAgent {
    name: String,
    core: AgentCore,
    rule: NStepRule,
    n: usize,
    alpha: f64,
    gamma: f64,
    values: ValueTable,
    behavior: EpsilonGreedy,
    trajectory: Vec<TimeStep>,
    /// Time of the latest decision
    current_time: usize,
    /// Episode length once known, `usize::MAX` before
    terminal_time: usize,
    /// Next decision awaiting its update
    update_time: usize,
}

impl NStepAgent {
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(rule: NStepRule, n: usize) -> Self {
        assert!(n >= 1, "n-step agents need n >= 1");
        Self {
            name: rule.to_string(),
            core: AgentCore::new(),
            rule,
            n,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            values: ValueTable::new(),
            behavior: EpsilonGreedy::default(),
            trajectory: Vec::new(),
            current_time: 0,
            terminal_time: usize::MAX,
            update_time: 0,
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
        self.behavior.reseed(seed);
        self
    }

    pub fn rule(&self) -> NStepRule {
        self.rule
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn value_table(&self) -> &ValueTable {
        &self.values
    }

    pub fn set_values(&mut self, values: ValueTable) {
        self.values = values;
    }

    fn greedy_at(&self, state: &State) -> (Vec<Action>, Vec<Action>) {
        let legal = state.legal_actions();
        let greedy = self.values.greedy_actions(state, &legal);
        (legal, greedy)
    }

    /// π(a|s) of the greedy target policy.
    fn target_probability(&self, step: &TimeStep) -> f64 {
        let (_, greedy) = self.greedy_at(&step.state);
        greedy_probability(&step.action, &greedy)
    }

    /// Σ_a π(a|s) · V(s.child(a)) for the greedy target policy.
    fn greedy_expectation(&self, state: &State, legal: &[Action], greedy: &[Action]) -> f64 {
        legal
            .iter()
            .map(|action| greedy_probability(action, greedy) * self.values.action_value(state, action))
            .sum()
    }

    /// Value of the decision at time `t`, used to close an n-step return.
    fn bootstrap(&self, t: usize) -> f64 {
        let step = &self.trajectory[t];
        match self.rule {
            NStepRule::Sarsa | NStepRule::OffPolicySarsa => {
                self.values.action_value(&step.state, &step.action)
            }
            NStepRule::ExpectedSarsa => {
                let (legal, greedy) = self.greedy_at(&step.state);
                expected_value(&self.behavior, &self.values, &step.state, &legal, &greedy)
            }
            NStepRule::OffPolicyExpectedSarsa | NStepRule::TreeBackup => {
                let (legal, greedy) = self.greedy_at(&step.state);
                self.greedy_expectation(&step.state, &legal, &greedy)
            }
        }
    }

    /// Product of π/b over decisions `first..=last` (empty range gives 1).
    fn importance_ratio(&self, first: usize, last: usize) -> f64 {
        (first..=last)
            .map(|i| {
                let step = &self.trajectory[i];
                self.target_probability(step) / step.behavior_probability
            })
            .product()
    }

    fn sampled_return(&self, tau: usize, horizon: usize) -> f64 {
        let mut g = 0.0;
        for i in tau + 1..=horizon {
            g += self.gamma.powi((i - tau - 1) as i32) * self.trajectory[i - 1].reward;
        }
        if horizon < self.terminal_time {
            g += self.gamma.powi(self.n as i32) * self.bootstrap(horizon);
        }
        g
    }

    fn tree_backup_return(&self, tau: usize, horizon: usize) -> f64 {
        let mut g = if horizon == self.terminal_time {
            self.trajectory[horizon - 1].reward
        } else {
            self.trajectory[horizon - 1].reward + self.gamma * self.bootstrap(horizon)
        };
        for k in (tau + 1..horizon).rev() {
            let step = &self.trajectory[k];
            let (legal, greedy) = self.greedy_at(&step.state);
            let others: f64 = legal
                .iter()
                .filter(|action| **action != step.action)
                .map(|action| {
                    greedy_probability(action, &greedy) * self.values.action_value(&step.state, action)
                })
                .sum();
            let chosen = greedy_probability(&step.action, &greedy);
            g = self.trajectory[k - 1].reward + self.gamma * others + self.gamma * chosen * g;
        }
        g
    }

    /// Update the decision made at time `tau`.
    fn update_at(&mut self, tau: usize) {
        let horizon = (tau + self.n).min(self.terminal_time);
        let last_decision = self.terminal_time.saturating_sub(1);

        let (target, step_size) = match self.rule {
            NStepRule::Sarsa | NStepRule::ExpectedSarsa => {
                (self.sampled_return(tau, horizon), self.alpha)
            }
            NStepRule::OffPolicySarsa => {
                let rho = self.importance_ratio(tau + 1, (tau + self.n).min(last_decision));
                (self.sampled_return(tau, horizon), self.alpha * rho)
            }
            NStepRule::OffPolicyExpectedSarsa => {
                let rho = self.importance_ratio(tau + 1, (tau + self.n - 1).min(last_decision));
                (self.sampled_return(tau, horizon), self.alpha * rho)
            }
            NStepRule::TreeBackup => (self.tree_backup_return(tau, horizon), self.alpha),
        };

        let afterstate = self.trajectory[tau].afterstate();
        self.values.step_towards(&afterstate, target, step_size);
        self.behavior.decay_after_step();
    }
}

impl Agent for NStepAgent {
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
        self.current_time = 0;
        self.terminal_time = usize::MAX;
        self.update_time = 0;
    }

    fn step(&mut self, game: &Game, is_evaluation: bool) -> Result<Action> {
        let state = game.state();
        let (legal, greedy) = candidates(&self.values, state)?;
        let action = choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)?;

        if !is_evaluation {
            let probability = self.behavior.probability(&action, &legal, &greedy);
            self.trajectory
                .push(TimeStep::new(state.clone(), action, probability));
            self.current_time = self.trajectory.len() - 1;
            if self.current_time >= self.n {
                let tau = self.current_time - self.n;
                self.update_at(tau);
                self.update_time = tau + 1;
            }
        }

        self.core.set_current_state(state.child(&action));
        Ok(action)
    }

    fn policy(&mut self, state: &State, is_evaluation: bool) -> Result<Action> {
        let (legal, greedy) = candidates(&self.values, state)?;
        choose(&mut self.behavior, state, &legal, &greedy, is_evaluation)
    }

    /// Record the final reward and flush every pending update.
    fn update(&mut self, _prior: &State, current: &State, reward: Reward) {
        if let Some(last) = self.trajectory.last_mut() {
            last.reward = reward;
            self.terminal_time = self.trajectory.len();
            for tau in self.update_time..self.terminal_time {
                self.update_at(tau);
            }
            self.update_time = self.terminal_time;
        }
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
