//! Action-selection strategies shared by the learning agents

use clap::ValueEnum;
use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};
use serde::{Deserialize, Serialize};

use super::{DEFAULT_EPSILON, DEFAULT_EPSILON_DECAY, DEFAULT_MIN_EPSILON};
use crate::nim::Action;

pub(crate) fn build_rng(seed: Option<u64>) -> StdRng {
    if let Some(seed) = seed {
        StdRng::seed_from_u64(seed)
    } else {
        StdRng::from_rng(&mut rand::rng())
    }
}

/// Uniform pick from `actions`.
pub fn sample_action(actions: &[Action], rng: &mut StdRng) -> Option<Action> {
    actions.choose(rng).copied()
}

/// Probability of `action` under the greedy policy that breaks ties uniformly.
pub fn greedy_probability(action: &Action, greedy: &[Action]) -> f64 {
    if greedy.contains(action) {
        1.0 / greedy.len() as f64
    } else {
        0.0
    }
}

/// When the exploration rate is decayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DecayCadence {
    /// After every learning update
    PerStep,
    /// Once at the end of every training episode
    #[default]
    PerEpisode,
}

/// ε-greedy selection with multiplicative decay towards a floor.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    epsilon_decay: f64,
    min_epsilon: f64,
    cadence: DecayCadence,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(epsilon: f64, epsilon_decay: f64, min_epsilon: f64) -> Self {
        Self {
            epsilon,
            epsilon_decay,
            min_epsilon,
            cadence: DecayCadence::default(),
            rng: build_rng(None),
        }
    }

    pub fn with_cadence(mut self, cadence: DecayCadence) -> Self {
        self.cadence = cadence;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon;
    }

    pub fn epsilon_decay(&self) -> f64 {
        self.epsilon_decay
    }

    pub fn set_epsilon_decay(&mut self, epsilon_decay: f64) {
        self.epsilon_decay = epsilon_decay;
    }

    pub fn min_epsilon(&self) -> f64 {
        self.min_epsilon
    }

    pub fn cadence(&self) -> DecayCadence {
        self.cadence
    }

    /// Decay epsilon, never below the floor
    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.epsilon_decay).max(self.min_epsilon);
    }

    pub fn decay_after_step(&mut self) {
        if self.cadence == DecayCadence::PerStep {
            self.decay();
        }
    }

    pub fn decay_after_episode(&mut self) {
        if self.cadence == DecayCadence::PerEpisode {
            self.decay();
        }
    }

    /// ε-greedy action selection
    ///
    /// One uniform draw decides between exploring (uniform over `legal`) and
    /// exploiting (uniform over `greedy`).
    pub fn select(&mut self, legal: &[Action], greedy: &[Action]) -> Option<Action> {
        if self.rng.random::<f64>() < self.epsilon {
            sample_action(legal, &mut self.rng)
        } else {
            sample_action(greedy, &mut self.rng)
        }
    }

    /// Uniform pick among tied greedy actions.
    pub fn select_greedy(&mut self, greedy: &[Action]) -> Option<Action> {
        sample_action(greedy, &mut self.rng)
    }

    /// Uniform pick among legal actions.
    pub fn select_random(&mut self, legal: &[Action]) -> Option<Action> {
        sample_action(legal, &mut self.rng)
    }

    /// Probability that [`EpsilonGreedy::select`] returns `action`.
    pub fn probability(&self, action: &Action, legal: &[Action], greedy: &[Action]) -> f64 {
        if legal.is_empty() {
            return 0.0;
        }
        let explore = self.epsilon / legal.len() as f64;
        explore + (1.0 - self.epsilon) * greedy_probability(action, greedy)
    }
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self::new(DEFAULT_EPSILON, DEFAULT_EPSILON_DECAY, DEFAULT_MIN_EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::nim::State;

    fn actions() -> (Vec<Action>, Vec<Action>) {
        let legal = State::from([3, 2]).legal_actions();
        let greedy = vec![legal[1], legal[3]];
        (legal, greedy)
    }

    #[test]
    fn test_zero_epsilon_always_greedy() {
        let (legal, greedy) = actions();
        let mut policy = EpsilonGreedy::new(0.0, 1.0, 0.0).with_seed(3);
        let mut picked = HashSet::new();
        for _ in 0..200 {
            let action = policy.select(&legal, &greedy).unwrap();
            assert!(greedy.contains(&action));
            picked.insert(action);
        }
        // Ties are broken uniformly, so both greedy actions show up
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_full_epsilon_covers_all_legal_actions() {
        let (legal, greedy) = actions();
        let mut policy = EpsilonGreedy::new(1.0, 1.0, 1.0).with_seed(5);
        let mut counts = vec![0usize; legal.len()];
        for _ in 0..5000 {
            let action = policy.select(&legal, &greedy).unwrap();
            let index = legal.iter().position(|a| *a == action).unwrap();
            counts[index] += 1;
        }
        let expected = 5000.0 / legal.len() as f64;
        for count in counts {
            assert!((count as f64 - expected).abs() < expected * 0.2);
        }
    }

    #[test]
    fn test_same_seed_same_choices() {
        let (legal, greedy) = actions();
        let mut a = EpsilonGreedy::new(0.5, 1.0, 0.0).with_seed(11);
        let mut b = EpsilonGreedy::new(0.5, 1.0, 0.0).with_seed(11);
        for _ in 0..50 {
            assert_eq!(a.select(&legal, &greedy), b.select(&legal, &greedy));
        }
    }

    #[test]
    fn test_decay_respects_floor() {
        let mut policy = EpsilonGreedy::new(1.0, 0.5, 0.2);
        policy.decay();
        assert_eq!(policy.epsilon(), 0.5);
        policy.decay();
        policy.decay();
        assert_eq!(policy.epsilon(), 0.2);
    }

    #[test]
    fn test_cadence_gates_decay() {
        let mut per_episode = EpsilonGreedy::new(1.0, 0.5, 0.0);
        per_episode.decay_after_step();
        assert_eq!(per_episode.epsilon(), 1.0);
        per_episode.decay_after_episode();
        assert_eq!(per_episode.epsilon(), 0.5);

        let mut per_step = EpsilonGreedy::new(1.0, 0.5, 0.0).with_cadence(DecayCadence::PerStep);
        per_step.decay_after_episode();
        assert_eq!(per_step.epsilon(), 1.0);
        per_step.decay_after_step();
        assert_eq!(per_step.epsilon(), 0.5);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (legal, greedy) = actions();
        let policy = EpsilonGreedy::new(0.3, 1.0, 0.0);
        let total: f64 = legal
            .iter()
            .map(|action| policy.probability(action, &legal, &greedy))
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(policy.probability(&greedy[0], &legal, &greedy) > 0.3 / 5.0);
    }
}
