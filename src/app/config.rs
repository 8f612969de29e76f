//! Configuration types for agent creation and lab runs.

use std::{
    fmt,
    io::{BufReader, stdin, stdout},
    path::Path,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    agents::{
        DoubleTemporalDifferenceAgent, DpMethod, DynamicProgrammingAgent, HumanAgent,
        ImportanceSampling, MonteCarloAgent, MonteCarloMode, NStepAgent, NStepRule, OptimalAgent,
        RandomAgent, TdRule, TemporalDifferenceAgent,
    },
    learning::{
        DEFAULT_ALPHA, DEFAULT_EPSILON, DEFAULT_EPSILON_DECAY, DEFAULT_GAMMA, DEFAULT_MIN_EPSILON,
        DEFAULT_N, DEFAULT_THRESHOLD, DecayCadence, EpsilonGreedy,
    },
    nim::State,
    ports::{Agent, SharedAgent, share},
};

/// Every agent variant the lab can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// Uniformly random legal moves
    Random,
    /// Perfect play from the nim-sum
    Optimal,
    /// Moves typed on standard input
    Human,
    /// Dynamic programming: policy iteration
    PolicyIteration,
    /// Dynamic programming: value iteration
    ValueIteration,
    /// On-policy first-visit Monte-Carlo
    OnPolicyMc,
    /// Off-policy Monte-Carlo with importance sampling
    OffPolicyMc,
    /// Monte-Carlo with exploring starts
    ExploringStartsMc,
    /// Q-learning (off-policy TD control)
    QLearning,
    /// SARSA (on-policy TD control)
    Sarsa,
    /// Expected SARSA
    ExpectedSarsa,
    /// Double Q-learning
    DoubleQLearning,
    /// Double SARSA
    DoubleSarsa,
    /// Double Expected SARSA
    DoubleExpectedSarsa,
    /// n-step SARSA
    NStepSarsa,
    /// n-step Expected SARSA
    NStepExpectedSarsa,
    /// Off-policy n-step SARSA
    OffPolicyNStepSarsa,
    /// Off-policy n-step Expected SARSA
    OffPolicyNStepExpectedSarsa,
    /// n-step tree backup
    NStepTreeBackup,
}

impl AgentKind {
    /// Whether the agent improves from experience during training.
    pub fn learns_online(self) -> bool {
        !matches!(
            self,
            AgentKind::Random
                | AgentKind::Optimal
                | AgentKind::Human
                | AgentKind::PolicyIteration
                | AgentKind::ValueIteration
        )
    }

    /// Whether the agent keeps a value table.
    pub fn has_values(self) -> bool {
        !matches!(self, AgentKind::Random | AgentKind::Optimal | AgentKind::Human)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Configuration for creating an agent.
///
/// Fields that do not apply to the chosen kind are ignored.
///
/// # Examples
///
/// ```
/// use nim_rl::app::{AgentConfig, AgentKind};
///
/// let agent = AgentConfig::new(AgentKind::NStepTreeBackup)
///     .with_n(3)
///     .with_alpha(0.2)
///     .with_seed(42)
///     .build()?;
/// # Ok::<(), nim_rl::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    /// Display name; defaults to the algorithm's name
    pub name: Option<String>,
    /// Step size α
    pub alpha: f64,
    /// Discount γ
    pub gamma: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    /// Multiplicative exploration decay
    pub epsilon_decay: f64,
    /// Exploration floor
    pub min_epsilon: f64,
    pub decay_cadence: DecayCadence,
    /// Lookahead of n-step agents
    pub n: usize,
    /// Convergence threshold of dynamic programming
    pub threshold: f64,
    /// Estimator of off-policy Monte-Carlo
    pub importance_sampling: ImportanceSampling,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl AgentConfig {
    pub fn new(kind: AgentKind) -> Self {
        Self {
            kind,
            name: None,
            alpha: DEFAULT_ALPHA,
            gamma: DEFAULT_GAMMA,
            epsilon: DEFAULT_EPSILON,
            epsilon_decay: DEFAULT_EPSILON_DECAY,
            min_epsilon: DEFAULT_MIN_EPSILON,
            decay_cadence: DecayCadence::default(),
            n: DEFAULT_N,
            threshold: DEFAULT_THRESHOLD,
            importance_sampling: ImportanceSampling::default(),
            seed: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
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

    /// Set initial exploration rate, decay factor and floor.
    pub fn with_epsilon(mut self, epsilon: f64, epsilon_decay: f64, min_epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self.epsilon_decay = epsilon_decay;
        self.min_epsilon = min_epsilon;
        self
    }

    pub fn with_decay_cadence(mut self, cadence: DecayCadence) -> Self {
        self.decay_cadence = cadence;
        self
    }

    pub fn with_n(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_importance_sampling(mut self, importance_sampling: ImportanceSampling) -> Self {
        self.importance_sampling = importance_sampling;
        self
    }

    /// Set the random seed for deterministic behavior.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::InvalidConfiguration { message });
        let unit = 0.0..=1.0;
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return invalid(format!("alpha must be in (0, 1], got {}", self.alpha));
        }
        if !unit.contains(&self.gamma) {
            return invalid(format!("gamma must be in [0, 1], got {}", self.gamma));
        }
        if !unit.contains(&self.epsilon) {
            return invalid(format!("epsilon must be in [0, 1], got {}", self.epsilon));
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return invalid(format!(
                "epsilon_decay must be in (0, 1], got {}",
                self.epsilon_decay
            ));
        }
        if !unit.contains(&self.min_epsilon) {
            return invalid(format!(
                "min_epsilon must be in [0, 1], got {}",
                self.min_epsilon
            ));
        }
        if self.n == 0 {
            return invalid("n must be at least 1".to_string());
        }
        if self.threshold.is_nan() || self.threshold <= 0.0 {
            return invalid(format!("threshold must be positive, got {}", self.threshold));
        }
        Ok(())
    }

    fn behavior(&self) -> EpsilonGreedy {
        EpsilonGreedy::new(self.epsilon, self.epsilon_decay, self.min_epsilon)
            .with_cadence(self.decay_cadence)
    }

    /// Validate and build the configured agent.
    pub fn build(&self) -> Result<SharedAgent> {
        self.validate()?;
        let name = |default: &str| self.name.clone().unwrap_or_else(|| default.to_string());
        let agent = match self.kind {
            AgentKind::Random => self.finish(RandomAgent::new(name("random"))),
            AgentKind::Optimal => self.finish(OptimalAgent::new(name("optimal"))),
            AgentKind::Human => self.finish(
                HumanAgent::new(BufReader::new(stdin()), stdout()).with_name(name("human")),
            ),
            AgentKind::PolicyIteration => self.finish(self.dp(DpMethod::PolicyIteration)),
            AgentKind::ValueIteration => self.finish(self.dp(DpMethod::ValueIteration)),
            AgentKind::OnPolicyMc => self.finish(self.monte_carlo(MonteCarloMode::OnPolicy)),
            AgentKind::OffPolicyMc => self.finish(
                self.monte_carlo(MonteCarloMode::OffPolicy(self.importance_sampling)),
            ),
            AgentKind::ExploringStartsMc => {
                self.finish(self.monte_carlo(MonteCarloMode::ExploringStarts))
            }
            AgentKind::QLearning => self.finish(self.td(TdRule::QLearning)),
            AgentKind::Sarsa => self.finish(self.td(TdRule::Sarsa)),
            AgentKind::ExpectedSarsa => self.finish(self.td(TdRule::ExpectedSarsa)),
            AgentKind::DoubleQLearning => self.finish(self.double(TdRule::QLearning)),
            AgentKind::DoubleSarsa => self.finish(self.double(TdRule::Sarsa)),
            AgentKind::DoubleExpectedSarsa => self.finish(self.double(TdRule::ExpectedSarsa)),
            AgentKind::NStepSarsa => self.finish(self.n_step(NStepRule::Sarsa)),
            AgentKind::NStepExpectedSarsa => self.finish(self.n_step(NStepRule::ExpectedSarsa)),
            AgentKind::OffPolicyNStepSarsa => self.finish(self.n_step(NStepRule::OffPolicySarsa)),
            AgentKind::OffPolicyNStepExpectedSarsa => {
                self.finish(self.n_step(NStepRule::OffPolicyExpectedSarsa))
            }
            AgentKind::NStepTreeBackup => self.finish(self.n_step(NStepRule::TreeBackup)),
        };
        Ok(agent)
    }

    fn finish<A: Agent + 'static>(&self, mut agent: A) -> SharedAgent {
        if let Some(seed) = self.seed {
            agent.set_rng_seed(seed);
        }
        share(agent)
    }

    fn dp(&self, method: DpMethod) -> DynamicProgrammingAgent {
        let agent = DynamicProgrammingAgent::new(method)
            .with_threshold(self.threshold)
            .with_gamma(self.gamma);
        match &self.name {
            Some(name) => agent.with_name(name.clone()),
            None => agent,
        }
    }

    fn monte_carlo(&self, mode: MonteCarloMode) -> MonteCarloAgent {
        let agent = MonteCarloAgent::new(mode)
            .with_gamma(self.gamma)
            .with_policy(self.behavior());
        match &self.name {
            Some(name) => agent.with_name(name.clone()),
            None => agent,
        }
    }

    fn td(&self, rule: TdRule) -> TemporalDifferenceAgent {
        let agent = TemporalDifferenceAgent::new(rule)
            .with_alpha(self.alpha)
            .with_gamma(self.gamma)
            .with_policy(self.behavior());
        match &self.name {
            Some(name) => agent.with_name(name.clone()),
            None => agent,
        }
    }

    fn double(&self, rule: TdRule) -> DoubleTemporalDifferenceAgent {
        let agent = DoubleTemporalDifferenceAgent::new(rule)
            .with_alpha(self.alpha)
            .with_gamma(self.gamma)
            .with_policy(self.behavior());
        match &self.name {
            Some(name) => agent.with_name(name.clone()),
            None => agent,
        }
    }

    fn n_step(&self, rule: NStepRule) -> NStepAgent {
        let agent = NStepAgent::new(rule, self.n)
            .with_alpha(self.alpha)
            .with_gamma(self.gamma)
            .with_policy(self.behavior());
        match &self.name {
            Some(name) => agent.with_name(name.clone()),
            None => agent,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(AgentKind::QLearning)
    }
}

/// Configuration of a full lab run: one learner trained against an opponent
/// and evaluated afterwards.
///
/// Loadable from JSON; every field is optional.
///
/// ```json
/// {
///   "piles": [10, 10, 10],
///   "episodes": 20000,
///   "learner": { "kind": "q-learning", "alpha": 0.99 },
///   "opponent": { "kind": "optimal" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabConfig {
    /// Initial pile sizes
    pub piles: Vec<u32>,
    /// Number of training episodes
    pub episodes: usize,
    /// Number of evaluation episodes
    pub evaluation_episodes: usize,
    /// Seed for agents that do not set their own
    pub seed: Option<u64>,
    pub learner: AgentConfig,
    pub opponent: AgentConfig,
}

impl LabConfig {
    /// Load a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::Io {
            operation: format!("open config {}", path.display()),
            source,
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_state().is_terminal() {
            return Err(Error::InvalidConfiguration {
                message: format!("piles {:?} leave no move to play", self.piles),
            });
        }
        self.learner.validate()?;
        self.opponent.validate()
    }

    pub fn initial_state(&self) -> State {
        State::new(self.piles.clone())
    }

    /// Learner and opponent configurations with the lab seed filled in where
    /// they have none (the opponent gets `seed + 1`).
    pub fn seeded(&self) -> (AgentConfig, AgentConfig) {
        let mut learner = self.learner.clone();
        let mut opponent = self.opponent.clone();
        if let Some(seed) = self.seed {
            learner.seed = learner.seed.or(Some(seed));
            opponent.seed = opponent.seed.or(Some(seed.wrapping_add(1)));
        }
        (learner, opponent)
    }
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            piles: vec![3, 4, 5],
            episodes: 20_000,
            evaluation_episodes: 1_000,
            seed: None,
            learner: AgentConfig::new(AgentKind::QLearning),
            opponent: AgentConfig::new(AgentKind::Optimal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::lock;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.gamma, 1.0);
        assert_eq!(config.epsilon, 1.0);
        assert_eq!(config.epsilon_decay, 0.9);
        assert_eq!(config.min_epsilon, 0.01);
        assert_eq!(config.n, 1);
        assert_eq!(config.threshold, 1e-4);
        assert_eq!(config.decay_cadence, DecayCadence::PerEpisode);
    }

    #[test]
    fn test_validation_rejects_bad_parameters() {
        assert!(AgentConfig::default().validate().is_ok());
        for config in [
            AgentConfig::default().with_alpha(0.0),
            AgentConfig::default().with_gamma(1.5),
            AgentConfig::default().with_epsilon(0.1, 0.9, 1.5),
            AgentConfig::new(AgentKind::NStepSarsa).with_n(0),
            AgentConfig::new(AgentKind::ValueIteration).with_threshold(0.0),
        ] {
            assert!(matches!(
                config.validate(),
                Err(Error::InvalidConfiguration { .. })
            ));
        }
    }

    #[test]
    fn test_build_every_kind() {
        for kind in AgentKind::value_variants() {
            if *kind == AgentKind::Human {
                continue;
            }
            let agent = AgentConfig::new(*kind).with_seed(1).build().unwrap();
            let guard = lock(&agent).unwrap();
            assert_eq!(guard.values().is_some(), kind.has_values(), "{kind:?}");
            assert!(!guard.name().is_empty());
        }
    }

    #[test]
    fn test_kind_names_match_config_format() {
        assert_eq!(AgentKind::NStepTreeBackup.to_string(), "n-step-tree-backup");
        assert_eq!(
            serde_json::to_string(&AgentKind::OffPolicyMc).unwrap(),
            "\"off-policy-mc\""
        );
    }

    #[test]
    fn test_custom_name() {
        let agent = AgentConfig::new(AgentKind::Sarsa)
            .with_name("learner")
            .build()
            .unwrap();
        assert_eq!(lock(&agent).unwrap().name(), "learner");
    }

    #[test]
    fn test_lab_config_from_partial_json() {
        let json = r#"{
            "piles": [1, 2, 3],
            "seed": 7,
            "learner": { "kind": "n-step-tree-backup", "n": 3 },
            "opponent": { "kind": "random", "seed": 99 }
        }"#;
        let config: LabConfig = serde_json::from_str(json).unwrap();
        config.validate().unwrap();
        assert_eq!(config.episodes, 20_000);
        assert_eq!(config.learner.kind, AgentKind::NStepTreeBackup);
        assert_eq!(config.learner.alpha, 0.5);

        let (learner, opponent) = config.seeded();
        assert_eq!(learner.seed, Some(7));
        assert_eq!(opponent.seed, Some(99));
    }

    #[test]
    fn test_lab_config_rejects_empty_game() {
        let config = LabConfig {
            piles: vec![0, 0],
            ..LabConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lab.json");
        let config = LabConfig::default();
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();
        assert_eq!(LabConfig::load(&path).unwrap(), config);
    }
}
