//! Shared arguments for CLI commands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::{
    agents::ImportanceSampling,
    app::{AgentConfig, AgentKind, LabConfig},
    identifiers::Seat,
    learning::{
        DEFAULT_ALPHA, DEFAULT_EPSILON, DEFAULT_EPSILON_DECAY, DEFAULT_GAMMA, DEFAULT_MIN_EPSILON,
        DEFAULT_N, DEFAULT_THRESHOLD, DecayCadence,
    },
    nim::State,
};

/// Parse a pile list such as `3,4,5` or `"3 4 5"`.
pub fn parse_piles(s: &str) -> crate::Result<State> {
    s.replace(',', " ").parse()
}

/// Arguments describing a lab run: who learns, against whom, on which piles.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Learning agent
    #[arg(value_enum, default_value_t = AgentKind::QLearning)]
    pub learner: AgentKind,

    /// Opponent to train against
    #[arg(long, short = 'o', value_enum, default_value_t = AgentKind::Optimal)]
    pub opponent: AgentKind,

    /// Train against a second instance of the learner
    #[arg(long, conflicts_with = "opponent")]
    pub self_play: bool,

    /// Learner moves second
    #[arg(long)]
    pub second: bool,

    /// Initial piles, e.g. `3,4,5`
    #[arg(long, short = 'p', default_value = "3,4,5", value_parser = parse_piles)]
    pub piles: State,

    /// Number of training episodes
    #[arg(long, short = 'e', default_value_t = 20_000)]
    pub episodes: usize,

    /// Number of evaluation episodes per seat
    #[arg(long, default_value_t = 1_000)]
    pub evaluation_episodes: usize,

    /// Load the run from a JSON lab configuration (agent flags are ignored)
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    pub seed: Option<u64>,

    /// Step size
    #[arg(long, default_value_t = DEFAULT_ALPHA)]
    pub alpha: f64,

    /// Discount factor
    #[arg(long, default_value_t = DEFAULT_GAMMA)]
    pub gamma: f64,

    /// Initial exploration rate
    #[arg(long, default_value_t = DEFAULT_EPSILON)]
    pub epsilon: f64,

    /// Multiplicative exploration decay
    #[arg(long, default_value_t = DEFAULT_EPSILON_DECAY)]
    pub epsilon_decay: f64,

    /// Exploration floor
    #[arg(long, default_value_t = DEFAULT_MIN_EPSILON)]
    pub min_epsilon: f64,

    /// When exploration decays
    #[arg(long, value_enum, default_value_t = DecayCadence::PerEpisode)]
    pub decay_cadence: DecayCadence,

    /// Lookahead of n-step agents
    #[arg(long, short = 'n', default_value_t = DEFAULT_N)]
    pub n: usize,

    /// Convergence threshold of dynamic programming
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Importance-sampling estimator of off-policy Monte-Carlo
    #[arg(long, value_enum, default_value_t = ImportanceSampling::Weighted)]
    pub importance_sampling: ImportanceSampling,
}

impl RunArgs {
    pub fn learner_seat(&self) -> Seat {
        if self.second { Seat::Second } else { Seat::First }
    }

    fn agent(&self, kind: AgentKind) -> AgentConfig {
        AgentConfig::new(kind)
            .with_alpha(self.alpha)
            .with_gamma(self.gamma)
            .with_epsilon(self.epsilon, self.epsilon_decay, self.min_epsilon)
            .with_decay_cadence(self.decay_cadence)
            .with_n(self.n)
            .with_threshold(self.threshold)
            .with_importance_sampling(self.importance_sampling)
    }

    /// Resolve the arguments into a validated lab configuration.
    pub fn lab_config(&self) -> Result<LabConfig> {
        let mut lab = match &self.config {
            Some(path) => LabConfig::load(path)
                .with_context(|| format!("Failed to load lab config {}", path.display()))?,
            None => {
                let learner = self.agent(self.learner);
                let opponent = if self.self_play {
                    self.agent(self.learner)
                        .with_name(format!("{} (self-play)", self.learner))
                } else {
                    AgentConfig::new(self.opponent)
                };
                LabConfig {
                    piles: self.piles.piles().to_vec(),
                    episodes: self.episodes,
                    evaluation_episodes: self.evaluation_episodes,
                    seed: None,
                    learner,
                    opponent,
                }
            }
        };
        if self.seed.is_some() {
            lab.seed = self.seed;
        }
        lab.validate().context("Invalid lab configuration")?;
        Ok(lab)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        run: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        let argv = std::iter::once("nim-rl").chain(args.iter().copied());
        Harness::try_parse_from(argv).unwrap().run
    }

    #[test]
    fn test_parse_piles_accepts_commas_and_spaces() {
        assert_eq!(parse_piles("3,4,5").unwrap(), State::from([3, 4, 5]));
        assert_eq!(parse_piles("3 4 5").unwrap(), State::from([3, 4, 5]));
        assert!(parse_piles("3,x").is_err());
    }

    #[test]
    fn test_defaults_build_q_learning_against_optimal() {
        let lab = parse(&[]).lab_config().unwrap();
        assert_eq!(lab.piles, vec![3, 4, 5]);
        assert_eq!(lab.learner.kind, AgentKind::QLearning);
        assert_eq!(lab.opponent.kind, AgentKind::Optimal);
        assert_eq!(lab.seed, None);
    }

    #[test]
    fn test_self_play_copies_learner_settings() {
        let run = parse(&["sarsa", "--self-play", "--alpha", "0.2", "--seed", "3"]);
        let lab = run.lab_config().unwrap();
        assert_eq!(lab.opponent.kind, AgentKind::Sarsa);
        assert_eq!(lab.opponent.alpha, 0.2);
        assert_eq!(lab.opponent.name.as_deref(), Some("sarsa (self-play)"));
        assert_eq!(lab.seed, Some(3));
    }

    #[test]
    fn test_invalid_parameters_are_rejected() {
        assert!(parse(&["n-step-sarsa", "-n", "0"]).lab_config().is_err());
        assert!(parse(&["--piles", "0,0"]).lab_config().is_err());
    }

    #[test]
    fn test_second_seat() {
        assert_eq!(parse(&["--second"]).learner_seat(), Seat::Second);
        assert_eq!(parse(&[]).learner_seat(), Seat::First);
    }
}
