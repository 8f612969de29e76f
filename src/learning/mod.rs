//! Tabular learning building blocks
//!
//! The value table every learning agent owns, the trajectory record used by
//! Monte-Carlo and n-step methods, and the action-selection strategies.

pub mod policy;
pub mod trajectory;
pub mod value_table;

pub use policy::{DecayCadence, EpsilonGreedy, greedy_probability, sample_action};
pub use trajectory::TimeStep;
pub use value_table::{ValueEntry, ValueTable};

/// Reward delivered to an agent.
pub type Reward = f64;

pub const DEFAULT_THRESHOLD: f64 = 1e-4;
pub const DEFAULT_ALPHA: f64 = 0.5;
pub const DEFAULT_GAMMA: f64 = 1.0;
pub const DEFAULT_EPSILON: f64 = 1.0;
pub const DEFAULT_EPSILON_DECAY: f64 = 0.9;
pub const DEFAULT_MIN_EPSILON: f64 = 0.01;
pub const DEFAULT_N: usize = 1;

/// Reward for removing the last object.
pub const WIN_REWARD: Reward = 1.0;
/// Reward for the player who could not move.
pub const LOSS_REWARD: Reward = -1.0;
