//! Application layer: configuration of agents and lab runs.
//!
//! [`AgentConfig`] describes any agent variant and builds it as a
//! [`SharedAgent`](crate::ports::SharedAgent) ready to be seated in a game.
//! [`LabConfig`] describes a whole run and can be loaded from JSON.
//!
//! # Usage
//!
//! ```
//! use nim_rl::{
//!     app::{AgentConfig, AgentKind, LabConfig},
//!     pipeline::Game,
//! };
//!
//! let lab = LabConfig {
//!     piles: vec![1, 2, 3],
//!     episodes: 100,
//!     learner: AgentConfig::new(AgentKind::Sarsa),
//!     seed: Some(42),
//!     ..LabConfig::default()
//! };
//! let (learner, opponent) = lab.seeded();
//! let learner = learner.build()?;
//! let opponent = opponent.build()?;
//!
//! let mut game = Game::new(lab.initial_state());
//! game.set_first_player(&learner)?;
//! game.set_second_player(&opponent)?;
//! game.train(lab.episodes)?;
//! # Ok::<(), nim_rl::Error>(())
//! ```

pub mod config;

pub use config::{AgentConfig, AgentKind, LabConfig};
