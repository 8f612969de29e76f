//! Ports (trait boundaries) between the game loop and its collaborators.
//!
//! Agents and observers are defined here and implemented elsewhere, so the
//! orchestrator depends only on these traits.

pub mod agent;
pub mod observer;

pub use agent::{Agent, AgentCore, SharedAgent, lock, share};
pub use observer::Observer;
