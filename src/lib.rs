//! Tabular reinforcement learning on the game of Nim
//!
//! This crate provides:
//! - Nim positions and moves, with multiset identity and nim-sum
//! - A two-seat game orchestrator that trains or evaluates any pair of agents
//! - Baseline agents (random, optimal, human) and tabular learners: dynamic
//!   programming, Monte-Carlo control, one-step and double temporal
//!   difference control, and n-step methods including tree backup
//! - Serializable configuration for agents and whole lab runs
//! - A command-line driver

pub mod agents;
pub mod app;
pub mod cli;
pub mod error;
pub mod identifiers;
pub mod learning;
pub mod nim;
pub mod pipeline;
pub mod ports;

pub use error::{Error, Result};
