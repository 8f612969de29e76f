//! Command-line interface of the Nim reinforcement-learning lab
//!
//! Subcommands train a learner, evaluate it against a fixed opponent, and
//! dump the values found by dynamic programming.

pub mod commands;
pub mod config;
pub mod output;
