//! Game orchestration
//!
//! This module provides:
//! - The [`Game`] orchestrator that alternates two agents over a Nim state
//! - Match results for training and evaluation runs
//! - Observers that record runs as they happen

pub mod game;
pub mod observers;

pub use game::{Game, MatchResult};
pub use observers::{
    EpisodeObservation, JsonlObserver, MetricsObserver, MetricsSummary, MoveObservation,
    ProgressObserver,
};

pub use crate::ports::{Agent, Observer};
