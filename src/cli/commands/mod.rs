//! CLI subcommands

use std::path::Path;

use anyhow::{Context, Result};

use crate::{
    app::LabConfig,
    identifiers::Seat,
    pipeline::{Game, JsonlObserver, MatchResult, ProgressObserver},
    ports::SharedAgent,
};

pub mod evaluate;
pub mod train;
pub mod values;

/// Learner and opponent after a training run.
pub(crate) struct TrainedLab {
    pub learner: SharedAgent,
    pub opponent: SharedAgent,
    pub result: MatchResult,
}

/// Build both agents of `lab` and train them against each other.
pub(crate) fn train_lab(
    lab: &LabConfig,
    learner_seat: Seat,
    progress: bool,
    observations: Option<&Path>,
) -> Result<TrainedLab> {
    let (learner_config, opponent_config) = lab.seeded();
    let learner = learner_config.build().context("Failed to build learner")?;
    let opponent = opponent_config.build().context("Failed to build opponent")?;

    let mut game = Game::new(lab.initial_state());
    if progress {
        game.add_observer(Box::new(ProgressObserver::new()));
    }
    if let Some(path) = observations {
        let observer = JsonlObserver::new(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        game.add_observer(Box::new(observer));
    }
    game.set_player(learner_seat, &learner)?;
    game.set_player(learner_seat.opponent(), &opponent)?;

    let result = game.train(lab.episodes)?;
    Ok(TrainedLab {
        learner,
        opponent,
        result,
    })
}
