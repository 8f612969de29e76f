//! Common test utilities for the nim-rl test suite.
#![allow(dead_code)]

use nim_rl::{
    learning::ValueTable,
    nim::State,
    pipeline::{Game, MatchResult},
    ports::{SharedAgent, lock},
};

/// Train `first` against `second` from `initial`, returning the result.
pub fn train(
    first: &SharedAgent,
    second: &SharedAgent,
    initial: State,
    episodes: usize,
) -> MatchResult {
    let mut game = Game::new(initial);
    game.set_first_player(first).unwrap();
    game.set_second_player(second).unwrap();
    game.train(episodes).unwrap()
}

/// Play greedy evaluation episodes of `first` against `second`.
pub fn play(first: &SharedAgent, second: &SharedAgent, initial: State, episodes: usize) -> MatchResult {
    let mut game = Game::new(initial);
    game.set_first_player(first).unwrap();
    game.set_second_player(second).unwrap();
    game.play(episodes).unwrap()
}

/// Snapshot of an agent's value table.
pub fn values_of(agent: &SharedAgent) -> ValueTable {
    lock(agent).unwrap().values().expect("agent keeps values")
}
