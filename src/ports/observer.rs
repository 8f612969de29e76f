//! Observer port - abstraction for watching training and evaluation runs
//!
//! Observers collect data from a run without coupling the game loop to any
//! particular output format.

use crate::{
    Result,
    identifiers::Seat,
    nim::{Action, State},
};

/// Observer trait for monitoring runs
///
/// # Event Sequence
///
/// 1. `on_run_start(total_episodes, is_evaluation)` - once
/// 2. For each episode:
///    - `on_episode_start(episode)`
///    - `on_move(...)` - for each move
///    - `on_episode_end(episode, winner)`
/// 3. `on_run_end()` - once
///
/// All methods default to doing nothing.
pub trait Observer: Send {
    fn on_run_start(&mut self, _total_episodes: usize, _is_evaluation: bool) -> Result<()> {
        Ok(())
    }

    fn on_episode_start(&mut self, _episode: usize) -> Result<()> {
        Ok(())
    }

    /// Called after an action is validated and before it is applied.
    ///
    /// * `state` - state the mover faced
    /// * `action` - action about to be applied
    fn on_move(
        &mut self,
        _episode: usize,
        _step: usize,
        _seat: Seat,
        _state: &State,
        _action: &Action,
    ) -> Result<()> {
        Ok(())
    }

    fn on_episode_end(&mut self, _episode: usize, _winner: Seat) -> Result<()> {
        Ok(())
    }

    fn on_run_end(&mut self) -> Result<()> {
        Ok(())
    }
}
