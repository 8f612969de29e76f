//! Concrete agents
//!
//! ## Families
//!
//! | Module | Agent | Variants |
//! |--------|-------|----------|
//! | [`dp`] | [`DynamicProgrammingAgent`] | policy iteration, value iteration |
//! | [`monte_carlo`] | [`MonteCarloAgent`] | on-policy, off-policy (weighted / ordinary IS), exploring starts |
//! | [`td`] | [`TemporalDifferenceAgent`] | Q-learning, SARSA, Expected SARSA |
//! | [`double`] | [`DoubleTemporalDifferenceAgent`] | double Q-learning, double SARSA, double Expected SARSA |
//! | [`n_step`] | [`NStepAgent`] | SARSA, Expected SARSA, off-policy SARSA, off-policy Expected SARSA, tree backup |
//! | [`baseline`] | [`RandomAgent`], [`OptimalAgent`], [`HumanAgent`] | - |
//!
//! All value-based agents store afterstate values: the value of taking `a` in
//! `s` is the value of `s.child(a)`, seen by the player who moved.
//!
//! ## Usage Example
//!
//! ```
//! use nim_rl::{
//!     agents::{OptimalAgent, TdRule, TemporalDifferenceAgent},
//!     nim::State,
//!     pipeline::Game,
//!     ports::share,
//! };
//!
//! let learner = share(TemporalDifferenceAgent::new(TdRule::QLearning).with_seed(7));
//! let optimal = share(OptimalAgent::new("optimal"));
//!
//! let mut game = Game::new(State::from([3, 4, 5]));
//! game.set_first_player(&learner)?;
//! game.set_second_player(&optimal)?;
//! game.train(200)?;
//! let result = game.play(20)?;
//! println!("learner won {:.1}%", result.first_win_rate * 100.0);
//! # Ok::<(), nim_rl::Error>(())
//! ```

pub mod baseline;
pub mod double;
pub mod dp;
pub mod monte_carlo;
pub mod n_step;
pub mod td;

pub use baseline::{HumanAgent, OptimalAgent, RandomAgent};
pub use double::DoubleTemporalDifferenceAgent;
pub use dp::{DpMethod, DynamicProgrammingAgent};
pub use monte_carlo::{ImportanceSampling, MonteCarloAgent, MonteCarloMode};
pub use n_step::{NStepAgent, NStepRule};
pub use td::{TdRule, TemporalDifferenceAgent};

use crate::{learning::ValueTable, nim::State};

/// Fraction of winning positions in `states` where every greedy action under
/// `values` moves to a nim-sum of zero.
///
/// Positions with nim-sum zero have no winning move and are skipped. Returns
/// 1.0 when no state qualifies.
pub fn optimal_actions_ratio(values: &ValueTable, states: &[State]) -> f64 {
    let mut winning = 0usize;
    let mut optimal = 0usize;
    for state in states {
        if state.is_terminal() || state.nim_sum() == 0 {
            continue;
        }
        winning += 1;
        let greedy = values.greedy_actions(state, &state.legal_actions());
        if greedy
            .iter()
            .all(|action| state.child(action).nim_sum() == 0)
        {
            optimal += 1;
        }
    }
    if winning == 0 {
        1.0
    } else {
        optimal as f64 / winning as f64
    }
}
