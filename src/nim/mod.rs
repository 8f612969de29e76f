//! Nim game primitives
//!
//! Piles of objects, actions that remove objects from one pile, and the
//! state-space utilities the learning agents build on.

pub mod action;
pub mod state;

pub use action::Action;
pub use state::State;
