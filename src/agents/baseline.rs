//! Baseline agents: uniform random, perfect (nim-sum) and human players

use std::{
    any::Any,
    io::{BufRead, Write},
};

use log::warn;
use rand::rngs::StdRng;

use crate::{
    Error, Result,
    learning::{policy::build_rng, sample_action},
    nim::{Action, State},
    ports::{Agent, AgentCore, agent::no_legal_actions},
};

/// Plays a uniformly random legal action.
#[derive(Debug, Clone)]
pub struct RandomAgent {
    name: String,
    core: AgentCore,
    rng: StdRng,
}

impl RandomAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            core: AgentCore::new(),
            rng: build_rng(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_rng_seed(seed);
        self
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn policy(&mut self, state: &State, _is_evaluation: bool) -> Result<Action> {
        sample_action(&state.legal_actions(), &mut self.rng).ok_or_else(|| no_legal_actions(state))
    }

    fn set_rng_seed(&mut self, seed: u64) {
        self.rng = build_rng(Some(seed));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Plays perfectly: moves to a nim-sum of zero whenever possible.
///
/// From a position with nim-sum zero every move loses, so it falls back to a
/// random legal action.
#[derive(Debug, Clone)]
pub struct OptimalAgent {
    name: String,
    core: AgentCore,
    rng: StdRng,
}

impl OptimalAgent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            core: AgentCore::new(),
            rng: build_rng(None),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_rng_seed(seed);
        self
    }

    /// Actions from `state` that leave a nim-sum of zero.
    pub fn winning_actions(state: &State) -> Vec<Action> {
        state
            .legal_actions()
            .into_iter()
            .filter(|action| state.child(action).nim_sum() == 0)
            .collect()
    }
}

impl Agent for OptimalAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn policy(&mut self, state: &State, _is_evaluation: bool) -> Result<Action> {
        let winning = Self::winning_actions(state);
        let candidates = if winning.is_empty() {
            state.legal_actions()
        } else {
            winning
        };
        sample_action(&candidates, &mut self.rng).ok_or_else(|| no_legal_actions(state))
    }

    fn set_rng_seed(&mut self, seed: u64) {
        self.rng = build_rng(Some(seed));
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reads its moves as `"<pile> <count>"` lines from a text stream.
pub struct HumanAgent<R, W> {
    name: String,
    core: AgentCore,
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> HumanAgent<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            name: "human".to_string(),
            core: AgentCore::new(),
            input,
            output,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn prompt(&mut self, state: &State) -> Result<()> {
        write!(self.output, "State: {state}\nYour move (pile count): ")
            .and_then(|()| self.output.flush())
            .map_err(|source| Error::Io {
                operation: "write prompt".to_string(),
                source,
            })
    }

    fn read_action(&mut self, state: &State) -> Result<Action> {
        loop {
            self.prompt(state)?;
            let mut line = String::new();
            let read = self.input.read_line(&mut line).map_err(|source| Error::Io {
                operation: "read action".to_string(),
                source,
            })?;
            if read == 0 {
                return Err(Error::InputClosed {
                    expected: "action".to_string(),
                });
            }

            match line.parse::<Action>() {
                Ok(action) if action.is_valid(state) => return Ok(action),
                Ok(action) => warn!("illegal move '{action}' in state {state}, try again"),
                Err(e) => warn!("{e}, try again"),
            }
        }
    }
}

impl<R, W> Agent for HumanAgent<R, W>
where
    R: BufRead + Send + 'static,
    W: Write + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn core(&self) -> &AgentCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut AgentCore {
        &mut self.core
    }

    fn policy(&mut self, state: &State, _is_evaluation: bool) -> Result<Action> {
        if state.is_terminal() {
            return Err(no_legal_actions(state));
        }
        self.read_action(state)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_random_agent_plays_legal_moves() {
        let mut agent = RandomAgent::new("random").with_seed(9);
        let state = State::from([2, 0, 3]);
        for _ in 0..50 {
            let action = agent.policy(&state, false).unwrap();
            assert!(action.is_valid(&state));
        }
        assert!(matches!(
            agent.policy(&State::from([0, 0]), false),
            Err(Error::NoLegalActions { .. })
        ));
    }

    #[test]
    fn test_optimal_agent_moves_to_zero_nim_sum() {
        let mut agent = OptimalAgent::new("optimal").with_seed(4);
        for state in State::from([3, 4, 5]).all_states() {
            if state.is_terminal() || state.nim_sum() == 0 {
                continue;
            }
            let action = agent.policy(&state, true).unwrap();
            assert_eq!(state.child(&action).nim_sum(), 0, "state {state}");
        }
    }

    #[test]
    fn test_optimal_agent_falls_back_to_random() {
        let mut agent = OptimalAgent::new("optimal");
        let state = State::from([2, 2]);
        assert!(OptimalAgent::winning_actions(&state).is_empty());
        assert!(agent.policy(&state, true).unwrap().is_valid(&state));
    }

    #[test]
    fn test_human_agent_reprompts_on_bad_input() {
        let input = Cursor::new("banana\n5 1\n0 3\n");
        let mut output = Vec::new();
        let action = {
            let mut agent = HumanAgent::new(input, &mut output);
            agent.read_action(&State::from([3, 1])).unwrap()
        };
        assert_eq!(action, Action::new(0, 3));
        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Your move").count(), 3);
    }

    #[test]
    fn test_human_agent_input_closed() {
        let mut agent = HumanAgent::new(Cursor::new("9 9\n"), Vec::new());
        assert!(matches!(
            agent.policy(&State::from([1]), false),
            Err(Error::InputClosed { .. })
        ));
    }
}
