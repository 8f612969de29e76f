//! Game orchestrator: alternates turns between two agents over one state

use std::sync::{Arc, Weak};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    identifiers::{GameId, Seat},
    learning::{LOSS_REWARD, WIN_REWARD},
    nim::State,
    ports::{Agent, Observer, SharedAgent, lock},
};

type AgentSlot = Option<Weak<std::sync::Mutex<dyn Agent>>>;

/// Result of a training or evaluation run, from the seats' perspective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub first_player: String,
    pub second_player: String,
    pub episodes: usize,
    pub first_wins: usize,
    pub second_wins: usize,
    pub first_win_rate: f64,
    pub second_win_rate: f64,
}

impl MatchResult {
    pub fn new(
        first_player: String,
        second_player: String,
        first_wins: usize,
        second_wins: usize,
    ) -> Self {
        let episodes = first_wins + second_wins;
        let rate = |wins: usize| {
            if episodes > 0 {
                wins as f64 / episodes as f64
            } else {
                0.0
            }
        };
        Self {
            first_player,
            second_player,
            episodes,
            first_wins,
            second_wins,
            first_win_rate: rate(first_wins),
            second_win_rate: rate(second_wins),
        }
    }

    pub fn wins(&self, seat: Seat) -> usize {
        match seat {
            Seat::First => self.first_wins,
            Seat::Second => self.second_wins,
        }
    }

    /// Save result to JSON file
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load result from JSON file
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let result = serde_json::from_reader(file)?;
        Ok(result)
    }
}

/// A Nim game between two attached agents.
///
/// The game keeps only weak references to its agents; each agent records the
/// ids of the games it is attached to. Dropping the game detaches it.
pub struct Game {
    id: GameId,
    initial: State,
    state: State,
    state_space: Vec<State>,
    players: [AgentSlot; 2],
    observers: Vec<Box<dyn Observer>>,
}

impl Game {
    /// Create a game that starts every episode from `initial`.
    pub fn new(initial: State) -> Self {
        let state_space = initial.all_states();
        Self {
            id: GameId::next(),
            state: initial.clone(),
            initial,
            state_space,
            players: [None, None],
            observers: Vec::new(),
        }
    }

    /// Add an observer to the game
    pub fn with_observer(mut self, observer: Box<dyn Observer>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    pub fn id(&self) -> GameId {
        self.id
    }

    /// The state agents act on.
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Overwrite the current state (used to drive agents by hand).
    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    pub fn initial(&self) -> &State {
        &self.initial
    }

    /// Every position reachable from the initial state.
    pub fn state_space(&self) -> &[State] {
        &self.state_space
    }

    pub fn set_first_player(&mut self, agent: &SharedAgent) -> Result<()> {
        self.set_player(Seat::First, agent)
    }

    pub fn set_second_player(&mut self, agent: &SharedAgent) -> Result<()> {
        self.set_player(Seat::Second, agent)
    }

    /// Attach `agent` to `seat`, initializing it with the state space.
    ///
    /// The agent previously in the seat is detached unless it also holds the
    /// other seat.
    pub fn set_player(&mut self, seat: Seat, agent: &SharedAgent) -> Result<()> {
        {
            let mut guard = lock(agent)?;
            guard.initialize(&self.state_space)?;
            guard.core_mut().attach(self.id);
        }

        let previous = self.players[seat.index()].replace(Arc::downgrade(agent));
        if let Some(previous) = previous.and_then(|weak| weak.upgrade())
            && !self.seats_of(&previous)
        {
            lock(&previous)?.core_mut().detach(self.id);
        }
        Ok(())
    }

    /// Detach the agent in `seat`, if any.
    pub fn remove_player(&mut self, seat: Seat) -> Result<()> {
        if let Some(previous) = self.players[seat.index()].take().and_then(|weak| weak.upgrade())
            && !self.seats_of(&previous)
        {
            lock(&previous)?.core_mut().detach(self.id);
        }
        Ok(())
    }

    /// The agent in `seat`.
    ///
    /// # Errors
    ///
    /// `PlayerMissing` if the seat is empty, `PlayerDetached` if its agent has
    /// been dropped.
    pub fn player(&self, seat: Seat) -> Result<SharedAgent> {
        self.players[seat.index()]
            .as_ref()
            .ok_or(Error::PlayerMissing {
                seat: seat.to_string(),
            })?
            .upgrade()
            .ok_or(Error::PlayerDetached {
                seat: seat.to_string(),
            })
    }

    fn seats_of(&self, agent: &SharedAgent) -> bool {
        self.players
            .iter()
            .flatten()
            .any(|weak| weak.upgrade().is_some_and(|held| Arc::ptr_eq(&held, agent)))
    }

    /// Play `episodes` games with learning and exploration enabled.
    pub fn train(&mut self, episodes: usize) -> Result<MatchResult> {
        self.run(episodes, false)
    }

    /// Play `episodes` games greedily, without learning.
    pub fn play(&mut self, episodes: usize) -> Result<MatchResult> {
        self.run(episodes, true)
    }

    fn run(&mut self, episodes: usize, is_evaluation: bool) -> Result<MatchResult> {
        let first = self.player(Seat::First)?;
        let second = self.player(Seat::Second)?;
        let first_name = lock(&first)?.name().to_string();
        let second_name = lock(&second)?.name().to_string();

        for observer in &mut self.observers {
            observer.on_run_start(episodes, is_evaluation)?;
        }

        let mut wins = [0usize; 2];
        for episode in 0..episodes {
            let winner = self.run_episode(episode, [&first, &second], is_evaluation)?;
            wins[winner.index()] += 1;
        }

        for observer in &mut self.observers {
            observer.on_run_end()?;
        }

        let result = MatchResult::new(first_name, second_name, wins[0], wins[1]);
        info!(
            "{} {} episodes: {} won {:.1}%, {} won {:.1}%",
            if is_evaluation { "played" } else { "trained" },
            result.episodes,
            result.first_player,
            result.first_win_rate * 100.0,
            result.second_player,
            result.second_win_rate * 100.0,
        );
        Ok(result)
    }

    /// Play one episode and return the winning seat.
    ///
    /// The player who removes the last object wins; the player left to move
    /// in a terminal state loses.
    fn run_episode(
        &mut self,
        episode: usize,
        agents: [&SharedAgent; 2],
        is_evaluation: bool,
    ) -> Result<Seat> {
        self.state = self.initial.clone();
        for agent in agents {
            lock(agent)?.reset();
        }
        for observer in &mut self.observers {
            observer.on_episode_start(episode)?;
        }

        let mut afterstates: [Option<State>; 2] = [None, None];
        let mut seat = Seat::First;
        let mut step = 0;

        while !self.state.is_terminal() {
            let action = lock(agents[seat.index()])?.step(self, is_evaluation)?;
            if !action.is_valid(&self.state) {
                return Err(Error::IllegalAction {
                    action: action.to_string(),
                    state: self.state.to_string(),
                });
            }

            for observer in &mut self.observers {
                observer.on_move(episode, step, seat, &self.state, &action)?;
            }

            self.state.apply_action(&action);
            afterstates[seat.index()] = Some(self.state.clone());
            seat = seat.opponent();
            step += 1;
        }

        let winner = seat.opponent();
        if !is_evaluation {
            for mover in [Seat::First, Seat::Second] {
                if let Some(prior) = &afterstates[mover.index()] {
                    let reward = if mover == winner {
                        WIN_REWARD
                    } else {
                        LOSS_REWARD
                    };
                    lock(agents[mover.index()])?.update(prior, &self.state, reward);
                }
            }
        }

        debug!("episode {episode}: {winner} player won after {step} moves");
        for observer in &mut self.observers {
            observer.on_episode_end(episode, winner)?;
        }
        Ok(winner)
    }
}

impl Drop for Game {
    fn drop(&mut self) {
        for slot in &self.players {
            if let Some(agent) = slot.as_ref().and_then(Weak::upgrade) {
                let mut guard = agent.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                guard.core_mut().detach(self.id);
            }
        }
    }
}
