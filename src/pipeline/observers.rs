//! Observer implementations for training and evaluation runs
//!
//! Observers collect data from a run without coupling the game loop to any
//! particular output format.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    identifiers::Seat,
    nim::{Action, State},
    ports::Observer,
};

/// One move of an observed episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveObservation {
    pub step: usize,
    pub seat: Seat,
    /// State the mover faced
    pub state: State,
    pub action: Action,
}

/// Complete observation of an episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeObservation {
    pub episode: usize,
    pub is_evaluation: bool,
    pub winner: Seat,
    pub moves: Vec<MoveObservation>,
}

/// Progress bar observer - shows run progress with running win counts
pub struct ProgressObserver {
    progress_bar: Option<ProgressBar>,
    wins: [usize; 2],
}

impl ProgressObserver {
    pub fn new() -> Self {
        Self {
            progress_bar: None,
            wins: [0, 0],
        }
    }

    fn message(&self) -> String {
        format!("{} / {}", self.wins[0], self.wins[1])
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer for ProgressObserver {
    fn on_run_start(&mut self, total_episodes: usize, is_evaluation: bool) -> Result<()> {
        let label = if is_evaluation { "evaluating" } else { "training" };
        let pb = ProgressBar::new(total_episodes as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "[{{elapsed_precise}}] {label} {{bar:40.cyan/blue}} {{pos}}/{{len}} episodes (first/second wins: {{msg}})"
                ))
                .map_err(|e| Error::ProgressBarTemplate {
                    message: e.to_string(),
                })?
                .progress_chars("=>-"),
        );
        self.wins = [0, 0];
        self.progress_bar = Some(pb);
        Ok(())
    }

    fn on_episode_end(&mut self, episode: usize, winner: Seat) -> Result<()> {
        self.wins[winner.index()] += 1;
        if let Some(pb) = &self.progress_bar {
            pb.set_position(episode as u64 + 1);
            pb.set_message(self.message());
        }
        Ok(())
    }

    fn on_run_end(&mut self) -> Result<()> {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_with_message(self.message());
        }
        Ok(())
    }
}

/// Metrics observer - tracks win rates and episode lengths
#[derive(Debug, Default)]
pub struct MetricsObserver {
    first_wins: usize,
    second_wins: usize,
    total_episodes: usize,
    move_counts: Vec<usize>,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn rate(&self, count: usize) -> f64 {
        if self.total_episodes == 0 {
            0.0
        } else {
            count as f64 / self.total_episodes as f64
        }
    }

    pub fn first_win_rate(&self) -> f64 {
        self.rate(self.first_wins)
    }

    pub fn second_win_rate(&self) -> f64 {
        self.rate(self.second_wins)
    }

    /// Get average episode length in moves
    pub fn avg_episode_length(&self) -> f64 {
        if self.move_counts.is_empty() {
            0.0
        } else {
            self.move_counts.iter().sum::<usize>() as f64 / self.move_counts.len() as f64
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_episodes: self.total_episodes,
            first_wins: self.first_wins,
            second_wins: self.second_wins,
            first_win_rate: self.first_win_rate(),
            second_win_rate: self.second_win_rate(),
            avg_episode_length: self.avg_episode_length(),
        }
    }
}

/// Summary of run metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub total_episodes: usize,
    pub first_wins: usize,
    pub second_wins: usize,
    pub first_win_rate: f64,
    pub second_win_rate: f64,
    pub avg_episode_length: f64,
}

impl Observer for MetricsObserver {
    fn on_episode_start(&mut self, _episode: usize) -> Result<()> {
        self.move_counts.push(0);
        Ok(())
    }

    fn on_move(
        &mut self,
        _episode: usize,
        _step: usize,
        _seat: Seat,
        _state: &State,
        _action: &Action,
    ) -> Result<()> {
        if let Some(last) = self.move_counts.last_mut() {
            *last += 1;
        }
        Ok(())
    }

    fn on_episode_end(&mut self, _episode: usize, winner: Seat) -> Result<()> {
        self.total_episodes += 1;
        match winner {
            Seat::First => self.first_wins += 1,
            Seat::Second => self.second_wins += 1,
        }
        Ok(())
    }
}

/// JSONL observer - writes one [`EpisodeObservation`] per line
pub struct JsonlObserver {
    writer: BufWriter<File>,
    is_evaluation: bool,
    moves: Vec<MoveObservation>,
}

impl JsonlObserver {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            is_evaluation: false,
            moves: Vec::new(),
        })
    }
}

impl Observer for JsonlObserver {
    fn on_run_start(&mut self, _total_episodes: usize, is_evaluation: bool) -> Result<()> {
        self.is_evaluation = is_evaluation;
        Ok(())
    }

    fn on_episode_start(&mut self, _episode: usize) -> Result<()> {
        self.moves.clear();
        Ok(())
    }

    fn on_move(
        &mut self,
        _episode: usize,
        step: usize,
        seat: Seat,
        state: &State,
        action: &Action,
    ) -> Result<()> {
        self.moves.push(MoveObservation {
            step,
            seat,
            state: state.clone(),
            action: *action,
        });
        Ok(())
    }

    fn on_episode_end(&mut self, episode: usize, winner: Seat) -> Result<()> {
        let observation = EpisodeObservation {
            episode,
            is_evaluation: self.is_evaluation,
            winner,
            moves: std::mem::take(&mut self.moves),
        };
        serde_json::to_writer(&mut self.writer, &observation)?;
        writeln!(self.writer)?;
        Ok(())
    }

    fn on_run_end(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
