//! Error types for the nim-rl crate

use thiserror::Error;

/// Main error type for the nim-rl crate
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid state '{input}': {reason}")]
    ParseState { input: String, reason: String },

    #[error("invalid action '{input}': {reason}")]
    ParseAction { input: String, reason: String },

    #[error("pile {pile} is out of range for a state with {piles} piles")]
    PileOutOfRange { pile: usize, piles: usize },

    #[error("illegal action '{action}' in state '{state}'")]
    IllegalAction { action: String, state: String },

    #[error("no legal actions available in state '{state}'")]
    NoLegalActions { state: String },

    #[error("game has no {seat} player attached")]
    PlayerMissing { seat: String },

    #[error("{seat} player was dropped while still attached to the game")]
    PlayerDetached { seat: String },

    #[error("agent lock poisoned: {message}")]
    AgentPoisoned { message: String },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("input closed before a valid {expected} was read")]
    InputClosed { expected: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("progress bar template error: {message}")]
    ProgressBarTemplate { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for Results using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Error::Io {
            operation: "IO operation".to_string(),
            source,
        }
    }
}
