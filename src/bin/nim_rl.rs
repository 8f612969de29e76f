//! nim-rl - Tabular reinforcement learning on Nim
//!
//! This CLI provides a unified interface for:
//! - Training any agent against any other, or against itself
//! - Evaluating a trained agent from both seats
//! - Dumping the state values found by dynamic programming

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nim-rl")]
#[command(version, about = "Tabular reinforcement learning on Nim", long_about = None)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a learner against an opponent
    Train(Box<nim_rl::cli::commands::train::TrainArgs>),

    /// Train a learner, then evaluate it from both seats
    Evaluate(Box<nim_rl::cli::commands::evaluate::EvaluateArgs>),

    /// Solve the game with dynamic programming and dump the values
    Values(nim_rl::cli::commands::values::ValuesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Train(args) => nim_rl::cli::commands::train::execute(*args),
        Commands::Evaluate(args) => nim_rl::cli::commands::evaluate::execute(*args),
        Commands::Values(args) => nim_rl::cli::commands::values::execute(args),
    }
}
