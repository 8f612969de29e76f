//! Evaluate command - Train a learner, then play it greedily from both seats

use std::{fs::File, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use serde_json::to_writer_pretty;

use super::{train::optimal_share, train_lab};
use crate::{
    app::{AgentConfig, AgentKind, LabConfig},
    cli::{
        config::RunArgs,
        output::{format_number, format_percent, print_kv, print_match_result, print_section},
    },
    identifiers::Seat,
    pipeline::{Game, MatchResult, ProgressObserver},
    ports::SharedAgent,
};

#[derive(Parser, Debug)]
#[command(about = "Train a learner and evaluate it", allow_negative_numbers = true)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Agent to evaluate against
    #[arg(long, short = 'a', value_enum, default_value_t = AgentKind::Optimal)]
    pub against: AgentKind,

    /// Export results to file
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Hide the progress bars
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Serialize)]
struct EvaluationReport {
    config: LabConfig,
    against: AgentKind,
    training: MatchResult,
    as_first: SeatReport,
    as_second: SeatReport,
    optimal_actions: Option<f64>,
    first_mover_wins_with_perfect_play: bool,
}

#[derive(Debug, Serialize)]
struct SeatReport {
    result: MatchResult,
    learner_win_rate: f64,
}

/// Play `episodes` greedy episodes with the learner in `seat`.
fn evaluate_seat(
    lab: &LabConfig,
    learner: &SharedAgent,
    against: &SharedAgent,
    seat: Seat,
    progress: bool,
) -> Result<SeatReport> {
    let mut game = Game::new(lab.initial_state());
    if progress {
        game.add_observer(Box::new(ProgressObserver::new()));
    }
    game.set_player(seat, learner)?;
    game.set_player(seat.opponent(), against)?;
    let result = game.play(lab.evaluation_episodes)?;
    let learner_win_rate = match seat {
        Seat::First => result.first_win_rate,
        Seat::Second => result.second_win_rate,
    };
    Ok(SeatReport {
        result,
        learner_win_rate,
    })
}

pub fn execute(args: EvaluateArgs) -> Result<()> {
    let lab = args.run.lab_config()?;
    let progress = !args.no_progress;

    print_section("Training");
    print_kv("Piles", &lab.initial_state().to_string());
    print_kv("Learner", &lab.learner.kind.to_string());
    print_kv("Opponent", &lab.opponent.kind.to_string());
    print_kv("Episodes", &format_number(lab.episodes));

    let trained = train_lab(&lab, args.run.learner_seat(), progress, None)?;
    print_match_result(&trained.result);

    let mut against = AgentConfig::new(args.against);
    if let Some(seed) = lab.seed {
        against = against.with_seed(seed.wrapping_add(2));
    }
    let against = against.build().context("Failed to build evaluation opponent")?;

    print_section(&format!("Evaluation against {}", args.against));
    let as_first = evaluate_seat(&lab, &trained.learner, &against, Seat::First, progress)?;
    let as_second = evaluate_seat(&lab, &trained.learner, &against, Seat::Second, progress)?;

    let first_mover_wins = lab.initial_state().nim_sum() != 0;
    println!("\n=== Learner as first player ===");
    print_match_result(&as_first.result);
    println!("\n=== Learner as second player ===");
    print_match_result(&as_second.result);

    println!("\n=== Summary ===");
    print_kv("Win rate (first)", &format_percent(as_first.learner_win_rate));
    print_kv("Win rate (second)", &format_percent(as_second.learner_win_rate));
    print_kv(
        "Winning seat",
        if first_mover_wins { "first" } else { "second" },
    );
    let optimal_actions = optimal_share(&trained.learner, &lab)?;
    if let Some(ratio) = optimal_actions {
        print_kv("Optimal actions", &format_percent(ratio));
    }

    if let Some(path) = &args.export {
        let report = EvaluationReport {
            config: lab.clone(),
            against: args.against,
            training: trained.result.clone(),
            as_first,
            as_second,
            optimal_actions,
            first_mover_wins_with_perfect_play: first_mover_wins,
        };
        let file = File::create(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        to_writer_pretty(file, &report).context("Failed to write report")?;
        println!("\n✓ Results exported to: {}", path.display());
    }

    Ok(())
}
