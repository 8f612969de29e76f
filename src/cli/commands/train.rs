//! Train command - Train a learner against an opponent

use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::Serialize;
use serde_json::to_writer_pretty;

use super::train_lab;
use crate::{
    agents::optimal_actions_ratio,
    app::LabConfig,
    cli::{
        config::RunArgs,
        output::{format_number, format_percent, print_kv, print_match_result, print_section},
    },
    pipeline::MatchResult,
    ports::{SharedAgent, lock},
};

#[derive(Debug, Serialize)]
struct TrainingSummaryFile {
    config: LabConfig,
    training: MatchResult,
    learner_optimal_actions: Option<f64>,
    opponent_optimal_actions: Option<f64>,
    final_epsilon: Option<f64>,
}

fn sanitize_summary_path(raw: &Path) -> PathBuf {
    let mut normalized = raw.to_path_buf();
    let raw_str = raw.as_os_str().to_string_lossy();

    // Trailing separator or no file name: treat as a directory
    if raw_str.ends_with(std::path::MAIN_SEPARATOR) || normalized.file_name().is_none() {
        normalized.push("training_summary.json");
        return normalized;
    }

    match normalized.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => normalized,
        _ => {
            normalized.set_extension("json");
            normalized
        }
    }
}

#[derive(Parser, Debug)]
#[command(about = "Train a learner", allow_negative_numbers = true)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Optional file for JSONL observations
    #[arg(long)]
    pub observations: Option<PathBuf>,

    /// Optional path for writing a summary JSON file
    #[arg(long)]
    pub summary: Option<PathBuf>,

    /// Print the learned value table
    #[arg(long)]
    pub show_values: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

/// Share of winning positions where the agent's greedy moves are all optimal.
pub(crate) fn optimal_share(agent: &SharedAgent, lab: &LabConfig) -> Result<Option<f64>> {
    let values = lock(agent)?.values();
    Ok(values.map(|values| optimal_actions_ratio(&values, &lab.initial_state().all_states())))
}

pub fn execute(args: TrainArgs) -> Result<()> {
    let lab = args.run.lab_config()?;
    let seat = args.run.learner_seat();

    print_section("Training");
    print_kv("Piles", &lab.initial_state().to_string());
    print_kv("Learner", &format!("{} ({seat})", lab.learner.kind));
    print_kv("Opponent", &lab.opponent.kind.to_string());
    print_kv("Episodes", &format_number(lab.episodes));
    if let Some(seed) = lab.seed {
        print_kv("Seed", &seed.to_string());
    }

    let trained = train_lab(
        &lab,
        seat,
        !args.no_progress,
        args.observations.as_deref(),
    )?;
    info!("training finished after {} episodes", trained.result.episodes);

    println!("\n=== Training Complete ===");
    print_match_result(&trained.result);

    let learner_optimal_actions = optimal_share(&trained.learner, &lab)?;
    let opponent_optimal_actions = optimal_share(&trained.opponent, &lab)?;
    let final_epsilon = lock(&trained.learner)?.epsilon();
    if let Some(ratio) = learner_optimal_actions {
        print_kv("Learner optimal", &format_percent(ratio));
    }
    if let Some(ratio) = opponent_optimal_actions {
        print_kv("Opponent optimal", &format_percent(ratio));
    }
    if let Some(epsilon) = final_epsilon {
        print_kv("Final epsilon", &format!("{epsilon:.4}"));
    }

    if args.show_values
        && let Some(values) = lock(&trained.learner)?.values()
    {
        println!("\n=== Learned Values ===");
        print!("{values}");
    }

    if let Some(raw) = &args.summary {
        let path = sanitize_summary_path(raw);
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let summary = TrainingSummaryFile {
            config: lab.clone(),
            training: trained.result.clone(),
            learner_optimal_actions,
            opponent_optimal_actions,
            final_epsilon,
        };
        let file = File::create(&path)
            .with_context(|| format!("Failed to create summary {}", path.display()))?;
        to_writer_pretty(file, &summary).context("Failed to write summary")?;
        println!("\n✓ Summary saved to: {}", path.display());
    }

    Ok(())
}
