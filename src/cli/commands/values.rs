//! Values command - Solve the game with dynamic programming and dump the values

use std::{fs::File, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::{
    agents::{DpMethod, DynamicProgrammingAgent, optimal_actions_ratio},
    cli::{
        config::parse_piles,
        output::{format_number, format_percent, print_kv, print_section},
    },
    learning::{DEFAULT_GAMMA, DEFAULT_THRESHOLD, ValueEntry},
    nim::State,
    ports::Agent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValuesFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(about = "Solve the game and dump its state values")]
pub struct ValuesArgs {
    /// Solver
    #[arg(long, short = 'm', value_enum, default_value_t = DpMethod::ValueIteration)]
    pub method: DpMethod,

    /// Initial piles, e.g. `3,4,5`
    #[arg(long, short = 'p', default_value = "3,4,5", value_parser = parse_piles)]
    pub piles: State,

    /// Discount factor
    #[arg(long, default_value_t = DEFAULT_GAMMA)]
    pub gamma: f64,

    /// Convergence threshold
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = ValuesFormat::Text)]
    pub format: ValuesFormat,

    /// Write the dump to a file instead of stdout
    #[arg(long, short = 'O')]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct ValuesDump {
    method: DpMethod,
    piles: State,
    gamma: f64,
    sweeps: usize,
    optimal_actions: f64,
    values: Vec<ValueEntry>,
}

/// Render `entries` as aligned `state value nim-sum` rows.
fn render_text(entries: &[ValueEntry]) -> String {
    let width = entries
        .iter()
        .map(|entry| entry.state.to_string().len())
        .max()
        .unwrap_or(0)
        .max("state".len());
    let mut out = format!("{:width$}  {:>9}  nim-sum\n", "state", "value");
    for entry in entries {
        out.push_str(&format!(
            "{:width$}  {:>9.4}  {}\n",
            entry.state.to_string(),
            entry.value,
            entry.state.nim_sum()
        ));
    }
    out
}

pub fn execute(args: ValuesArgs) -> Result<()> {
    anyhow::ensure!(
        (0.0..=1.0).contains(&args.gamma),
        "gamma must be in [0, 1], got {}",
        args.gamma
    );
    anyhow::ensure!(
        args.threshold > 0.0,
        "threshold must be positive, got {}",
        args.threshold
    );

    let states = args.piles.all_states();
    let mut agent = DynamicProgrammingAgent::new(args.method)
        .with_gamma(args.gamma)
        .with_threshold(args.threshold);
    agent.initialize(&states)?;

    let values = agent.value_table();
    let optimal_actions = optimal_actions_ratio(values, &states);
    let entries = values.entries();

    let rendered = match args.format {
        ValuesFormat::Text => render_text(&entries),
        ValuesFormat::Json => {
            let dump = ValuesDump {
                method: args.method,
                piles: args.piles.clone(),
                gamma: args.gamma,
                sweeps: agent.sweeps(),
                optimal_actions,
                values: entries,
            };
            serde_json::to_string_pretty(&dump).context("Failed to serialize values")? + "\n"
        }
    };

    match &args.output {
        Some(path) => {
            let mut file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            file.write_all(rendered.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;

            print_section(&format!("Values ({})", args.method));
            print_kv("Piles", &args.piles.to_string());
            print_kv("States", &format_number(states.len()));
            print_kv("Sweeps", &agent.sweeps().to_string());
            print_kv("Optimal actions", &format_percent(optimal_actions));
            println!("\n✓ Values saved to: {}", path.display());
        }
        None => print!("{rendered}"),
    }

    Ok(())
}
