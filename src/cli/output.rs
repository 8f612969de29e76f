//! Output formatting for CLI

use crate::{identifiers::Seat, pipeline::MatchResult};

/// Print a section header
pub fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{title}");
    println!("{}", "=".repeat(60));
}

/// Print a subsection header
pub fn print_subsection(title: &str) {
    println!("\n{title}");
    println!("{}", "-".repeat(40));
}

/// Format a number with thousands separators
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i.is_multiple_of(3) {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}

/// Format a rate in `[0, 1]` as a percentage
pub fn format_percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:20} {}", format!("{}:", key), value);
}

/// Print statistics table
pub fn print_stats_table(stats: &[(&str, &str)]) {
    for (key, value) in stats {
        print_kv(key, value);
    }
}

/// Print wins per seat of a finished run
pub fn print_match_result(result: &MatchResult) {
    let line = |seat: Seat| {
        format!(
            "{} wins ({})",
            format_number(result.wins(seat)),
            format_percent(match seat {
                Seat::First => result.first_win_rate,
                Seat::Second => result.second_win_rate,
            })
        )
    };
    let first = format!("First ({})", result.first_player);
    let second = format!("Second ({})", result.second_player);
    print_stats_table(&[
        ("Episodes", &format_number(result.episodes)),
        (&first, &line(Seat::First)),
        (&second, &line(Seat::Second)),
    ]);
}
