//! Colored console output for the operator.
//!
//! Everything the operator is meant to read goes through here. Diagnostics
//! go through `tracing` instead.

use std::io::{self, Write};

use chrono::Utc;
use owo_colors::OwoColorize;

use crate::driver::{DriverStats, SessionOutcome};
use crate::rules::Reaction;

/// Get current timestamp in the same format as tracing.
fn timestamp() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Print a cleaned line of child output.
pub fn print_output(line: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[>]".dimmed(), line);
    let _ = io::stdout().flush();
}

/// Print that a rule matched.
pub fn print_match(match_text: &str) {
    println!(
        "{} {} Detected match: {}",
        timestamp().dimmed(),
        "[✓]".green().bold(),
        match_text.cyan()
    );
}

/// Print a reaction that was sent to the child.
pub fn print_reaction(reaction: &Reaction) {
    println!(
        "{} {} Sending {}",
        timestamp().dimmed(),
        "[>]".blue().bold(),
        reaction.to_string().yellow()
    );
    let _ = io::stdout().flush();
}

/// Print a progress message.
pub fn print_status(message: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[+]".blue().bold(), message);
}

/// Print a completed step.
pub fn print_success(message: &str) {
    println!("{} {} {}", timestamp().dimmed(), "[✓]".green().bold(), message);
}

/// Print a non-fatal problem.
pub fn print_warning(message: &str) {
    println!(
        "{} {} {}",
        timestamp().dimmed(),
        "[!]".yellow().bold(),
        message.yellow()
    );
}

/// Print a fatal error to stderr.
pub fn print_fatal(message: &str) {
    eprintln!(
        "{} {} Fatal error: {}",
        timestamp().dimmed(),
        "[X]".red().bold(),
        message.red()
    );
}

/// Print how the session ended.
pub fn print_session_end(outcome: &SessionOutcome, stats: &DriverStats) {
    let summary = format!(
        "lines={} matches={} forwarded={} reactions={}",
        stats.lines, stats.matches, stats.forwarded, stats.reactions_sent
    );
    match outcome {
        SessionOutcome::Ended => println!(
            "{} {} Process ended {}",
            timestamp().dimmed(),
            "[!]".blue().bold(),
            summary.dimmed()
        ),
        SessionOutcome::Interrupted => println!(
            "{} {} Interrupted by user {}",
            timestamp().dimmed(),
            "[X]".yellow().bold(),
            summary.dimmed()
        ),
        SessionOutcome::StreamFailed { reason } => println!(
            "{} {} Lost the child stream: {} {}",
            timestamp().dimmed(),
            "[!]".red().bold(),
            reason.red(),
            summary.dimmed()
        ),
    }
    let _ = io::stdout().flush();
}
