use std::{fs, path::PathBuf};

use anyhow::Context;
use assign::{Priority, rank};
use chrono::Utc;
use clap::Parser;

mod models;

use models::Fixture;

/// Replays an assignment decision from a JSON board snapshot and prints every score.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    fixture: PathBuf,

    /// Overrides the fixture title.
    #[arg(long)]
    title: Option<String>,

    /// Overrides the fixture priority (high, medium, low).
    #[arg(long)]
    priority: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let json = fs::read_to_string(&args.fixture)
        .with_context(|| format!("Failed to read {}", args.fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&json).context("Malformed fixture")?;

    let title = args.title.unwrap_or_else(|| fixture.title.clone());
    let priority = args
        .priority
        .or_else(|| fixture.priority.clone())
        .map(|p| p.parse::<Priority>())
        .transpose()?;

    let now = Utc::now();
    let users = fixture.users(now);
    let tasks = fixture.tasks(now);

    if users.is_empty() {
        anyhow::bail!("Fixture has no members to assign");
    }

    println!("Task: {title}");
    println!("Priority: {}\n", priority_label(priority));
    println!(
        "{:<24} {:>6} {:>6} {:>9} {:>9} {:>5}",
        "member", "score", "skill", "workload", "priority", "open"
    );

    for (position, score) in rank(&title, priority, &users, &tasks).iter().enumerate() {
        let marker = if position == 0 { "*" } else { " " };

        println!(
            "{marker}{:<23} {:>6} {:>6} {:>9} {:>9} {:>5}",
            score.user_id, score.score, score.skill, score.workload, score.priority, score.open_tasks
        );
    }

    Ok(())
}

fn priority_label(priority: Option<Priority>) -> &'static str {
    priority.map_or("none", |p| p.as_str())
}
