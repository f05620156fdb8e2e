use anyhow::{Context, Result};
use chrono::Utc;

use lexis_lib::review::algorithm::{format_interval, interval_for_stage};
use lexis_lib::review::{ReviewOutcome, ReviewState};

use crate::app::App;
use crate::render::terminal::{local_time, paint, render_states, status_label, Color};
use crate::OutputFormat;

pub fn run_record(
    app: &App,
    word: &str,
    remembered: bool,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let state = app
        .scheduler()
        .record_review(word, ReviewOutcome::from_remembered(remembered))
        .context("Failed to record review")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&state)?),
        OutputFormat::Plain => {
            println!(
                "{}: stage {} ({}), next review {} (in {})",
                paint(&state.word, Color::BOLD, use_color),
                state.stage,
                status_label(state.status, use_color),
                local_time(state.next_review_at),
                format_interval(interval_for_stage(state.stage))
            );
        }
    }
    Ok(())
}

pub fn run_master(app: &App, words: &[String], format: &OutputFormat) -> Result<()> {
    let scheduler = app.scheduler();
    let states = words
        .iter()
        .map(|w| scheduler.mark_mastered(w))
        .collect::<Result<Vec<ReviewState>, _>>()
        .context("Failed to mark as mastered")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&states)?),
        OutputFormat::Plain => {
            for state in &states {
                println!("Mastered: {}", state.word);
            }
        }
    }
    Ok(())
}

pub fn run_due(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let due = app.scheduler().due(Utc::now()).context("Failed to query due words")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&due)?),
        OutputFormat::Plain => {
            if due.is_empty() {
                println!("Nothing due.");
                return Ok(());
            }
            println!("{}", render_states(&due, use_color));
            println!("\n{} due", due.len());
        }
    }
    Ok(())
}

pub fn run_stats(app: &App, format: &OutputFormat) -> Result<()> {
    let stats = app
        .scheduler()
        .daily_goal_stats(Utc::now())
        .context("Failed to compute daily stats")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
        OutputFormat::Plain => {
            println!("New today:     {}", stats.new_today);
            println!("Due remaining: {}", stats.due_remaining);
        }
    }
    Ok(())
}

pub fn run_status(
    app: &App,
    word: Option<&str>,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let scheduler = app.scheduler();
    let states: Vec<ReviewState> = match word {
        Some(word) => vec![scheduler.get(word).context("Failed to read review state")?],
        None => scheduler
            .all()
            .context("Failed to read review states")?
            .into_values()
            .collect(),
    };

    match format {
        OutputFormat::Json => match word {
            Some(_) => println!("{}", serde_json::to_string_pretty(&states[0])?),
            None => println!("{}", serde_json::to_string_pretty(&states)?),
        },
        OutputFormat::Plain => {
            if states.is_empty() {
                println!("No words reviewed yet.");
                return Ok(());
            }
            println!("{}", render_states(&states, use_color));
        }
    }
    Ok(())
}
