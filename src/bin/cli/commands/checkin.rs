use anyhow::{Context, Result};
use chrono::Local;

use crate::app::App;
use crate::OutputFormat;

pub fn run_list(app: &App, format: &OutputFormat) -> Result<()> {
    let dates = app.checkins().list().context("Failed to list check-ins")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&dates)?),
        OutputFormat::Plain => {
            if dates.is_empty() {
                println!("No check-ins yet.");
                return Ok(());
            }
            for date in &dates {
                println!("{}", date);
            }
            println!("\n{} days", dates.len());
        }
    }
    Ok(())
}

pub fn run_add(app: &App, date: Option<&str>, format: &OutputFormat) -> Result<()> {
    let today = Local::now().format("%Y-%m-%d").to_string();
    let date = app
        .checkins()
        .add(date.unwrap_or(today.as_str()))
        .context("Failed to add check-in")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "date": date })),
        OutputFormat::Plain => println!("Checked in: {}", date),
    }
    Ok(())
}

pub fn run_remove(app: &App, date: &str, format: &OutputFormat) -> Result<()> {
    let removed = app.checkins().remove(date).context("Failed to remove check-in")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::json!({ "date": date, "removed": removed }))
        }
        OutputFormat::Plain if removed => println!("Removed check-in: {}", date),
        OutputFormat::Plain => println!("No check-in on {}", date),
    }
    Ok(())
}
