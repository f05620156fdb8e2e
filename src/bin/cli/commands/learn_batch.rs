use anyhow::{Context, Result};

use lexis_lib::cache::parse_terms;

use crate::app::App;
use crate::OutputFormat;

pub fn run_show(app: &App, format: &OutputFormat) -> Result<()> {
    let words = app.learn_batch().list().context("Failed to read learn batch")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&words)?),
        OutputFormat::Plain => {
            if words.is_empty() {
                println!("Learn batch is empty.");
            } else {
                println!("{}", words.join(", "));
            }
        }
    }
    Ok(())
}

pub fn run_set(app: &App, words: &[String], format: &OutputFormat) -> Result<()> {
    let words = parse_terms(&words.join(" "));
    let count = app
        .learn_batch()
        .replace(&words)
        .context("Failed to update learn batch")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "count": count })),
        OutputFormat::Plain => println!("Learn batch set to {} words", count),
    }
    Ok(())
}

pub fn run_clear(app: &App, format: &OutputFormat) -> Result<()> {
    app.learn_batch().clear().context("Failed to clear learn batch")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "cleared": true })),
        OutputFormat::Plain => println!("Learn batch cleared"),
    }
    Ok(())
}
