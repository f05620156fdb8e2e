use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, reset_settings: bool, yes: bool, format: &OutputFormat) -> Result<()> {
    if !yes && !confirm(app)? {
        println!("Aborted.");
        return Ok(());
    }

    app.db.clear_all().context("Failed to clear database")?;
    if reset_settings {
        app.config.reset().context("Failed to reset settings")?;
    }

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({ "cleared": true, "settingsReset": reset_settings })
        ),
        OutputFormat::Plain => {
            println!("Cleared all explanations and learning progress.");
            if reset_settings {
                println!("Settings reset to defaults.");
            }
        }
    }
    Ok(())
}

fn confirm(app: &App) -> Result<bool> {
    print!(
        "Delete all cached explanations and review progress in {}? [y/N] ",
        app.db.path().display()
    );
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
