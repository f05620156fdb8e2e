use std::path::Path;

use anyhow::{Context, Result};

use lexis_lib::cache::ImageResponse;

use crate::app::App;
use crate::OutputFormat;

pub async fn run(
    app: &App,
    word: &str,
    output: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    let cache = app.image_cache()?;
    let response = cache.resolve(word).await.context("Failed to resolve image")?;

    match response {
        ImageResponse::Redirect(url) => match format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "word": word, "redirect": url });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            OutputFormat::Plain => println!("{}", url),
        },
        ImageResponse::Bytes { body, content_type } => {
            if let Some(path) = output {
                std::fs::write(path, &body)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
            }
            match format {
                OutputFormat::Json => {
                    let output = serde_json::json!({
                        "word": word,
                        "contentType": content_type,
                        "bytes": body.len(),
                        "savedTo": output.map(|p| p.display().to_string()),
                    });
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Plain => {
                    println!("{} ({} bytes)", content_type, body.len());
                    if let Some(path) = output {
                        println!("Saved to {}", path.display());
                    }
                }
            }
        }
    }

    Ok(())
}
