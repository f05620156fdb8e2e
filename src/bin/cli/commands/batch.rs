use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use lexis_lib::batch::{BatchOptions, BatchRunner};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub async fn run(
    app: &App,
    words_file: Option<&Path>,
    options: BatchOptions,
    format: &OutputFormat,
    use_color: bool,
) -> Result<()> {
    let path = app.words_path(words_file);
    let Some(words) = app.word_list(Some(&path))? else {
        bail!("No word list at {}", path.display());
    };
    let items: Vec<String> = words.items().iter().map(|item| item.word.clone()).collect();

    let content = Arc::new(app.content_cache(Some(words))?);
    let images = Arc::new(app.image_cache()?);
    let runner = BatchRunner::new(app.store.clone(), content).with_images(images);

    let summary = runner
        .run_all(&items, &options)
        .await
        .context("Batch run failed")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Plain => {
            println!(
                "{} words in list, {} already cached, {} processed",
                summary.total, summary.skipped, summary.attempted
            );
            println!(
                "{} succeeded, {} failed in {:.1}s",
                paint(&summary.succeeded.to_string(), Color::GREEN, use_color),
                paint(&summary.failed().to_string(), Color::RED, use_color),
                summary.elapsed.as_secs_f64()
            );
            if let Some(avg) = summary.avg_per_success() {
                println!("Average {:.2}s per word", avg.as_secs_f64());
            }
            for failure in &summary.failures {
                println!(
                    "  {} {}: {}",
                    paint("FAILED", Color::RED, use_color),
                    failure.word,
                    failure.reason
                );
            }
        }
    }
    Ok(())
}
