use std::path::Path;

use anyhow::{bail, Context, Result};

use lexis_lib::cache::{parse_terms, Mode};

use crate::app::App;
use crate::{ModeArg, OutputFormat};

pub async fn run(
    app: &App,
    terms: &[String],
    mode: ModeArg,
    refresh: bool,
    words_file: Option<&Path>,
    format: &OutputFormat,
) -> Result<()> {
    let words = parse_terms(&terms.join(" "));
    if words.is_empty() {
        bail!("Please enter at least one word");
    }

    let mode = match mode {
        ModeArg::Single => Mode::Single,
        ModeArg::List => Mode::List,
        ModeArg::Compare => Mode::Compare,
    };

    let cache = app.content_cache(app.word_list(words_file)?)?;
    let content = cache
        .resolve(mode, &words, refresh)
        .await
        .context("Failed to explain")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "mode": mode,
                "words": words,
                "content": content,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("{}", content),
    }

    Ok(())
}
