mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "lexis-cli", about = "Vocabulary explanations, images and review", version)]
struct Cli {
    /// Use a specific database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum ModeArg {
    Single,
    List,
    Compare,
}

#[derive(Subcommand)]
enum Command {
    /// Explain one or more words (cached after the first call)
    Explain {
        /// Words; comma-separated or space-separated
        terms: Vec<String>,
        #[arg(long, value_enum, default_value = "single")]
        mode: ModeArg,
        /// Regenerate even if an explanation is cached
        #[arg(long)]
        refresh: bool,
        /// Vocabulary list used for part-of-speech hints
        #[arg(long)]
        words_file: Option<PathBuf>,
    },

    /// Resolve the image for a word
    Image {
        word: String,
        /// Write fetched image bytes to this file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Spaced-repetition review
    #[command(subcommand)]
    Review(ReviewCommand),

    /// Daily check-ins
    #[command(subcommand)]
    Checkin(CheckinCommand),

    /// The current learn batch
    #[command(subcommand)]
    LearnBatch(LearnBatchCommand),

    /// Generate explanations for every word in a vocabulary list
    Batch {
        /// Parallel workers
        #[arg(long, default_value_t = lexis_lib::batch::DEFAULT_CONCURRENCY)]
        workers: usize,
        /// Regenerate words that already have an explanation
        #[arg(long)]
        force: bool,
        /// Process at most this many words (0 = all)
        #[arg(long, default_value = "0")]
        limit: usize,
        /// Vocabulary list JSON
        #[arg(long)]
        words_file: Option<PathBuf>,
    },

    /// Delete all cached explanations and review progress
    ClearAll {
        /// Also reset the config file to defaults
        #[arg(long)]
        reset_settings: bool,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum ReviewCommand {
    /// Record one review
    Record {
        word: String,
        /// Record as forgotten instead of remembered
        #[arg(long)]
        forgot: bool,
    },
    /// Mark words as already known
    Master { words: Vec<String> },
    /// List words due for review
    Due,
    /// Daily goal counters
    Stats,
    /// Show review state (one word, or all)
    Status { word: Option<String> },
}

#[derive(Subcommand)]
enum CheckinCommand {
    List,
    /// Check in for a date (default: today)
    Add { date: Option<String> },
    Remove { date: String },
}

#[derive(Subcommand)]
enum LearnBatchCommand {
    Show,
    /// Replace the batch with these words
    Set { words: Vec<String> },
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.db.as_deref(), cli.config.as_deref())?;

    match cli.command {
        Command::Explain {
            terms,
            mode,
            refresh,
            words_file,
        } => {
            commands::explain::run(
                &app,
                &terms,
                mode,
                refresh,
                words_file.as_deref(),
                &cli.format,
            )
            .await?;
        }
        Command::Image { word, output } => {
            commands::image::run(&app, &word, output.as_deref(), &cli.format).await?;
        }
        Command::Review(subcmd) => match subcmd {
            ReviewCommand::Record { word, forgot } => {
                commands::review::run_record(&app, &word, !forgot, &cli.format, use_color)?;
            }
            ReviewCommand::Master { words } => {
                commands::review::run_master(&app, &words, &cli.format)?;
            }
            ReviewCommand::Due => commands::review::run_due(&app, &cli.format, use_color)?,
            ReviewCommand::Stats => commands::review::run_stats(&app, &cli.format)?,
            ReviewCommand::Status { word } => {
                commands::review::run_status(&app, word.as_deref(), &cli.format, use_color)?;
            }
        },
        Command::Checkin(subcmd) => match subcmd {
            CheckinCommand::List => commands::checkin::run_list(&app, &cli.format)?,
            CheckinCommand::Add { date } => {
                commands::checkin::run_add(&app, date.as_deref(), &cli.format)?;
            }
            CheckinCommand::Remove { date } => {
                commands::checkin::run_remove(&app, &date, &cli.format)?;
            }
        },
        Command::LearnBatch(subcmd) => match subcmd {
            LearnBatchCommand::Show => commands::learn_batch::run_show(&app, &cli.format)?,
            LearnBatchCommand::Set { words } => {
                commands::learn_batch::run_set(&app, &words, &cli.format)?;
            }
            LearnBatchCommand::Clear => commands::learn_batch::run_clear(&app, &cli.format)?,
        },
        Command::Batch {
            workers,
            force,
            limit,
            words_file,
        } => {
            let options = lexis_lib::BatchOptions {
                concurrency: workers,
                force,
                limit,
                ..lexis_lib::BatchOptions::default()
            };
            commands::batch::run(&app, words_file.as_deref(), options, &cli.format, use_color)
                .await?;
        }
        Command::ClearAll {
            reset_settings,
            yes,
        } => {
            commands::clear_all::run(&app, reset_settings, yes, &cli.format)?;
        }
    }

    Ok(())
}
