use chrono::{DateTime, Local, Utc};

use lexis_lib::review::{ReviewState, ReviewStatus};

/// ANSI color codes
pub struct Color;

impl Color {
    pub const RESET: &'static str = "\x1b[0m";
    pub const BOLD: &'static str = "\x1b[1m";
    pub const RED: &'static str = "\x1b[31m";
    pub const GREEN: &'static str = "\x1b[32m";
    pub const YELLOW: &'static str = "\x1b[33m";
    pub const GRAY: &'static str = "\x1b[90m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

pub fn status_label(status: ReviewStatus, use_color: bool) -> String {
    let color = match status {
        ReviewStatus::New => Color::GRAY,
        ReviewStatus::Learning => Color::YELLOW,
        ReviewStatus::Mastered => Color::GREEN,
    };
    paint(status.as_str(), color, use_color)
}

pub fn local_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Word / stage / status / next-review table
pub fn render_states(states: &[ReviewState], use_color: bool) -> String {
    let word_width = states.iter().map(|s| s.word.len()).max().unwrap_or(4).max(4);
    let mut lines = vec![format!(
        "{:<ww$}  {:>5}  {:<8}  {}",
        "Word",
        "Stage",
        "Status",
        "Next review",
        ww = word_width
    )];
    lines.push(format!(
        "{}  {}  {}  {}",
        "\u{2500}".repeat(word_width),
        "\u{2500}".repeat(5),
        "\u{2500}".repeat(8),
        "\u{2500}".repeat(16)
    ));

    for state in states {
        // Pad before coloring so escape codes don't skew the columns
        let status = format!("{:<8}", state.status.as_str());
        let status = status.replacen(
            state.status.as_str(),
            &status_label(state.status, use_color),
            1,
        );
        lines.push(format!(
            "{:<ww$}  {:>5}  {}  {}",
            state.word,
            state.stage,
            status,
            local_time(state.next_review_at),
            ww = word_width
        ));
    }
    lines.join("\n")
}
