use std::sync::OnceLock;

use regex::Regex;

use super::MarkdownNormalizer;

/// Tidies model output: unwraps a whole-document code fence, strips trailing
/// spaces, and collapses runs of blank lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCleaner;

fn outer_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A\s*```(?:markdown|md)?[ \t]*\n(.*?)\n```\s*\z").expect("valid regex")
    })
}

fn blank_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").expect("valid regex"))
}

impl MarkdownNormalizer for MarkdownCleaner {
    fn normalize(&self, raw: &str) -> String {
        let text = raw.replace("\r\n", "\n");
        let text = match outer_fence().captures(&text) {
            Some(caps) => caps[1].to_string(),
            None => text,
        };

        let trimmed: Vec<&str> = text.lines().map(str::trim_end).collect();
        let joined = trimmed.join("\n");
        blank_runs().replace_all(&joined, "\n\n").trim().to_string()
    }
}
