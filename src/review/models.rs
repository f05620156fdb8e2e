//! Data models for spaced-repetition review progress

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minutes until the next review, indexed by stage. Reaching
/// `REVIEW_INTERVALS_MINUTES.len()` means mastered.
pub const REVIEW_INTERVALS_MINUTES: [i64; 9] = [
    5,     // 5 minutes
    30,    // 30 minutes
    720,   // 12 hours
    1440,  // 1 day
    2880,  // 2 days
    5760,  // 4 days
    10080, // 7 days
    21600, // 15 days
    43200, // 30 days
];

/// Stage at which an item counts as mastered.
pub const MASTERED_STAGE: u32 = REVIEW_INTERVALS_MINUTES.len() as u32;

/// Horizon after graduating through every stage.
pub const GRADUATED_HORIZON_DAYS: i64 = 30;

/// Horizon after an explicit "I already know this".
pub const MARKED_MASTERED_HORIZON_DAYS: i64 = 365;

/// Review status label, derived from the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    /// Never reviewed
    New,
    /// Working through the interval table
    Learning,
    /// Past the last interval
    Mastered,
}

impl Default for ReviewStatus {
    fn default() -> Self {
        Self::New
    }
}

impl ReviewStatus {
    pub fn for_stage(stage: u32) -> Self {
        if stage >= MASTERED_STAGE {
            Self::Mastered
        } else {
            Self::Learning
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Learning => "learning",
            Self::Mastered => "mastered",
        }
    }

    /// Parse a stored label; unknown labels read as `Learning`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "new" => Self::New,
            "mastered" => Self::Mastered,
            _ => Self::Learning,
        }
    }
}

/// Learner's answer for one review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewOutcome {
    Remembered,
    Forgotten,
}

impl ReviewOutcome {
    pub fn from_remembered(remembered: bool) -> Self {
        if remembered {
            Self::Remembered
        } else {
            Self::Forgotten
        }
    }
}

/// Review progress for one word
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewState {
    pub word: String,
    pub stage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_review_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_review_at: Option<DateTime<Utc>>,
    pub review_count: u32,
    pub status: ReviewStatus,
}

impl ReviewState {
    /// Implicit state of a word that has never been reviewed.
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            stage: 0,
            last_review_at: None,
            next_review_at: None,
            review_count: 0,
            status: ReviewStatus::New,
        }
    }
}

/// Counters behind the daily goal display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoalStats {
    /// Words whose first-ever review happened today
    pub new_today: u32,
    /// Learning words due now
    pub due_remaining: u32,
}
