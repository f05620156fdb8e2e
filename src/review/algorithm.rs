//! Fixed-interval spaced repetition
//!
//! A remembered review moves the word one stage up the interval table; a
//! forgotten one sends it back to stage 0. The interval that applies after a
//! review is the one for the stage just completed, so the first successful
//! review waits `REVIEW_INTERVALS_MINUTES[0]`.

use chrono::{DateTime, Duration, Utc};

use super::models::{
    ReviewOutcome, ReviewState, ReviewStatus, GRADUATED_HORIZON_DAYS, MARKED_MASTERED_HORIZON_DAYS,
    MASTERED_STAGE, REVIEW_INTERVALS_MINUTES,
};

/// Wait before the next review once a word sits at `stage`.
pub fn interval_for_stage(stage: u32) -> Duration {
    if stage >= MASTERED_STAGE {
        return Duration::days(GRADUATED_HORIZON_DAYS);
    }
    let index = stage.saturating_sub(1) as usize;
    Duration::minutes(REVIEW_INTERVALS_MINUTES[index])
}

/// Apply one review to `current` (the implicit new state when absent).
pub fn apply_review(
    current: &ReviewState,
    outcome: ReviewOutcome,
    now: DateTime<Utc>,
) -> ReviewState {
    let stage = match outcome {
        ReviewOutcome::Remembered => (current.stage + 1).min(MASTERED_STAGE),
        ReviewOutcome::Forgotten => 0,
    };

    ReviewState {
        word: current.word.clone(),
        stage,
        last_review_at: Some(now),
        next_review_at: Some(now + interval_for_stage(stage)),
        review_count: current.review_count.saturating_add(1),
        status: ReviewStatus::for_stage(stage),
    }
}

/// Direct override to mastered, regardless of prior progress.
pub fn mark_mastered(word: &str, now: DateTime<Utc>) -> ReviewState {
    ReviewState {
        word: word.to_string(),
        stage: MASTERED_STAGE,
        last_review_at: Some(now),
        next_review_at: Some(now + Duration::days(MARKED_MASTERED_HORIZON_DAYS)),
        review_count: 1,
        status: ReviewStatus::Mastered,
    }
}

/// Short label for an interval, e.g. `30m`, `12h`, `2d`.
pub fn format_interval(interval: Duration) -> String {
    let minutes = interval.num_minutes();
    if minutes < 60 {
        format!("{}m", minutes)
    } else if minutes < 1440 {
        format!("{}h", minutes / 60)
    } else {
        format!("{}d", minutes / 1440)
    }
}
