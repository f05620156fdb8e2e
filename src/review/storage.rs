//! Review progress persistence
//!
//! One `learning_progress` row per word. Transitions read and replace the row
//! inside an immediate transaction so concurrent reviews of the same word
//! serialize instead of losing a count.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use thiserror::Error;

use super::algorithm::{apply_review, mark_mastered};
use super::models::{DailyGoalStats, ReviewOutcome, ReviewState, ReviewStatus};
use crate::cache::normalize_word;
use crate::storage::{format_timestamp, parse_timestamp, Database, StorageError};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Word must not be empty")]
    EmptyWord,

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for ReviewError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Sqlite(e))
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;

const SELECT_COLUMNS: &str =
    "SELECT verb, stage, last_review, next_review, review_count, status FROM learning_progress";

/// Spaced-repetition state machine over the `learning_progress` table
#[derive(Debug, Clone)]
pub struct ReviewScheduler {
    db: Database,
}

impl ReviewScheduler {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record one review at the current time.
    pub fn record_review(&self, word: &str, outcome: ReviewOutcome) -> Result<ReviewState> {
        self.record_review_at(word, outcome, Utc::now())
    }

    pub fn record_review_at(
        &self,
        word: &str,
        outcome: ReviewOutcome,
        now: DateTime<Utc>,
    ) -> Result<ReviewState> {
        let word = review_key(word)?;
        let now = truncate_millis(now);

        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = load(&tx, &word)?.unwrap_or_else(|| ReviewState::new(word.clone()));
        let next = apply_review(&current, outcome, now);
        save(&tx, &next)?;
        tx.commit()?;

        log::debug!(
            "Reviewed '{}' ({:?}): stage {} -> {}",
            word,
            outcome,
            current.stage,
            next.stage
        );
        Ok(next)
    }

    /// Mark a word as already known at the current time.
    pub fn mark_mastered(&self, word: &str) -> Result<ReviewState> {
        self.mark_mastered_at(word, Utc::now())
    }

    pub fn mark_mastered_at(&self, word: &str, now: DateTime<Utc>) -> Result<ReviewState> {
        let word = review_key(word)?;
        let state = mark_mastered(&word, truncate_millis(now));

        let conn = self.db.connect()?;
        save(&conn, &state)?;
        log::debug!("Marked '{}' as mastered", word);
        Ok(state)
    }

    /// Learning words whose next review is at or before `now`, soonest first.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<ReviewState>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE next_review <= ?1 AND status != 'mastered' ORDER BY next_review, verb",
            SELECT_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![format_timestamp(now)], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_state).collect()
    }

    /// Daily goal counters, with "today" starting at local midnight.
    pub fn daily_goal_stats(&self, now: DateTime<Utc>) -> Result<DailyGoalStats> {
        self.goal_stats_since(start_of_local_day(now), now)
    }

    fn goal_stats_since(
        &self,
        start_of_day: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<DailyGoalStats> {
        let conn = self.db.connect()?;
        let (new_today, due_remaining): (u32, u32) = conn.query_row(
            "SELECT
                (SELECT count(*) FROM learning_progress
                 WHERE last_review >= ?1 AND review_count = 1),
                (SELECT count(*) FROM learning_progress
                 WHERE status = 'learning' AND next_review <= ?2)",
            params![format_timestamp(start_of_day), format_timestamp(now)],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(DailyGoalStats {
            new_today,
            due_remaining,
        })
    }

    /// Stored state, or the implicit new state for a word never reviewed.
    pub fn get(&self, word: &str) -> Result<ReviewState> {
        let word = review_key(word)?;
        let conn = self.db.connect()?;
        Ok(load(&conn, &word)?.unwrap_or_else(|| ReviewState::new(word)))
    }

    /// Every stored state, keyed by word.
    pub fn all(&self) -> Result<BTreeMap<String, ReviewState>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(SELECT_COLUMNS)?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|row| into_state(row).map(|state| (state.word.clone(), state)))
            .collect()
    }
}

type RawRow = (String, u32, String, String, u32, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_state(row: RawRow) -> Result<ReviewState> {
    let (word, stage, last_review, next_review, review_count, status) = row;
    Ok(ReviewState {
        word,
        stage,
        last_review_at: Some(parse_timestamp("last_review", &last_review)?),
        next_review_at: Some(parse_timestamp("next_review", &next_review)?),
        review_count,
        status: ReviewStatus::from_stored(&status),
    })
}

fn load(conn: &Connection, word: &str) -> Result<Option<ReviewState>> {
    let row = conn
        .query_row(
            &format!("{} WHERE verb = ?1", SELECT_COLUMNS),
            params![word],
            read_row,
        )
        .optional()?;
    row.map(into_state).transpose()
}

fn save(conn: &Connection, state: &ReviewState) -> Result<()> {
    let last = state.last_review_at.unwrap_or_else(Utc::now);
    let next = state.next_review_at.unwrap_or(last);
    conn.execute(
        "INSERT OR REPLACE INTO learning_progress
            (verb, stage, last_review, next_review, review_count, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            state.word,
            state.stage,
            format_timestamp(last),
            format_timestamp(next),
            state.review_count,
            state.status.as_str()
        ],
    )?;
    Ok(())
}

fn review_key(word: &str) -> Result<String> {
    let key = normalize_word(word);
    if key.is_empty() {
        return Err(ReviewError::EmptyWord);
    }
    Ok(key)
}

/// Stored timestamps carry milliseconds; drop the rest so returned states
/// match what a later read produces.
fn truncate_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    let millis = ts.timestamp_millis();
    Utc.timestamp_millis_opt(millis).single().unwrap_or(ts)
}

fn start_of_local_day(now: DateTime<Utc>) -> DateTime<Utc> {
    let midnight = now.with_timezone(&Local).date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // Midnight skipped by a DST change
        None => Utc.from_utc_datetime(&midnight),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::models::MASTERED_STAGE;
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_scheduler() -> (ReviewScheduler, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("lexis.db")).unwrap();
        (ReviewScheduler::new(db), temp_dir)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_first_remembered_review() {
        let (scheduler, _temp) = create_test_scheduler();

        let state = scheduler
            .record_review_at("Ability", ReviewOutcome::Remembered, t0())
            .unwrap();
        assert_eq!(state.word, "ability");
        assert_eq!(state.stage, 1);
        assert_eq!(state.status, ReviewStatus::Learning);
        assert_eq!(state.next_review_at, Some(t0() + Duration::minutes(5)));

        assert_eq!(scheduler.get("ability").unwrap(), state);
    }

    #[test]
    fn test_review_count_accumulates() {
        let (scheduler, _temp) = create_test_scheduler();
        scheduler.record_review_at("make", ReviewOutcome::Remembered, t0()).unwrap();
        scheduler.record_review_at("make", ReviewOutcome::Forgotten, t0()).unwrap();
        let state = scheduler
            .record_review_at("make", ReviewOutcome::Remembered, t0())
            .unwrap();

        assert_eq!(state.review_count, 3);
        assert_eq!(state.stage, 1);
    }

    #[test]
    fn test_mark_mastered() {
        let (scheduler, _temp) = create_test_scheduler();
        for _ in 0..3 {
            scheduler.record_review_at("abroad", ReviewOutcome::Remembered, t0()).unwrap();
        }

        let state = scheduler.mark_mastered_at("abroad", t0()).unwrap();
        assert_eq!(state.stage, MASTERED_STAGE);
        assert_eq!(state.status, ReviewStatus::Mastered);
        assert_eq!(state.review_count, 1);
        assert_eq!(scheduler.get("abroad").unwrap().review_count, 1);
    }

    #[test]
    fn test_due_boundary() {
        let (scheduler, _temp) = create_test_scheduler();
        scheduler.record_review_at("make", ReviewOutcome::Forgotten, t0()).unwrap();

        let interval = Duration::minutes(5);
        let before = scheduler.due(t0() + interval - Duration::milliseconds(1)).unwrap();
        assert!(before.is_empty());

        let after = scheduler.due(t0() + interval + Duration::milliseconds(1)).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].word, "make");
    }

    #[test]
    fn test_mastered_never_due() {
        let (scheduler, _temp) = create_test_scheduler();
        scheduler.mark_mastered_at("abroad", t0()).unwrap();
        let far_future = t0() + Duration::days(1000);
        assert!(scheduler.due(far_future).unwrap().is_empty());
    }

    #[test]
    fn test_daily_goal_stats() {
        let (scheduler, _temp) = create_test_scheduler();
        let yesterday = t0() - Duration::days(1);

        // First review today
        scheduler.record_review_at("make", ReviewOutcome::Remembered, t0()).unwrap();
        // First review yesterday, due again now
        scheduler.record_review_at("take", ReviewOutcome::Forgotten, yesterday).unwrap();
        // Reviewed twice today
        scheduler.record_review_at("bring", ReviewOutcome::Remembered, t0()).unwrap();
        scheduler.record_review_at("bring", ReviewOutcome::Remembered, t0()).unwrap();
        // Mastered items are not due
        scheduler.mark_mastered_at("abroad", yesterday).unwrap();

        let start = t0() - Duration::hours(1);
        let stats = scheduler.goal_stats_since(start, t0()).unwrap();
        assert_eq!(stats.new_today, 1);
        assert_eq!(stats.due_remaining, 1);

        let later = scheduler
            .goal_stats_since(start, t0() + Duration::minutes(6))
            .unwrap();
        assert_eq!(later.due_remaining, 2);
    }

    #[test]
    fn test_all_and_missing_get() {
        let (scheduler, _temp) = create_test_scheduler();
        scheduler.record_review_at("make", ReviewOutcome::Remembered, t0()).unwrap();
        scheduler.mark_mastered_at("abroad", t0()).unwrap();

        let all = scheduler.all().unwrap();
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["abroad", "make"]);

        let missing = scheduler.get("absent").unwrap();
        assert_eq!(missing.status, ReviewStatus::New);
        assert!(missing.next_review_at.is_none());
    }

    #[test]
    fn test_empty_word_rejected() {
        let (scheduler, _temp) = create_test_scheduler();
        assert!(matches!(
            scheduler.record_review("  ", ReviewOutcome::Remembered),
            Err(ReviewError::EmptyWord)
        ));
    }

    #[test]
    fn test_start_of_local_day_is_not_after_now() {
        let now = Utc::now();
        let start = start_of_local_day(now);
        assert!(start <= now);
        assert!(now - start < Duration::hours(25));
    }
}
