//! Daily check-ins and the current learn batch

use chrono::NaiveDate;
use rusqlite::params;

use super::storage::{ReviewError, Result};
use crate::cache::normalize_word;
use crate::storage::Database;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Set of calendar dates the learner checked in on
#[derive(Debug, Clone)]
pub struct CheckinStore {
    db: Database,
}

impl CheckinStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// All check-in dates, oldest first.
    pub fn list(&self) -> Result<Vec<NaiveDate>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare("SELECT date FROM checkins ORDER BY date")?;
        let dates = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        dates.iter().map(|d| parse_date(d)).collect()
    }

    /// Add a check-in; adding an existing date is a no-op.
    pub fn add(&self, date: &str) -> Result<NaiveDate> {
        let date = parse_date(date)?;
        let conn = self.db.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO checkins (date) VALUES (?1)",
            params![date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(date)
    }

    /// Remove a check-in. Returns whether a date was removed.
    pub fn remove(&self, date: &str) -> Result<bool> {
        let date = parse_date(date)?;
        let conn = self.db.connect()?;
        let removed = conn.execute(
            "DELETE FROM checkins WHERE date = ?1",
            params![date.format(DATE_FORMAT).to_string()],
        )?;
        Ok(removed > 0)
    }
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|_| ReviewError::InvalidDate(value.to_string()))
}

/// The learner's current working set of words
#[derive(Debug, Clone)]
pub struct LearnBatchStore {
    db: Database,
}

impl LearnBatchStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare("SELECT verb FROM learn_batch ORDER BY verb")?;
        let words = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(words)
    }

    /// Replace the whole batch in one transaction.
    pub fn replace<S: AsRef<str>>(&self, words: &[S]) -> Result<usize> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM learn_batch", [])?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO learn_batch (verb) VALUES (?1)")?;
            for word in words {
                let word = normalize_word(word.as_ref());
                if !word.is_empty() {
                    inserted += stmt.execute(params![word])?;
                }
            }
        }
        tx.commit()?;
        log::debug!("Learn batch replaced with {} words", inserted);
        Ok(inserted)
    }

    pub fn clear(&self) -> Result<()> {
        let conn = self.db.connect()?;
        conn.execute("DELETE FROM learn_batch", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::open(temp_dir.path().join("lexis.db")).unwrap();
        (db, temp_dir)
    }

    #[test]
    fn test_checkins_are_idempotent() {
        let (db, _temp) = create_test_db();
        let store = CheckinStore::new(db);

        store.add("2026-03-02").unwrap();
        store.add("2026-03-01").unwrap();
        store.add("2026-03-02").unwrap();

        let dates = store.list().unwrap();
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2026, 3, 1).unwrap());

        assert!(store.remove("2026-03-01").unwrap());
        assert!(!store.remove("2026-03-01").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let (db, _temp) = create_test_db();
        let store = CheckinStore::new(db);
        assert!(matches!(store.add("yesterday"), Err(ReviewError::InvalidDate(_))));
        assert!(matches!(store.add("2026-02-30"), Err(ReviewError::InvalidDate(_))));
    }

    #[test]
    fn test_learn_batch_replace_and_clear() {
        let (db, _temp) = create_test_db();
        let store = LearnBatchStore::new(db);

        store.replace(&["make", "take"]).unwrap();
        assert_eq!(store.replace(&["Bring", "bring", " ", "do"]).unwrap(), 2);
        assert_eq!(store.list().unwrap(), vec!["bring", "do"]);

        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
