//! SQLite database backing the explanation cache and review progress.
//!
//! Layout:
//! ```text
//! explanations       (mode, query_key) unique; content + per-provider image columns
//! learning_progress  verb -> stage / timestamps / review_count / status
//! checkins           calendar dates
//! learn_batch        current working set of words
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Invalid timestamp in column {column}: {value}")]
    InvalidTimestamp { column: &'static str, value: String },

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the on-disk database.
///
/// Cheap to clone; every operation opens its own connection so workers on
/// different threads never share a `Connection`.
#[derive(Debug, Clone)]
pub struct Database {
    db_path: PathBuf,
}

impl Database {
    /// Open (and create if needed) the database at `db_path`, applying the
    /// schema and the legacy image and timestamp migrations.
    pub fn open(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self { db_path };
        let conn = db.connect()?;
        init_schema(&conn)?;
        migrate_legacy_images(&conn)?;
        migrate_legacy_timestamps(&conn)?;
        Ok(db)
    }

    /// Default database location under the user's local data directory.
    pub fn default_path() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("lexis").join("lexis.db"))
            .ok_or(StorageError::DataDirNotFound)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection for one operation.
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Ok(conn)
    }

    /// Wipe explanations, review progress, check-ins and the learn batch.
    pub fn clear_all(&self) -> Result<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM learning_progress", [])?;
        tx.execute("DELETE FROM checkins", [])?;
        tx.execute("DELETE FROM learn_batch", [])?;
        tx.execute("DELETE FROM explanations", [])?;
        tx.commit()?;
        log::info!("Cleared all cached explanations and learning progress");
        Ok(())
    }
}

/// Run a blocking storage closure on tokio's blocking pool.
pub async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
}

/// Format a timestamp as fixed-width RFC 3339 so text ordering matches time ordering.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp {
            column,
            value: value.to_string(),
        })
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS explanations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mode TEXT NOT NULL,
            query_key TEXT NOT NULL,
            content TEXT,
            image_url TEXT,
            image_dicebear TEXT,
            image_pollinations TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(mode, query_key)
        );

        CREATE TABLE IF NOT EXISTS learning_progress (
            verb TEXT PRIMARY KEY,
            stage INTEGER NOT NULL DEFAULT 0,
            last_review TEXT NOT NULL,
            next_review TEXT NOT NULL,
            review_count INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'new'
        );

        CREATE TABLE IF NOT EXISTS checkins (
            date TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS learn_batch (
            verb TEXT PRIMARY KEY
        );

        CREATE INDEX IF NOT EXISTS idx_progress_next_review ON learning_progress(next_review);
        "#,
    )?;

    // Older databases predate the image columns.
    for column in ["image_url", "image_dicebear", "image_pollinations"] {
        if column_info(conn, "explanations", column)?.is_none() {
            conn.execute(
                &format!("ALTER TABLE explanations ADD COLUMN {} TEXT", column),
                [],
            )?;
        }
    }

    // Older databases also declared content NOT NULL, which blocks image-only rows.
    if column_info(conn, "explanations", "content")? == Some(true) {
        relax_content_column(conn)?;
    }

    Ok(())
}

/// `Some(not_null)` when the column exists.
fn column_info(conn: &Connection, table: &str, column: &str) -> Result<Option<bool>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns
        .into_iter()
        .find(|(name, _)| name == column)
        .map(|(_, not_null)| not_null != 0))
}

fn relax_content_column(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        BEGIN;
        CREATE TABLE explanations_next (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            mode TEXT NOT NULL,
            query_key TEXT NOT NULL,
            content TEXT,
            image_url TEXT,
            image_dicebear TEXT,
            image_pollinations TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(mode, query_key)
        );
        INSERT INTO explanations_next
            (id, mode, query_key, content, image_url, image_dicebear, image_pollinations, created_at)
            SELECT id, mode, query_key, content, image_url, image_dicebear, image_pollinations, created_at
            FROM explanations;
        DROP TABLE explanations;
        ALTER TABLE explanations_next RENAME TO explanations;
        COMMIT;
        "#,
    )?;
    log::info!("Relaxed NOT NULL constraint on explanations.content");
    Ok(())
}

/// Copy legacy single-column image URLs into the matching provider column.
fn migrate_legacy_images(conn: &Connection) -> Result<()> {
    let pending: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM explanations
             WHERE (image_url LIKE '%dicebear.com%' AND image_dicebear IS NULL)
                OR (image_url LIKE '%pollinations.ai%' AND image_pollinations IS NULL)
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if pending.is_none() {
        return Ok(());
    }

    let migrated = conn.execute(
        "UPDATE explanations SET image_dicebear = image_url
         WHERE image_url LIKE '%dicebear.com%' AND (image_dicebear IS NULL OR image_dicebear = '')",
        params![],
    )? + conn.execute(
        "UPDATE explanations SET image_pollinations = image_url
         WHERE image_url LIKE '%pollinations.ai%' AND (image_pollinations IS NULL OR image_pollinations = '')",
        params![],
    )?;

    log::info!("Migrated {} legacy image locators into provider columns", migrated);
    Ok(())
}

/// Rewrite review timestamps stored in older formats as fixed-width UTC.
fn migrate_legacy_timestamps(conn: &Connection) -> Result<()> {
    let mut stmt = conn.prepare(
        "SELECT verb, last_review, next_review FROM learning_progress
         WHERE last_review IS NOT NULL AND next_review IS NOT NULL
           AND (last_review NOT LIKE '%Z' OR next_review NOT LIKE '%Z')",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        return Ok(());
    }

    let mut migrated = 0;
    for (verb, last_review, next_review) in rows {
        match (legacy_timestamp(&last_review), legacy_timestamp(&next_review)) {
            (Some(last), Some(next)) => {
                conn.execute(
                    "UPDATE learning_progress SET last_review = ?1, next_review = ?2
                     WHERE verb = ?3",
                    params![format_timestamp(last), format_timestamp(next), verb],
                )?;
                migrated += 1;
            }
            _ => log::warn!(
                "Unrecognised review timestamps for '{}': {} / {}",
                verb,
                last_review,
                next_review
            ),
        }
    }

    log::info!("Migrated {} legacy review timestamps", migrated);
    Ok(())
}

/// Parse an RFC 3339 value, a naive ISO value in local time, or SQLite's
/// `CURRENT_TIMESTAMP` form (UTC).
fn legacy_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        // Same wall-clock time read as UTC when local time skips it
        return Some(match Local.from_local_datetime(&naive).earliest() {
            Some(local) => local.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&naive),
        });
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_tables() {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("nested").join("lexis.db")).unwrap();
        let conn = db.connect().unwrap();

        for table in ["explanations", "learning_progress", "checkins", "learn_batch"] {
            let count: i64 = conn
                .query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
        assert_eq!(
            column_info(&conn, "explanations", "image_dicebear").unwrap(),
            Some(false)
        );
    }

    #[test]
    fn test_legacy_rows_are_migrated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE explanations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    mode TEXT NOT NULL,
                    query_key TEXT NOT NULL,
                    content TEXT NOT NULL,
                    image_url TEXT,
                    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    UNIQUE(mode, query_key)
                );
                INSERT INTO explanations (mode, query_key, content, image_url)
                VALUES ('single', 'make', 'm', 'https://api.dicebear.com/9.x/icons/svg?seed=make'),
                       ('single', 'take', 't', 'https://image.pollinations.ai/prompt/x?seed=1');",
            )
            .unwrap();
        }

        let db = Database::open(path).unwrap();
        let conn = db.connect().unwrap();
        let (dicebear, pollinations): (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT image_dicebear, image_pollinations FROM explanations WHERE query_key = 'make'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(
            dicebear.as_deref(),
            Some("https://api.dicebear.com/9.x/icons/svg?seed=make")
        );
        assert!(pollinations.is_none());

        let pollinations: Option<String> = conn
            .query_row(
                "SELECT image_pollinations FROM explanations WHERE query_key = 'take'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(pollinations.unwrap().contains("pollinations.ai"));
        assert_eq!(column_info(&conn, "explanations", "content").unwrap(), Some(false));
    }

    #[test]
    fn test_legacy_review_timestamps_are_migrated() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE learning_progress (
                    verb TEXT PRIMARY KEY,
                    stage INTEGER DEFAULT 0,
                    last_review TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    next_review TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                    review_count INTEGER DEFAULT 0,
                    status TEXT DEFAULT 'new'
                );
                INSERT INTO learning_progress VALUES
                    ('abandon', 1, '2026-03-01T09:00:00.123456', '2026-03-01T09:05:00.123456',
                     1, 'learning'),
                    ('ability', 2, '2026-03-01 09:00:00', '2026-03-01 09:30:00', 2, 'learning'),
                    ('abroad', 9, '2026-03-01T09:00:00.000Z', '2027-03-01T09:00:00.000Z',
                     1, 'mastered');",
            )
            .unwrap();
        }

        let db = Database::open(path).unwrap();
        let conn = db.connect().unwrap();
        let read = |verb: &str| -> (String, String) {
            conn.query_row(
                "SELECT last_review, next_review FROM learning_progress WHERE verb = ?1",
                params![verb],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap()
        };

        let naive =
            NaiveDateTime::parse_from_str("2026-03-01T09:00:00.123", "%Y-%m-%dT%H:%M:%S%.f")
                .unwrap();
        let local = Local.from_local_datetime(&naive).earliest().unwrap();
        let (last, next) = read("abandon");
        assert_eq!(last, format_timestamp(local.with_timezone(&Utc)));
        let gap = parse_timestamp("next_review", &next).unwrap()
            - parse_timestamp("last_review", &last).unwrap();
        assert_eq!(gap, chrono::Duration::minutes(5));

        assert_eq!(
            read("ability"),
            (
                "2026-03-01T09:00:00.000Z".to_string(),
                "2026-03-01T09:30:00.000Z".to_string()
            )
        );
        assert_eq!(read("abroad").0, "2026-03-01T09:00:00.000Z");

        let states = crate::review::ReviewScheduler::new(db.clone()).all().unwrap();
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn test_clear_all() {
        let temp = TempDir::new().unwrap();
        let db = Database::open(temp.path().join("lexis.db")).unwrap();
        let conn = db.connect().unwrap();
        conn.execute("INSERT INTO checkins (date) VALUES ('2026-01-01')", [])
            .unwrap();
        conn.execute("INSERT INTO learn_batch (verb) VALUES ('make')", [])
            .unwrap();

        db.clear_all().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT (SELECT count(*) FROM checkins) + (SELECT count(*) FROM learn_batch)",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_timestamp_roundtrip_is_ordered() {
        let early = parse_timestamp("t", "2026-01-01T09:00:00.000Z").unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(early) < format_timestamp(late));
        assert_eq!(parse_timestamp("t", &format_timestamp(late)).unwrap(), late);
    }
}
