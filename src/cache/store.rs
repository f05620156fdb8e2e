//! Durable (mode, key) -> entry storage.
//!
//! Writes are merges: a missing content leaves stored content alone, and an
//! image locator only touches the legacy column plus its own provider column.
//! Each read-merge-write runs in one immediate transaction, so writers to the
//! same row serialize while readers and other rows proceed.

use std::collections::HashSet;

use rusqlite::{params, OptionalExtension, TransactionBehavior};

use super::models::{CacheEntry, ImageLocator, LookupKey, Mode, ProviderImages};
use crate::storage::{Database, Result};

#[derive(Debug, Clone)]
pub struct CacheStore {
    db: Database,
}

impl CacheStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stored entry for (mode, key), or `None` when there is no row.
    pub fn get(&self, mode: Mode, key: &LookupKey) -> Result<Option<CacheEntry>> {
        let conn = self.db.connect()?;
        let entry = conn
            .query_row(
                "SELECT content, image_url, image_dicebear, image_pollinations
                 FROM explanations WHERE mode = ?1 AND query_key = ?2",
                params![mode.as_str(), key.as_str()],
                |row| {
                    Ok(CacheEntry {
                        mode,
                        key: key.clone(),
                        content: row.get(0)?,
                        legacy_image: row.get(1)?,
                        image_by_provider: ProviderImages {
                            dicebear: row.get(2)?,
                            pollinations: row.get(3)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Merge `content` and/or `image` into the (mode, key) row.
    pub fn upsert(
        &self,
        mode: Mode,
        key: &LookupKey,
        content: Option<&str>,
        image: Option<&ImageLocator>,
    ) -> Result<()> {
        let mut conn = self.db.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(Option<String>, Option<String>, Option<String>, Option<String>)> = tx
            .query_row(
                "SELECT content, image_url, image_dicebear, image_pollinations
                 FROM explanations WHERE mode = ?1 AND query_key = ?2",
                params![mode.as_str(), key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let (old_content, old_legacy, dicebear, pollinations) =
            existing.unwrap_or((None, None, None, None));
        let mut images = ProviderImages {
            dicebear,
            pollinations,
        };

        let content = content.map(str::to_string).or(old_content);
        let legacy = match image {
            Some(locator) => {
                images.set(locator);
                Some(locator.address.clone())
            }
            None => old_legacy,
        };

        tx.execute(
            "INSERT INTO explanations
                (mode, query_key, content, image_url, image_dicebear, image_pollinations)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(mode, query_key) DO UPDATE SET
                content = excluded.content,
                image_url = excluded.image_url,
                image_dicebear = excluded.image_dicebear,
                image_pollinations = excluded.image_pollinations",
            params![
                mode.as_str(),
                key.as_str(),
                content,
                legacy,
                images.dicebear,
                images.pollinations
            ],
        )?;
        tx.commit()?;

        log::debug!(
            "Cached {}:{} (content: {}, image: {})",
            mode,
            key,
            content.is_some(),
            image.map(|i| i.provider.as_str()).unwrap_or("-")
        );
        Ok(())
    }

    /// Write one provider's locator without touching content.
    pub fn set_image(&self, mode: Mode, key: &LookupKey, image: &ImageLocator) -> Result<()> {
        self.upsert(mode, key, None, Some(image))
    }

    /// All keys of `mode` that have explanation content.
    pub fn cached_keys(&self, mode: Mode) -> Result<HashSet<LookupKey>> {
        let conn = self.db.connect()?;
        let mut stmt = conn.prepare(
            "SELECT query_key FROM explanations
             WHERE mode = ?1 AND content IS NOT NULL AND content != ''",
        )?;
        let keys = stmt
            .query_map(params![mode.as_str()], |row| row.get::<_, String>(0))?
            .map(|r| r.map(LookupKey::from_stored))
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    /// The subset of `keys` that already have explanation content.
    pub fn filter_cached(&self, mode: Mode, keys: &[LookupKey]) -> Result<Vec<LookupKey>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let cached = self.cached_keys(mode)?;
        Ok(keys.iter().filter(|k| cached.contains(*k)).cloned().collect())
    }
}
