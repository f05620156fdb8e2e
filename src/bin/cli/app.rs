use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use lexis_lib::cache::{CacheStore, ContentCache, ImageCache, ReqwestFetcher};
use lexis_lib::llm::{MarkdownCleaner, OpenAiClient};
use lexis_lib::review::{CheckinStore, LearnBatchStore, ReviewScheduler};
use lexis_lib::settings::{ConfigFile, SettingsSource};
use lexis_lib::storage::Database;
use lexis_lib::vocabulary::WordList;

const WORDS_FILE_NAME: &str = "vocabulary.json";

/// Shared application state for CLI commands
pub struct App {
    pub db: Database,
    pub config: Arc<ConfigFile>,
    pub store: CacheStore,
}

impl App {
    /// Open the database and config, using default locations unless overridden
    pub fn new(db_path: Option<&Path>, config_path: Option<&Path>) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path.to_path_buf(),
            None => Database::default_path().context("Failed to get data directory")?,
        };
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => ConfigFile::default_path().context("Failed to get config directory")?,
        };

        let db = Database::open(db_path.clone())
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let store = CacheStore::new(db.clone());

        Ok(Self {
            db,
            config: Arc::new(ConfigFile::new(config_path)),
            store,
        })
    }

    pub fn settings(&self) -> Arc<dyn SettingsSource> {
        self.config.clone()
    }

    /// Explicit path, else `vocabulary.json` next to the database.
    pub fn words_path(&self, explicit: Option<&Path>) -> PathBuf {
        match explicit {
            Some(path) => path.to_path_buf(),
            None => self
                .db
                .path()
                .parent()
                .map(|dir| dir.join(WORDS_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(WORDS_FILE_NAME)),
        }
    }

    /// Load the vocabulary list; a missing default file is not an error.
    pub fn word_list(&self, explicit: Option<&Path>) -> Result<Option<Arc<WordList>>> {
        let path = self.words_path(explicit);
        if explicit.is_none() && !path.exists() {
            return Ok(None);
        }
        let list = WordList::load(&path)
            .with_context(|| format!("Failed to load word list {}", path.display()))?;
        log::info!("Loaded {} words from {}", list.len(), path.display());
        Ok(Some(Arc::new(list)))
    }

    pub fn content_cache(&self, words: Option<Arc<WordList>>) -> Result<ContentCache> {
        let generator = OpenAiClient::new(self.settings()).context("Failed to build HTTP client")?;
        let cache = ContentCache::new(
            self.store.clone(),
            Arc::new(generator),
            Arc::new(MarkdownCleaner),
            self.settings(),
        );
        Ok(match words {
            Some(words) => cache.with_word_list(words),
            None => cache,
        })
    }

    pub fn image_cache(&self) -> Result<ImageCache> {
        let fetcher = ReqwestFetcher::new().context("Failed to build HTTP client")?;
        Ok(ImageCache::new(self.store.clone(), Arc::new(fetcher), self.settings()))
    }

    pub fn scheduler(&self) -> ReviewScheduler {
        ReviewScheduler::new(self.db.clone())
    }

    pub fn checkins(&self) -> CheckinStore {
        CheckinStore::new(self.db.clone())
    }

    pub fn learn_batch(&self) -> LearnBatchStore {
        LearnBatchStore::new(self.db.clone())
    }
}
