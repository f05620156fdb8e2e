use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::{
    normalize_word, CacheError, CacheStore, ContentCache, ImageCache, LookupKey, Mode,
};
use crate::storage::blocking;

/// Default number of parallel workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default per-item deadline, covering generation plus image population.
pub const DEFAULT_ITEM_TIMEOUT: Duration = Duration::from_secs(150);

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub concurrency: usize,
    /// Regenerate words that already have an explanation
    pub force: bool,
    /// Process at most this many words; 0 means no limit
    pub limit: usize,
    pub item_timeout: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            force: false,
            limit: 0,
            item_timeout: DEFAULT_ITEM_TIMEOUT,
        }
    }
}

/// Outcome of one failed item
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub word: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Words in the list, before filtering
    pub total: usize,
    /// Words skipped because they were already cached
    pub skipped: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Wall time divided by successes.
    pub fn avg_per_success(&self) -> Option<Duration> {
        u32::try_from(self.succeeded)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.elapsed / n)
    }
}

/// Bulk population of explanations and image locators.
///
/// Items run on a bounded worker pool; a failure is logged and counted for
/// that item only.
pub struct BatchRunner {
    store: CacheStore,
    content: Arc<ContentCache>,
    images: Option<Arc<ImageCache>>,
}

impl BatchRunner {
    pub fn new(store: CacheStore, content: Arc<ContentCache>) -> Self {
        Self {
            store,
            content,
            images: None,
        }
    }

    /// Also store an image locator for each processed word.
    pub fn with_images(mut self, images: Arc<ImageCache>) -> Self {
        self.images = Some(images);
        self
    }

    /// Words from `items` that this run would process.
    pub async fn work_set(
        &self,
        items: &[String],
        options: &BatchOptions,
    ) -> Result<Vec<String>, CacheError> {
        let mut seen = HashSet::new();
        let mut words: Vec<String> = items
            .iter()
            .map(|w| normalize_word(w))
            .filter(|w| !w.is_empty() && seen.insert(w.clone()))
            .collect();

        if !options.force {
            let store = self.store.clone();
            let cached = blocking(move || store.cached_keys(Mode::Single)).await?;
            words.retain(|w| {
                LookupKey::single(w).map_or(false, |key| !cached.contains(&key))
            });
        }

        if options.limit > 0 {
            words.truncate(options.limit);
        }
        Ok(words)
    }

    pub async fn run_all(
        &self,
        items: &[String],
        options: &BatchOptions,
    ) -> Result<RunSummary, CacheError> {
        let started = Instant::now();
        let words = self.work_set(items, options).await?;
        let total = items.len();
        let attempted = words.len();

        log::info!(
            "Batch: {} words in list, {} to process ({} workers)",
            total,
            attempted,
            options.concurrency.max(1)
        );

        let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, word) in words.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let content = self.content.clone();
            let images = self.images.clone();
            let force = options.force;
            let deadline = options.item_timeout;

            tasks.spawn(async move {
                let position = format!("[{}/{}]", index + 1, attempted);
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        log::info!("{} Processing: {}", position, word);
                        let work = process_item(&content, images.as_deref(), &word, force);
                        match tokio::time::timeout(deadline, work).await {
                            Ok(result) => result,
                            Err(_) => Err(format!("timed out after {}s", deadline.as_secs())),
                        }
                    }
                    Err(e) => Err(e.to_string()),
                };

                match &outcome {
                    Ok(()) => log::info!("{} DONE: {}", position, word),
                    Err(reason) => log::warn!("{} FAILED: {} ({})", position, word, reason),
                }
                (word, outcome)
            });
        }

        let mut succeeded = 0;
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => succeeded += 1,
                Ok((word, Err(reason))) => failures.push(ItemFailure { word, reason }),
                Err(e) => failures.push(ItemFailure {
                    word: String::new(),
                    reason: e.to_string(),
                }),
            }
        }
        failures.sort_by(|a, b| a.word.cmp(&b.word));

        let summary = RunSummary {
            total,
            skipped: total.saturating_sub(attempted),
            attempted,
            succeeded,
            failures,
            elapsed: started.elapsed(),
        };
        log::info!(
            "Batch finished: {}/{} succeeded in {:.1}s",
            summary.succeeded,
            summary.attempted,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }
}

async fn process_item(
    content: &ContentCache,
    images: Option<&ImageCache>,
    word: &str,
    force: bool,
) -> Result<(), String> {
    content
        .resolve_word(word, force)
        .await
        .map_err(|e| e.to_string())?;
    if let Some(images) = images {
        images.ensure_locator(word).await.map_err(|e| e.to_string())?;
    }
    Ok(())
}
