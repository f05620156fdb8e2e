//! Get-or-generate for explanation text.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;

use super::error::{CacheError, Result};
use super::image::ImageResolver;
use super::models::{normalize_word, CacheEntry, ImageLocator, LookupKey, Mode};
use super::store::CacheStore;
use crate::llm::{Generator, MarkdownNormalizer};
use crate::settings::{Settings, SettingsSource};
use crate::storage::blocking;
use crate::vocabulary::{PartOfSpeech, WordList};

/// Separator between per-word explanations in a multi-word single-mode answer.
pub const SINGLE_SEPARATOR: &str = "\n\n---\n\n";

type Gate = Arc<Mutex<()>>;

/// Prompt text sent to the generator for `mode`.
pub fn build_prompt(mode: Mode, words: &[String]) -> String {
    match mode {
        Mode::Single => format!("请解析\"{}\"", words.join(" ")),
        Mode::List => format!("请解析这组动词：[{}]", words.join(", ")),
        Mode::Compare => format!("请对比以下动词：{}", words.join(", ")),
    }
}

/// Explanation cache in front of a [`Generator`].
///
/// A cached explanation is returned without calling the generator unless a
/// refresh is forced. Concurrent callers for the same uncached key wait on a
/// per-key gate, so the generator runs once and the others read its result.
pub struct ContentCache {
    store: CacheStore,
    generator: Arc<dyn Generator>,
    normalizer: Arc<dyn MarkdownNormalizer>,
    settings: Arc<dyn SettingsSource>,
    words: Option<Arc<WordList>>,
    resolver: ImageResolver,
    in_flight: StdMutex<HashMap<(Mode, LookupKey), Gate>>,
}

impl ContentCache {
    pub fn new(
        store: CacheStore,
        generator: Arc<dyn Generator>,
        normalizer: Arc<dyn MarkdownNormalizer>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            store,
            generator,
            normalizer,
            settings,
            words: None,
            resolver: ImageResolver,
            in_flight: StdMutex::new(HashMap::new()),
        }
    }

    /// Use `words` for part-of-speech hints in single mode.
    pub fn with_word_list(mut self, words: Arc<WordList>) -> Self {
        self.words = Some(words);
        self
    }

    /// Explanation for `terms` under `mode`.
    ///
    /// Single mode explains each term on its own and joins the answers;
    /// list and compare modes explain the group as one entry.
    pub async fn resolve(&self, mode: Mode, terms: &[String], force: bool) -> Result<String> {
        let words: Vec<String> = terms
            .iter()
            .map(|t| normalize_word(t))
            .filter(|t| !t.is_empty())
            .collect();
        if words.is_empty() {
            return Err(CacheError::EmptyInput);
        }

        match mode {
            Mode::Single => {
                let mut parts = Vec::with_capacity(words.len());
                for word in &words {
                    parts.push(self.resolve_word(word, force).await?);
                }
                Ok(parts.join(SINGLE_SEPARATOR))
            }
            Mode::List | Mode::Compare => {
                let key = LookupKey::group(&words).ok_or(CacheError::EmptyInput)?;
                let prompt = build_prompt(mode, &words);
                self.resolve_key(mode, key, &prompt, None, force).await
            }
        }
    }

    /// Explanation for one word in single mode.
    pub async fn resolve_word(&self, word: &str, force: bool) -> Result<String> {
        let key = LookupKey::single(word).ok_or(CacheError::EmptyInput)?;
        let prompt = build_prompt(Mode::Single, &[key.as_str().to_string()]);
        let pos = self.pos_hint(key.as_str());
        self.resolve_key(Mode::Single, key, &prompt, pos, force).await
    }

    fn pos_hint(&self, word: &str) -> Option<PartOfSpeech> {
        self.words.as_ref().and_then(|w| w.pos_hint(word))
    }

    async fn resolve_key(
        &self,
        mode: Mode,
        key: LookupKey,
        prompt: &str,
        pos: Option<PartOfSpeech>,
        force: bool,
    ) -> Result<String> {
        if !force {
            if let Some(entry) = self.read(mode, &key).await? {
                if let Some(content) = entry.cached_content().map(str::to_string) {
                    if mode == Mode::Single {
                        let settings = self.settings.snapshot();
                        let image = self.image_to_write(&key, Some(&entry), &settings, false);
                        self.write_image(&key, image).await?;
                    }
                    return Ok(content);
                }
            }
        }

        let flight = self.enter(mode, &key);
        let _held = flight.gate.lock().await;
        self.generate_locked(mode, &key, prompt, pos, force).await
    }

    async fn generate_locked(
        &self,
        mode: Mode,
        key: &LookupKey,
        prompt: &str,
        pos: Option<PartOfSpeech>,
        force: bool,
    ) -> Result<String> {
        let settings = self.settings.snapshot();

        // Another caller may have filled the row while we waited
        let existing = self.read(mode, key).await?;
        let stale = existing.as_ref().and_then(|e| e.cached_content().map(str::to_string));
        let image = match mode {
            Mode::Single => self.image_to_write(key, existing.as_ref(), &settings, force),
            Mode::List | Mode::Compare => None,
        };
        if let (false, Some(content)) = (force, stale.as_ref()) {
            self.write_image(key, image).await?;
            return Ok(content.clone());
        }

        log::info!("Generating {} explanation for '{}'", mode, key);
        let raw = match self.generator.generate(prompt, &settings.openai_model, pos).await {
            Ok(raw) => raw,
            Err(e) => {
                return match stale {
                    Some(content) => {
                        log::warn!("Generation failed for '{}', serving cached copy: {}", key, e);
                        self.write_image(key, image).await?;
                        Ok(content)
                    }
                    None => Err(CacheError::GenerationUnavailable(e)),
                };
            }
        };
        let content = self.normalizer.normalize(&raw);

        let store = self.store.clone();
        let row_key = key.clone();
        let written = content.clone();
        blocking(move || store.upsert(mode, &row_key, Some(&written), image.as_ref())).await?;
        Ok(content)
    }

    /// Locator to store for a single-mode row: a fresh one on refresh,
    /// otherwise only when the configured provider has none yet.
    fn image_to_write(
        &self,
        key: &LookupKey,
        entry: Option<&CacheEntry>,
        settings: &Settings,
        force: bool,
    ) -> Option<ImageLocator> {
        let provider = settings.image_provider;
        if !force && entry.and_then(|e| e.image_for(provider)).is_some() {
            return None;
        }
        Some(self.resolver.derive(key.as_str(), provider, settings))
    }

    async fn write_image(&self, key: &LookupKey, image: Option<ImageLocator>) -> Result<()> {
        let Some(image) = image else {
            return Ok(());
        };
        let store = self.store.clone();
        let key = key.clone();
        blocking(move || store.set_image(Mode::Single, &key, &image)).await?;
        Ok(())
    }

    async fn read(&self, mode: Mode, key: &LookupKey) -> Result<Option<CacheEntry>> {
        let store = self.store.clone();
        let key = key.clone();
        Ok(blocking(move || store.get(mode, &key)).await?)
    }

    /// Join (or open) the in-flight slot for a key. The slot is released when
    /// the returned guard drops, including when the caller is cancelled.
    fn enter(&self, mode: Mode, key: &LookupKey) -> InFlight<'_> {
        let slot = (mode, key.clone());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        let gate = in_flight
            .entry(slot.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        InFlight {
            map: &self.in_flight,
            slot,
            gate,
        }
    }
}

struct InFlight<'a> {
    map: &'a StdMutex<HashMap<(Mode, LookupKey), Gate>>,
    slot: (Mode, LookupKey),
    gate: Gate,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // Map entry plus ours: nobody else is waiting
        if Arc::strong_count(&self.gate) <= 2 {
            in_flight.remove(&self.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use crate::cache::models::Provider;
    use crate::llm::{GenerationError, MarkdownCleaner};
    use crate::settings::Settings;
    use crate::storage::Database;

    /// Counts calls; fails when `fail` is set.
    struct CountingGenerator {
        calls: AtomicUsize,
        fail: bool,
        delay: Duration,
    }

    impl CountingGenerator {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail,
                delay: Duration::from_millis(0),
            })
        }

        fn slow() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::from_millis(50),
            })
        }

        fn stalled() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: false,
                delay: Duration::from_secs(30),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Generator for CountingGenerator {
        async fn generate(
            &self,
            prompt: &str,
            _model: &str,
            _pos: Option<PartOfSpeech>,
        ) -> std::result::Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            if self.fail {
                return Err(GenerationError::NotConfigured);
            }
            Ok(format!("```markdown\n{} #{}\n```", prompt, n))
        }
    }

    fn create_cache(generator: Arc<CountingGenerator>) -> (ContentCache, CacheStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(Database::open(temp_dir.path().join("lexis.db")).unwrap());
        let cache = ContentCache::new(
            store.clone(),
            generator,
            Arc::new(MarkdownCleaner),
            Arc::new(Settings::default()),
        );
        (cache, store, temp_dir)
    }

    fn terms(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_build_prompt() {
        assert_eq!(build_prompt(Mode::Single, &terms(&["make"])), "请解析\"make\"");
        assert_eq!(
            build_prompt(Mode::List, &terms(&["bring", "take"])),
            "请解析这组动词：[bring, take]"
        );
        assert_eq!(
            build_prompt(Mode::Compare, &terms(&["bring", "take"])),
            "请对比以下动词：bring, take"
        );
    }

    #[tokio::test]
    async fn test_cached_content_skips_generator() {
        let generator = CountingGenerator::new(false);
        let (cache, _store, _temp) = create_cache(generator.clone());

        let first = cache.resolve(Mode::Single, &terms(&["Make"]), false).await.unwrap();
        let second = cache.resolve(Mode::Single, &terms(&["make "]), false).await.unwrap();

        assert_eq!(first, "请解析\"make\" #1");
        assert_eq!(first, second);
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_regenerates() {
        let generator = CountingGenerator::new(false);
        let (cache, _store, _temp) = create_cache(generator.clone());

        cache.resolve(Mode::Single, &terms(&["make"]), false).await.unwrap();
        let refreshed = cache.resolve(Mode::Single, &terms(&["make"]), true).await.unwrap();

        assert_eq!(refreshed, "请解析\"make\" #2");
        assert_eq!(generator.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_serves_stale_copy() {
        let generator = CountingGenerator::new(true);
        let (cache, store, _temp) = create_cache(generator.clone());

        let key = LookupKey::single("make").unwrap();
        store.upsert(Mode::Single, &key, Some("old explanation"), None).unwrap();

        let content = cache.resolve(Mode::Single, &terms(&["make"]), true).await.unwrap();
        assert_eq!(content, "old explanation");
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_without_cache_is_unavailable() {
        let generator = CountingGenerator::new(true);
        let (cache, _store, _temp) = create_cache(generator);

        let result = cache.resolve(Mode::Single, &terms(&["make"]), false).await;
        assert!(matches!(result, Err(CacheError::GenerationUnavailable(_))));
    }

    #[tokio::test]
    async fn test_empty_input_rejected() {
        let generator = CountingGenerator::new(false);
        let (cache, _store, _temp) = create_cache(generator.clone());

        let result = cache.resolve(Mode::List, &terms(&[" ", ""]), false).await;
        assert!(matches!(result, Err(CacheError::EmptyInput)));
        let result = cache.resolve(Mode::Single, &[], false).await;
        assert!(matches!(result, Err(CacheError::EmptyInput)));
        assert_eq!(generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_group_modes_share_sorted_key() {
        let generator = CountingGenerator::new(false);
        let (cache, store, _temp) = create_cache(generator.clone());

        cache.resolve(Mode::Compare, &terms(&["Take", "bring"]), false).await.unwrap();
        cache.resolve(Mode::Compare, &terms(&["bring", "take"]), false).await.unwrap();
        assert_eq!(generator.calls(), 1);

        // Same key under another mode is a different row
        cache.resolve(Mode::List, &terms(&["bring", "take"]), false).await.unwrap();
        assert_eq!(generator.calls(), 2);

        let key = LookupKey::group(&["bring", "take"]).unwrap();
        let entry = store.get(Mode::Compare, &key).unwrap().unwrap();
        assert_eq!(entry.content.as_deref(), Some("请对比以下动词：take, bring #1"));
        assert!(entry.legacy_image.is_none());
    }

    #[tokio::test]
    async fn test_single_mode_joins_words_and_stores_image() {
        let generator = CountingGenerator::new(false);
        let (cache, store, _temp) = create_cache(generator.clone());

        let content = cache.resolve(Mode::Single, &terms(&["make", "do"]), false).await.unwrap();
        assert_eq!(content, format!("请解析\"make\" #1{}请解析\"do\" #2", SINGLE_SEPARATOR));

        let entry = store.get(Mode::Single, &LookupKey::single("do").unwrap()).unwrap().unwrap();
        assert_eq!(
            entry.image_by_provider.get(Provider::Dicebear),
            Some("https://api.dicebear.com/9.x/icons/svg?seed=do")
        );
    }

    #[tokio::test]
    async fn test_concurrent_requests_generate_once() {
        let generator = CountingGenerator::slow();
        let (cache, _store, _temp) = create_cache(generator.clone());
        let cache = Arc::new(cache);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(async move {
                cache.resolve(Mode::Single, &terms(&["abandon"]), false).await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(generator.calls(), 1);
        assert!(results.iter().all(|r| r == &results[0]));
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_request_releases_slot() {
        let generator = CountingGenerator::stalled();
        let (cache, _store, _temp) = create_cache(generator.clone());

        let words = terms(&["abandon"]);
        let result = tokio::time::timeout(
            Duration::from_millis(500),
            cache.resolve(Mode::Single, &words, false),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(generator.calls(), 1);
        assert!(cache.in_flight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cached_content_without_image_gets_one() {
        let generator = CountingGenerator::new(false);
        let (cache, store, _temp) = create_cache(generator.clone());

        let key = LookupKey::single("make").unwrap();
        store.upsert(Mode::Single, &key, Some("cached"), None).unwrap();

        let content = cache.resolve(Mode::Single, &terms(&["make"]), false).await.unwrap();
        assert_eq!(content, "cached");
        assert_eq!(generator.calls(), 0);

        let entry = store.get(Mode::Single, &key).unwrap().unwrap();
        let expected = "https://api.dicebear.com/9.x/icons/svg?seed=make";
        assert_eq!(entry.image_by_provider.get(Provider::Dicebear), Some(expected));
        assert_eq!(entry.legacy_image.as_deref(), Some(expected));
    }

    #[tokio::test]
    async fn test_refresh_replaces_stored_image() {
        let generator = CountingGenerator::new(false);
        let temp_dir = TempDir::new().unwrap();
        let store = CacheStore::new(Database::open(temp_dir.path().join("lexis.db")).unwrap());
        let settings = Settings {
            image_provider: Provider::Pollinations,
            pollinations_api_key: "secret".to_string(),
            ..Settings::default()
        };
        let cache = ContentCache::new(
            store.clone(),
            generator.clone(),
            Arc::new(MarkdownCleaner),
            Arc::new(settings),
        );

        let key = LookupKey::single("make").unwrap();
        let old = ImageLocator::new(
            Provider::Pollinations,
            "https://image.pollinations.ai/prompt/old",
        );
        store.upsert(Mode::Single, &key, Some("cached"), Some(&old)).unwrap();

        // A plain read keeps the stored locator
        cache.resolve(Mode::Single, &terms(&["make"]), false).await.unwrap();
        let entry = store.get(Mode::Single, &key).unwrap().unwrap();
        assert_eq!(entry.image_for(Provider::Pollinations), Some(old.clone()));

        cache.resolve(Mode::Single, &terms(&["make"]), true).await.unwrap();
        let entry = store.get(Mode::Single, &key).unwrap().unwrap();
        let refreshed = entry.image_for(Provider::Pollinations).unwrap();
        assert!(refreshed.address.starts_with("https://gen.pollinations.ai/image/"));
        assert_eq!(generator.calls(), 1);
    }
}
