//! Image locators and the fetch-or-fallback image cache.
//!
//! Dicebear is the guaranteed provider: every failure on another provider
//! converges on a redirect to the word's Dicebear icon, and that locator is
//! stored so later requests skip the failing provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use super::error::{CacheError, Result};
use super::models::{normalize_word, ImageLocator, LookupKey, Mode, Provider};
use super::store::CacheStore;
use crate::settings::{Settings, SettingsSource};
use crate::storage::blocking;

const DICEBEAR_BASE: &str = "https://api.dicebear.com/9.x/icons/svg";
const POLLINATIONS_AUTH_BASE: &str = "https://gen.pollinations.ai/image/";
const POLLINATIONS_ANON_BASE: &str = "https://image.pollinations.ai/prompt/";
const SEED_MODULUS: u128 = 1_000_000;

/// Default timeout for provider fetches.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const DEFAULT_CONTENT_TYPE: &str = "image/svg+xml";

/// Derives deterministic image locators. No I/O.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageResolver;

impl ImageResolver {
    pub fn derive(&self, word: &str, provider: Provider, settings: &Settings) -> ImageLocator {
        let word = normalize_word(word);
        match provider {
            Provider::Dicebear => self.dicebear(&word),
            Provider::Pollinations => {
                let prompt = format!(
                    "minimalist vector illustration of action {} white background",
                    word
                );
                let base = if settings.has_pollinations_key() {
                    POLLINATIONS_AUTH_BASE
                } else {
                    POLLINATIONS_ANON_BASE
                };
                let address = format!(
                    "{}{}?model={}&nologo=true&seed={}",
                    base,
                    urlencoding::encode(&prompt),
                    urlencoding::encode(&settings.pollinations_model),
                    stable_seed(&word)
                );
                ImageLocator::new(Provider::Pollinations, address)
            }
        }
    }

    /// Dicebear icon keyed only by the word; infinitely cacheable.
    pub fn dicebear(&self, word: &str) -> ImageLocator {
        let address = format!(
            "{}?seed={}",
            DICEBEAR_BASE,
            urlencoding::encode(&normalize_word(word))
        );
        ImageLocator::new(Provider::Dicebear, address)
    }
}

/// md5 of the word reduced to six digits, so a word always addresses the same
/// remote image.
pub fn stable_seed(word: &str) -> u32 {
    let digest = md5::compute(word.as_bytes());
    (u128::from_be_bytes(digest.0) % SEED_MODULUS) as u32
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Generic HTTP GET capability.
#[async_trait]
pub trait HttpFetch: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> std::result::Result<FetchResponse, FetchError>;
}

/// [`HttpFetch`] over a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> std::result::Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(FETCH_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetcher {
    async fn fetch(
        &self,
        url: &str,
        headers: &[(&str, String)],
        timeout: Duration,
    ) -> std::result::Result<FetchResponse, FetchError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

/// What the caller should serve for an image request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageResponse {
    Redirect(String),
    Bytes { body: Vec<u8>, content_type: String },
}

/// Get-or-derive-or-fallback for per-word images.
pub struct ImageCache {
    store: CacheStore,
    resolver: ImageResolver,
    fetcher: Arc<dyn HttpFetch>,
    settings: Arc<dyn SettingsSource>,
}

impl ImageCache {
    pub fn new(
        store: CacheStore,
        fetcher: Arc<dyn HttpFetch>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            store,
            resolver: ImageResolver,
            fetcher,
            settings,
        }
    }

    /// Stored locator for the configured provider, deriving and persisting
    /// one when the row has none.
    pub async fn ensure_locator(&self, word: &str) -> Result<ImageLocator> {
        let settings = self.settings.snapshot();
        self.locator_with(word, &settings).await
    }

    async fn locator_with(&self, word: &str, settings: &Settings) -> Result<ImageLocator> {
        let key = LookupKey::single(word).ok_or(CacheError::EmptyInput)?;
        let provider = settings.image_provider;

        let store = self.store.clone();
        let lookup = key.clone();
        let entry = blocking(move || store.get(Mode::Single, &lookup)).await?;
        if let Some(locator) = entry.and_then(|e| e.image_for(provider)) {
            return Ok(locator);
        }

        let locator = self.resolver.derive(key.as_str(), provider, settings);
        let store = self.store.clone();
        let written = locator.clone();
        blocking(move || store.set_image(Mode::Single, &key, &written)).await?;
        Ok(locator)
    }

    /// Resolve the image for `word`. Provider failures never surface; only
    /// blank input and errors reading or deriving the stored locator do.
    pub async fn resolve(&self, word: &str) -> Result<ImageResponse> {
        let settings = self.settings.snapshot();
        let locator = self.locator_with(word, &settings).await?;

        if locator.provider.is_redirect_safe() {
            return Ok(ImageResponse::Redirect(locator.address));
        }

        match self.fetch_checked(&locator, &settings).await {
            Ok(response) => Ok(response),
            Err(reason) => {
                log::debug!(
                    "Image provider {} failed for '{}': {}",
                    locator.provider,
                    word,
                    reason
                );
                Ok(self.fall_back(word).await)
            }
        }
    }

    async fn fetch_checked(
        &self,
        locator: &ImageLocator,
        settings: &Settings,
    ) -> std::result::Result<ImageResponse, String> {
        let mut headers = vec![("User-Agent", USER_AGENT.to_string())];
        if locator.address.starts_with(POLLINATIONS_AUTH_BASE) && settings.has_pollinations_key() {
            headers.push((
                "Authorization",
                format!("Bearer {}", settings.pollinations_api_key.trim()),
            ));
        }

        let response = self
            .fetcher
            .fetch(&locator.address, &headers, FETCH_TIMEOUT)
            .await
            .map_err(|e| e.to_string())?;

        if response.status != 200 {
            return Err(format!("status {}", response.status));
        }

        let content_type = response
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        if !content_type.trim().to_lowercase().starts_with("image/") {
            return Err(format!("content type {}", content_type));
        }

        Ok(ImageResponse::Bytes {
            body: response.body,
            content_type,
        })
    }

    /// Redirect to the Dicebear icon and remember it as the word's Dicebear locator.
    async fn fall_back(&self, word: &str) -> ImageResponse {
        let fallback = self.resolver.dicebear(word);
        if let Some(key) = LookupKey::single(word) {
            let store = self.store.clone();
            let written = fallback.clone();
            // The redirect is served even when remembering it fails
            if let Err(e) = blocking(move || store.set_image(Mode::Single, &key, &written)).await {
                log::warn!("Failed to store fallback image for '{}': {}", word, e);
            }
        }
        ImageResponse::Redirect(fallback.address)
    }
}
