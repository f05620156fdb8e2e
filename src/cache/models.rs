//! Data models for the explanation/image cache

use std::fmt;

use serde::{Deserialize, Serialize};

/// Query shape; decides key normalization and the prompt template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// One word per entry
    Single,
    /// A group of words explained together
    List,
    /// A group of words contrasted against each other
    Compare,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Single => "single",
            Mode::List => "list",
            Mode::Compare => "compare",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize one word: trimmed and lowercased.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Split raw user input into terms: on commas if any are present, otherwise
/// on whitespace.
pub fn parse_terms(input: &str) -> Vec<String> {
    let parts: Vec<&str> = if input.contains(',') {
        input.split(',').collect()
    } else {
        input.split_whitespace().collect()
    };

    parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalized secondary key of a cache row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LookupKey(String);

impl LookupKey {
    /// Key for a single word. `None` when the word is blank.
    pub fn single(word: &str) -> Option<Self> {
        let key = normalize_word(word);
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    /// Key for a group of words: normalized, sorted, comma-joined.
    pub fn group<S: AsRef<str>>(words: &[S]) -> Option<Self> {
        let mut normalized: Vec<String> = words
            .iter()
            .map(|w| normalize_word(w.as_ref()))
            .filter(|w| !w.is_empty())
            .collect();
        if normalized.is_empty() {
            return None;
        }
        normalized.sort();
        Some(Self(normalized.join(",")))
    }

    /// Wrap a key read back from storage.
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Image backend identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Seed-based icon service; deterministic and always reachable
    Dicebear,
    /// Generative image service
    Pollinations,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Dicebear => "dicebear",
            Provider::Pollinations => "pollinations",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "dicebear" => Some(Provider::Dicebear),
            "pollinations" => Some(Provider::Pollinations),
            _ => None,
        }
    }

    /// Recognise the provider of a legacy, untagged URL.
    pub fn detect(url: &str) -> Option<Self> {
        if url.contains("dicebear.com") {
            Some(Provider::Dicebear)
        } else if url.contains("pollinations.ai") {
            Some(Provider::Pollinations)
        } else {
            None
        }
    }

    /// Whether callers can be redirected without fetching first.
    pub fn is_redirect_safe(&self) -> bool {
        matches!(self, Provider::Dicebear)
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image address tagged with the provider that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageLocator {
    pub provider: Provider,
    pub address: String,
}

impl ImageLocator {
    pub fn new(provider: Provider, address: impl Into<String>) -> Self {
        Self {
            provider,
            address: address.into(),
        }
    }
}

/// Per-provider image slots of a cache row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderImages {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dicebear: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pollinations: Option<String>,
}

impl ProviderImages {
    pub fn get(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Dicebear => self.dicebear.as_deref(),
            Provider::Pollinations => self.pollinations.as_deref(),
        }
        .filter(|s| !s.is_empty())
    }

    pub fn set(&mut self, locator: &ImageLocator) {
        let slot = match locator.provider {
            Provider::Dicebear => &mut self.dicebear,
            Provider::Pollinations => &mut self.pollinations,
        };
        *slot = Some(locator.address.clone());
    }
}

/// One cached row, identified by (mode, key).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub mode: Mode,
    pub key: LookupKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_image: Option<String>,
    #[serde(default)]
    pub image_by_provider: ProviderImages,
}

impl CacheEntry {
    /// Cached explanation text, ignoring empty rows created by image writes.
    pub fn cached_content(&self) -> Option<&str> {
        self.content.as_deref().filter(|c| !c.is_empty())
    }

    /// Locator for `provider`: its own slot first, then the legacy column if
    /// that URL belongs to the same provider.
    pub fn image_for(&self, provider: Provider) -> Option<ImageLocator> {
        if let Some(address) = self.image_by_provider.get(provider) {
            return Some(ImageLocator::new(provider, address));
        }

        self.legacy_image
            .as_deref()
            .filter(|url| Provider::detect(url) == Some(provider))
            .map(|url| ImageLocator::new(provider, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key_normalization() {
        assert_eq!(LookupKey::single("  Abandon ").unwrap().as_str(), "abandon");
        assert!(LookupKey::single("   ").is_none());
    }

    #[test]
    fn test_group_key_is_sorted() {
        let key = LookupKey::group(&["Take", " bring", "fetch "]).unwrap();
        assert_eq!(key.as_str(), "bring,fetch,take");

        let same = LookupKey::group(&["fetch", "take", "bring"]).unwrap();
        assert_eq!(key, same);

        let empty: [&str; 0] = [];
        assert!(LookupKey::group(&empty).is_none());
    }

    #[test]
    fn test_parse_terms() {
        assert_eq!(parse_terms("make do  have"), vec!["make", "do", "have"]);
        assert_eq!(
            parse_terms("give up, look after ,"),
            vec!["give up", "look after"]
        );
        assert!(parse_terms("  ").is_empty());
    }

    #[test]
    fn test_provider_detect() {
        assert_eq!(
            Provider::detect("https://api.dicebear.com/9.x/icons/svg?seed=x"),
            Some(Provider::Dicebear)
        );
        assert_eq!(
            Provider::detect("https://gen.pollinations.ai/image/x"),
            Some(Provider::Pollinations)
        );
        assert_eq!(Provider::detect("https://example.com/a.png"), None);
    }

    #[test]
    fn test_image_for_prefers_provider_slot() {
        let mut entry = CacheEntry {
            mode: Mode::Single,
            key: LookupKey::single("make").unwrap(),
            content: None,
            legacy_image: Some("https://image.pollinations.ai/prompt/old".to_string()),
            image_by_provider: ProviderImages::default(),
        };

        // Legacy URL only counts for its own provider
        assert!(entry.image_for(Provider::Dicebear).is_none());
        assert_eq!(
            entry.image_for(Provider::Pollinations).unwrap().address,
            "https://image.pollinations.ai/prompt/old"
        );

        let fresh =
            ImageLocator::new(Provider::Pollinations, "https://gen.pollinations.ai/image/new");
        entry.image_by_provider.set(&fresh);
        assert_eq!(
            entry.image_for(Provider::Pollinations).unwrap().address,
            "https://gen.pollinations.ai/image/new"
        );
    }
}
