//! Text generation and markdown cleanup seams
//!
//! The caches only see the [`Generator`] and [`MarkdownNormalizer`] traits;
//! [`OpenAiClient`] and [`MarkdownCleaner`] are the default implementations.

mod client;
mod markdown;

use async_trait::async_trait;
use thiserror::Error;

use crate::vocabulary::PartOfSpeech;

pub use client::{system_prompt, OpenAiClient};
pub use markdown::MarkdownCleaner;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Model returned an empty response")]
    EmptyResponse,

    #[error("Request timed out")]
    Timeout,
}

/// Opaque "explain this" capability.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        pos: Option<PartOfSpeech>,
    ) -> Result<String, GenerationError>;
}

/// Pure text transform applied to raw model output before caching.
pub trait MarkdownNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}
