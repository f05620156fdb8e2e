//! Cache error types

use thiserror::Error;

use crate::llm::GenerationError;
use crate::storage::StorageError;

/// Errors surfaced by the content and image caches.
///
/// Image provider failures never appear here; they are absorbed by the
/// fallback chain in [`crate::cache::ImageCache`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Please enter at least one word")]
    EmptyInput,

    #[error("Generation unavailable and no cached explanation: {0}")]
    GenerationUnavailable(#[source] GenerationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, CacheError>;
