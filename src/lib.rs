//! Vocabulary study backend: a cached explanation and image store in front of
//! text and image generators, plus spaced-repetition review tracking.

pub mod batch;
pub mod cache;
pub mod llm;
pub mod review;
pub mod settings;
pub mod storage;
pub mod vocabulary;

pub use batch::{BatchOptions, BatchRunner, RunSummary};
pub use cache::{CacheError, CacheStore, ContentCache, ImageCache, ImageResolver, ImageResponse};
pub use review::{CheckinStore, LearnBatchStore, ReviewScheduler};
pub use settings::{ConfigFile, Settings, SettingsSource};
pub use storage::{Database, StorageError};
