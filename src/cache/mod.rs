//! Explanation and image cache keyed by (mode, lookup key)

mod content;
mod error;
mod image;
pub mod models;
mod store;

pub use content::{build_prompt, ContentCache, SINGLE_SEPARATOR};
pub use error::{CacheError, Result};
pub use image::{
    stable_seed, FetchError, FetchResponse, HttpFetch, ImageCache, ImageResolver, ImageResponse,
    ReqwestFetcher, FETCH_TIMEOUT,
};
pub use models::*;
pub use store::CacheStore;
