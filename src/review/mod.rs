//! Spaced-repetition review progress for vocabulary
//!
//! This module provides:
//! - The fixed interval table and pure stage transitions
//! - Review state persistence, due queries and daily goal counters
//! - Daily check-ins and the current learn batch

pub mod algorithm;
pub mod checkins;
pub mod models;
pub mod storage;

pub use checkins::{CheckinStore, LearnBatchStore};
pub use models::*;
pub use storage::{ReviewError, ReviewScheduler};
