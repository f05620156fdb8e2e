//! Parallel bulk population of the explanation cache

mod runner;

pub use runner::{
    BatchOptions, BatchRunner, ItemFailure, RunSummary, DEFAULT_CONCURRENCY, DEFAULT_ITEM_TIMEOUT,
};
