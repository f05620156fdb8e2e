//! Vocabulary list and part-of-speech hints

pub mod models;
pub mod word_list;

pub use models::*;
pub use word_list::{override_pos, WordList, WordListError, PRIMARY_GROUP};
