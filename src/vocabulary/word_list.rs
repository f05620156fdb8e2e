//! Vocabulary list loading and part-of-speech lookup.
//!
//! The list file is a JSON object mapping a group name to an array of
//! entries. The named frequency-sorted group is used when present; otherwise
//! the first group in file order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use thiserror::Error;

use super::models::{PartOfSpeech, VocabItem};
use crate::cache::normalize_word;

/// Group name of the frequency-sorted exam list.
pub const PRIMARY_GROUP: &str = "5530考研词汇词频排序表 (Verbs Only)";

#[derive(Error, Debug)]
pub enum WordListError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Word list has no groups")]
    Empty,
}

pub type Result<T> = std::result::Result<T, WordListError>;

const FUNCTION_WORDS: &[&str] = &[
    // Prepositions
    "about", "above", "across", "after", "against", "along", "amid", "among", "around", "as", "at",
    "before", "behind", "below", "beneath", "beside", "between", "beyond", "by",
    "concerning", "considering", "despite", "down", "during", "except", "for", "from",
    "in", "inside", "into", "like", "near", "of", "off", "on", "onto", "out", "outside", "over",
    "past", "regarding", "round", "since", "through", "throughout", "till", "to", "toward",
    "under", "underneath", "until", "up", "upon", "versus", "via", "with", "within", "without",
    // Conjunctions
    "and", "but", "or", "so", "yet", "nor", "although", "because", "if", "unless", "while",
    "whereas", "whether",
];

const ARTICLES_AND_PRONOUNS: &[&str] = &[
    "a", "an", "the",
    "i", "you", "he", "she", "it", "we", "they", "me", "him", "her", "us", "them",
    "mine", "yours", "his", "hers", "its", "ours", "theirs", "my", "your", "our", "their",
    "myself", "yourself", "himself", "herself", "itself", "ourselves", "yourselves", "themselves",
    "this", "that", "these", "those", "who", "whom", "whose", "which", "what",
    "anyone", "anybody", "anything", "everyone", "everybody", "everything",
    "someone", "somebody", "something", "noone", "nobody", "nothing", "none",
    "one", "ones", "all", "another", "any", "both", "each", "either", "few",
    "many", "neither", "other", "others", "several", "some", "such",
];

const ADJ_ADV: &[&str] = &[
    "more", "most", "less", "least", "much", "many", "better", "best", "worse", "worst",
    "few", "fewer", "fewest", "little", "some", "any", "enough", "several", "all",
    "either", "neither", "each", "every", "only", "just", "very", "really", "quite", "rather",
    "too", "so", "well", "often", "always", "never", "sometimes", "seldom", "rarely", "usually",
    "perhaps", "maybe", "probably", "possibly", "now", "then", "here", "there", "where", "when",
    "why", "how", "again", "once", "twice", "already", "yet", "still", "even", "else",
    "away", "back", "forward", "backward", "high", "low", "far", "near", "long", "short",
    "deep", "wide", "broad", "first", "last", "next", "previous", "prior",
    "good", "bad", "great", "new", "old", "young", "right", "wrong", "own", "same",
    "different", "able", "possible", "likely", "certain", "sure",
];

/// Fixed override for closed-class words, checked in priority order.
pub fn override_pos(word: &str) -> Option<PartOfSpeech> {
    let word = normalize_word(word);
    let word = word.as_str();
    if FUNCTION_WORDS.contains(&word) {
        Some(PartOfSpeech::PrepConj)
    } else if ARTICLES_AND_PRONOUNS.contains(&word) {
        Some(PartOfSpeech::Other)
    } else if ADJ_ADV.contains(&word) {
        Some(PartOfSpeech::AdjAdv)
    } else {
        None
    }
}

/// The loaded vocabulary list.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    items: Vec<VocabItem>,
    /// Normalized word -> index of its first occurrence in `items`
    index: HashMap<String, usize>,
}

impl WordList {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let groups: Map<String, Value> = serde_json::from_str(json)?;
        let group = match groups.get(PRIMARY_GROUP) {
            Some(group) => group.clone(),
            None => groups
                .into_iter()
                .next()
                .map(|(_, group)| group)
                .ok_or(WordListError::Empty)?,
        };
        let items: Vec<VocabItem> = serde_json::from_value(group)?;
        Ok(Self::from_items(items))
    }

    pub fn from_items(items: Vec<VocabItem>) -> Self {
        let mut index = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            index.entry(normalize_word(&item.word)).or_insert(i);
        }
        Self { items, index }
    }

    pub fn items(&self) -> &[VocabItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, word: &str) -> Option<&VocabItem> {
        self.index.get(&normalize_word(word)).map(|&i| &self.items[i])
    }

    /// Hint for the explanation style: closed-class overrides first, then the
    /// list's own tag.
    pub fn pos_hint(&self, word: &str) -> Option<PartOfSpeech> {
        override_pos(word).or_else(|| {
            self.get(word)
                .and_then(|item| item.pos.as_deref())
                .map(PartOfSpeech::from_tag)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_group_wins() {
        let json = format!(
            r#"{{"other group": [{{"单词": "zeta"}}], "{}": [{{"单词": "Abandon", "pos": "verb"}}]}}"#,
            PRIMARY_GROUP
        );
        let list = WordList::from_json(&json).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].word, "Abandon");
    }

    #[test]
    fn test_first_group_fallback_follows_file_order() {
        let json = r#"{"zz later": [{"单词": "first"}], "aa earlier": [{"单词": "second"}]}"#;
        let list = WordList::from_json(json).unwrap();
        assert_eq!(list.items()[0].word, "first");
    }

    #[test]
    fn test_empty_list_is_an_error() {
        assert!(matches!(WordList::from_json("{}"), Err(WordListError::Empty)));
    }

    #[test]
    fn test_pos_hint_overrides() {
        let list = WordList::from_items(vec![
            VocabItem {
                word: "about".to_string(),
                pos: Some("adv".to_string()),
            },
            VocabItem {
                word: "ability".to_string(),
                pos: Some("noun".to_string()),
            },
            VocabItem {
                word: "abandon".to_string(),
                pos: None,
            },
        ]);

        assert_eq!(list.pos_hint("About"), Some(PartOfSpeech::PrepConj));
        assert_eq!(list.pos_hint("the"), Some(PartOfSpeech::Other));
        assert_eq!(list.pos_hint("often"), Some(PartOfSpeech::AdjAdv));
        assert_eq!(list.pos_hint(" ability "), Some(PartOfSpeech::Noun));
        assert_eq!(list.pos_hint("abandon"), None);
        assert_eq!(list.pos_hint("unlisted"), None);
    }
}
