//! Data models for the vocabulary list

use serde::{Deserialize, Serialize};

/// Part-of-speech hint used to pick the explanation style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartOfSpeech {
    Verb,
    Noun,
    /// Tagged as both noun and verb; explained as a verb
    NounVerb,
    AdjAdv,
    Prep,
    /// Prepositions and conjunctions
    PrepConj,
    /// Pronouns, articles and anything else without a lexical category
    Other,
}

impl PartOfSpeech {
    /// Parse a word-list tag. Unknown tags fall back to the verb style.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().as_str() {
            "noun" => PartOfSpeech::Noun,
            "noun_verb" | "verb_noun" => PartOfSpeech::NounVerb,
            "adj_adv" | "adj" | "adv" => PartOfSpeech::AdjAdv,
            "prep" => PartOfSpeech::Prep,
            "prep_conj" => PartOfSpeech::PrepConj,
            "other" => PartOfSpeech::Other,
            _ => PartOfSpeech::Verb,
        }
    }
}

/// One entry of the vocabulary list file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabItem {
    #[serde(rename = "单词")]
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos: Option<String>,
}
