use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{GenerationError, Generator};
use crate::settings::SettingsSource;
use crate::vocabulary::PartOfSpeech;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const TEMPERATURE: f32 = 0.7;

const VERB_PROMPT: &str = "You are an English teacher using cognitive linguistics. \
Explain the verb the learner gives you: its core image schema, how each common sense \
extends from that image, typical collocations and phrasal verbs, and short example \
sentences with Chinese translations. Answer in Markdown, in Chinese.";

const NOUN_PROMPT: &str = "You are an English teacher using cognitive linguistics. \
Explain the noun the learner gives you: its prototype meaning, how extended senses \
derive from it, countability, common collocations, and short example sentences with \
Chinese translations. Answer in Markdown, in Chinese.";

const ADJ_ADV_PROMPT: &str = "You are an English teacher using cognitive linguistics. \
Explain the adjective or adverb the learner gives you: the scale or dimension it \
expresses, its senses, comparison forms, common collocations, and short example \
sentences with Chinese translations. Answer in Markdown, in Chinese.";

const PREP_PROMPT: &str = "You are an English teacher using cognitive linguistics. \
Explain the preposition the learner gives you through its spatial image schema \
(trajector and landmark), then show how temporal and abstract uses extend from it, \
with short example sentences and Chinese translations. Answer in Markdown, in Chinese.";

const PREP_CONJ_PROMPT: &str = "You are an English teacher using cognitive linguistics. \
Explain the function word the learner gives you. If it works as a preposition, start \
from its spatial image schema; if it works as a conjunction, describe the logical \
relation it builds between clauses. Give short example sentences with Chinese \
translations. Answer in Markdown, in Chinese.";

const CONCEPT_PROMPT: &str = "You are an English teacher. Explain the word the learner \
gives you: its grammatical role, what it refers to or signals in discourse, common \
patterns, and short example sentences with Chinese translations. Answer in Markdown, \
in Chinese.";

/// System prompt for a part-of-speech hint; verbs are the default style.
pub fn system_prompt(pos: Option<PartOfSpeech>) -> &'static str {
    match pos {
        Some(PartOfSpeech::Noun) => NOUN_PROMPT,
        Some(PartOfSpeech::AdjAdv) => ADJ_ADV_PROMPT,
        Some(PartOfSpeech::Prep) => PREP_PROMPT,
        Some(PartOfSpeech::PrepConj) => PREP_CONJ_PROMPT,
        Some(PartOfSpeech::Other) => CONCEPT_PROMPT,
        Some(PartOfSpeech::Verb) | Some(PartOfSpeech::NounVerb) | None => VERB_PROMPT,
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
///
/// Credentials are read from the settings source on every call, so a key
/// added while the process runs takes effect immediately.
pub struct OpenAiClient {
    client: Client,
    settings: Arc<dyn SettingsSource>,
}

impl OpenAiClient {
    pub fn new(settings: Arc<dyn SettingsSource>) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(base_url: &str) -> String {
        let base = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url.trim()
        };
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        pos: Option<PartOfSpeech>,
    ) -> Result<String, GenerationError> {
        let settings = self.settings.snapshot();
        if settings.openai_api_key.trim().is_empty() {
            return Err(GenerationError::NotConfigured);
        }

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt(pos),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(Self::endpoint(&settings.openai_base_url))
            .bearer_auth(settings.openai_api_key.trim())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout
                } else {
                    GenerationError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}
