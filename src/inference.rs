//! HTTP inference backend.
//!
//! Talks to any server implementing the Hugging Face Inference API contract:
//! `POST {endpoint}/{model}` with `{"inputs": "..."}`. Summarization models
//! answer `[{"summary_text": "..."}]`, token classification models answer
//! `[{"entity_group": "ORG", "word": "..."}]`.

use crate::error::{Error, Result};
use crate::nlp::{Entity, NlpEngine};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_SUMMARIZATION_MODEL: &str = "sshleifer/distilbart-cnn-12-6";
const DEFAULT_NER_MODEL: &str = "dslim/bert-base-NER";

/// Connection settings for [`InferenceEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceConfig {
    /// Base URL; model ids are appended as path segments
    pub endpoint: String,
    /// Bearer token, if the server requires one
    pub token: Option<String>,
    /// Model id used for summaries
    pub summarization_model: String,
    /// Model id used for entity recognition
    pub ner_model: String,
    /// Per-request timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
            summarization_model: DEFAULT_SUMMARIZATION_MODEL.to_string(),
            ner_model: DEFAULT_NER_MODEL.to_string(),
            timeout: None,
        }
    }
}

impl InferenceConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::config(format!(
                "Inference endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if self.summarization_model.trim().is_empty() || self.ner_model.trim().is_empty() {
            return Err(Error::config("Inference model ids must not be empty"));
        }

        Ok(())
    }

    fn model_url(&self, model: &str) -> String {
        format!("{}/{}", self.endpoint.trim_end_matches('/'), model)
    }
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<TokenParameters>,
}

#[derive(Serialize)]
struct TokenParameters {
    aggregation_strategy: &'static str,
}

#[derive(Debug, Deserialize)]
struct SummaryItem {
    summary_text: String,
}

#[derive(Debug, Deserialize)]
struct TokenItem {
    #[serde(default)]
    entity_group: Option<String>,
    #[serde(default)]
    entity: Option<String>,
    word: String,
}

impl TokenItem {
    /// Aggregated replies carry `entity_group`; raw ones carry IOB tags like `B-ORG`.
    fn into_entity(self) -> Option<Entity> {
        let label = self.entity_group.or(self.entity)?;
        let label = label
            .strip_prefix("B-")
            .or_else(|| label.strip_prefix("I-"))
            .unwrap_or(&label)
            .to_string();
        Some(Entity::new(self.word, label))
    }
}

/// Engine backed by remote summarization and token classification models.
#[derive(Debug)]
pub struct InferenceEngine {
    client: Client,
    config: InferenceConfig,
}

impl InferenceEngine {
    /// Creates an engine and its HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the client cannot be built.
    pub fn new(config: InferenceConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("md-annotate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config })
    }

    fn post<T: DeserializeOwned>(&self, model: &str, request: &InferenceRequest<'_>) -> Result<T> {
        let url = self.config.model_url(model);
        debug!("POST {} ({} chars)", url, request.inputs.len());

        let mut builder = self.client.post(&url).json(request);
        if let Some(ref token) = self.config.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::nlp(format!(
                "model '{model}' returned {status}: {}",
                body.trim()
            )));
        }

        Ok(response.json()?)
    }
}

impl NlpEngine for InferenceEngine {
    fn entities(&self, text: &str) -> Result<Vec<Entity>> {
        let request = InferenceRequest {
            inputs: text,
            parameters: Some(TokenParameters {
                aggregation_strategy: "simple",
            }),
        };
        let items: Vec<TokenItem> = self.post(&self.config.ner_model, &request)?;
        Ok(entities_from_items(items))
    }

    fn summarize(&self, text: &str) -> Result<String> {
        let request = InferenceRequest {
            inputs: text,
            parameters: None,
        };
        let items: Vec<SummaryItem> = self.post(&self.config.summarization_model, &request)?;
        summary_from_items(items)
    }
}

fn entities_from_items(items: Vec<TokenItem>) -> Vec<Entity> {
    items.into_iter().filter_map(TokenItem::into_entity).collect()
}

fn summary_from_items(items: Vec<SummaryItem>) -> Result<String> {
    items
        .into_iter()
        .next()
        .map(|item| item.summary_text)
        .ok_or_else(|| Error::nlp("summarization model returned no candidates"))
}
