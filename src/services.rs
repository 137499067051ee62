use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{EmbeddingBackend, EmbeddingConfig, GenerationConfig};
use crate::semantic::{LOCAL_BACKEND, embed_text_local};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

pub trait TextGenerator {
    fn generate(&self, messages: &[ChatMessage]) -> Result<String>;
}

pub trait Embedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }

    fn name(&self) -> &str;
}

pub trait RelevanceClassifier {
    fn score(&self, paragraph: &str, field: &str) -> Result<f64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    EntityDiscovery,
    ValueExtraction,
}

pub struct ChatCompletionClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key_env: String,
    model: String,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
    post_call_delay: Duration,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ChatCompletionClient {
    pub fn new(config: &GenerationConfig, role: ModelRole) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build generation HTTP client")?;

        let model = match role {
            ModelRole::EntityDiscovery => config.entity_model.clone(),
            ModelRole::ValueExtraction => config.extraction_model.clone(),
        };

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key_env: config.api_key_env.clone(),
            model,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
            post_call_delay: config.post_call_delay(),
        })
    }
}

impl TextGenerator for ChatCompletionClient {
    fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let api_key = env::var(&self.api_key_env)
            .with_context(|| format!("generation API key not set in ${}", self.api_key_env))?;

        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
            frequency_penalty: self.frequency_penalty,
            presence_penalty: self.presence_penalty,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .with_context(|| format!("generation request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!("generation endpoint returned {status}: {text}");
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .context("failed to parse generation response")?;

        if !self.post_call_delay.is_zero() {
            thread::sleep(self.post_call_delay);
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("generation response contained no choices")?;

        debug!(model = %self.model, chars = content.len(), "generation call completed");
        Ok(content)
    }
}

#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    dimensions: usize,
}

impl LocalHashEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            dimensions: config.dimensions,
        }
    }
}

impl Embedder for LocalHashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(embed_text_local(text, self.dimensions))
    }

    fn name(&self) -> &str {
        LOCAL_BACKEND
    }
}

pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key_env: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build embedding HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key_env: config.api_key_env.clone(),
        })
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_all(&[text.to_string()])?
            .pop()
            .context("embedding response was empty")
    }

    fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = env::var(&self.api_key_env)
            .with_context(|| format!("embedding API key not set in ${}", self.api_key_env))?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .with_context(|| format!("embedding request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            bail!("embedding endpoint returned {status}: {text}");
        }

        let parsed: EmbeddingResponse = response
            .json()
            .context("failed to parse embedding response")?;
        debug!(model = %self.model, texts = texts.len(), "embedding call completed");
        ordered_embeddings(parsed, texts.len())
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn ordered_embeddings(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut data = response.data;
    if data.len() != expected {
        bail!("embedding response held {} vectors for {expected} texts", data.len());
    }
    data.sort_by_key(|entry| entry.index);
    Ok(data.into_iter().map(|entry| entry.embedding).collect())
}

pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Local => Ok(Box::new(LocalHashEmbedder::new(config))),
        EmbeddingBackend::Http => Ok(Box::new(HttpEmbedder::new(config)?)),
    }
}

pub struct PassthroughClassifier;

impl RelevanceClassifier for PassthroughClassifier {
    fn score(&self, _paragraph: &str, _field: &str) -> Result<f64> {
        Ok(0.5)
    }
}

#[cfg(test)]
pub mod fakes {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    pub struct ScriptedGenerator {
        answers: RefCell<VecDeque<String>>,
        pub calls: RefCell<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedGenerator {
        pub fn new(answers: &[&str]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|value| value.to_string()).collect()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for ScriptedGenerator {
        fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.borrow_mut().push(messages.to_vec());
            self.answers
                .borrow_mut()
                .pop_front()
                .context("scripted generator ran out of answers")
        }
    }

    pub struct FailingGenerator;

    impl TextGenerator for FailingGenerator {
        fn generate(&self, _messages: &[ChatMessage]) -> Result<String> {
            bail!("generation service unavailable")
        }
    }

    pub struct KeywordClassifier {
        pub keyword: String,
    }

    impl RelevanceClassifier for KeywordClassifier {
        fn score(&self, paragraph: &str, _field: &str) -> Result<f64> {
            let hits = paragraph
                .to_ascii_lowercase()
                .matches(&self.keyword.to_ascii_lowercase())
                .count();
            Ok(hits as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_response_is_reordered_by_index() {
        let raw = r#"{"data":[
            {"index":1,"embedding":[0.0,1.0]},
            {"index":0,"embedding":[1.0,0.0]}
        ]}"#;
        let response: EmbeddingResponse = serde_json::from_str(raw).expect("response");

        let vectors = ordered_embeddings(response, 2).expect("vectors");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_response_with_missing_vectors_is_rejected() {
        let raw = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let response: EmbeddingResponse = serde_json::from_str(raw).expect("response");
        assert!(ordered_embeddings(response, 2).is_err());
    }

    #[test]
    fn embedder_backend_follows_config() {
        let mut config = EmbeddingConfig::default();
        let local = build_embedder(&config).expect("local");
        assert_eq!(local.name(), LOCAL_BACKEND);
        assert_eq!(local.embed("fund").expect("embed").len(), config.dimensions);

        config.backend = EmbeddingBackend::Http;
        config.model = "sentence-model".to_string();
        let http = build_embedder(&config).expect("http");
        assert_eq!(http.name(), "sentence-model");
        assert!(http.embed_all(&[]).expect("empty batch").is_empty());
    }
}
