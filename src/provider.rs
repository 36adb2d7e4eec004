//! Narrative providers reached over HTTP.
//!
//! Every provider call is synchronous and bounded by its own timeout. Any failure comes
//! back as a [`ProviderError`] so the fallback chain can move on to the next provider.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::{EndpointConfig, ProvidersConfig};
use crate::digest::ContextDigest;

const SYSTEM_PROMPT: &str = "You are an expert data analyst providing insights from datasets. \
Always be accurate, specific, and professional.";

/// Something that turns a question plus a dataset digest into narrative text
pub trait NarrativeProvider: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, question: &str, digest: &ContextDigest) -> Result<String, ProviderError>;
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider}: credential variable {var} is not set")]
    MissingCredential { provider: String, var: String },
    #[error("{provider}: request failed: {message}")]
    Transport { provider: String, message: String },
    #[error("{provider}: server returned status {status}")]
    Status { provider: String, status: u16 },
    #[error("{provider}: could not decode response: {message}")]
    Decode { provider: String, message: String },
    #[error("{provider}: response contained no text")]
    Empty { provider: String },
}

/// Prompt shared by all providers: the digest is the only view of the data they get
pub fn build_prompt(question: &str, digest: &ContextDigest) -> String {
    format!(
        "Answer the question using ONLY the dataset statistics below. Never invent data.\n\
         Give specific numbers and percentages where they apply, point out patterns, \
         trends and anomalies, and structure the answer as Summary, Key Findings and \
         Recommendations.\n\n\
         DATASET OVERVIEW:\n{}\n\n\
         USER QUESTION:\n{}\n",
        digest.render(),
        question.trim()
    )
}

fn credential(provider: &str, env: Option<&str>) -> Result<Option<String>, ProviderError> {
    let Some(var) = env else {
        return Ok(None);
    };
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        _ => Err(ProviderError::MissingCredential {
            provider: provider.to_string(),
            var: var.to_string(),
        }),
    }
}

fn send<T: DeserializeOwned>(
    provider: &str,
    request: ureq::Request,
    body: serde_json::Value,
) -> Result<T, ProviderError> {
    let response = request.send_json(body).map_err(|e| match e {
        ureq::Error::Status(status, _) => ProviderError::Status {
            provider: provider.to_string(),
            status,
        },
        ureq::Error::Transport(t) => ProviderError::Transport {
            provider: provider.to_string(),
            message: t.to_string(),
        },
    })?;
    response.into_json::<T>().map_err(|e| ProviderError::Decode {
        provider: provider.to_string(),
        message: e.to_string(),
    })
}

fn non_empty(provider: &str, text: Option<String>) -> Result<String, ProviderError> {
    match text.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(ProviderError::Empty {
            provider: provider.to_string(),
        }),
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatResponse {
    fn text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}

/// OpenAI chat completions
pub struct OpenAiProvider {
    config: EndpointConfig,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: EndpointConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

impl NarrativeProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn generate(&self, question: &str, digest: &ContextDigest) -> Result<String, ProviderError> {
        let key = credential(self.name(), self.config.api_key_env.as_deref())?;
        let mut request = ureq::post(&endpoint(&self.config.base_url, "chat/completions"))
            .timeout(self.timeout);
        if let Some(key) = key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": build_prompt(question, digest) },
            ],
            "temperature": 0.7,
            "max_tokens": 1500,
            "top_p": 0.9,
        });
        let response: ChatResponse = send(self.name(), request, body)?;
        non_empty(self.name(), response.text())
    }
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GenerateContentResponse {
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        Some(text)
    }
}

/// Google Gemini generateContent
pub struct GeminiProvider {
    config: EndpointConfig,
    timeout: Duration,
}

impl GeminiProvider {
    pub fn new(config: EndpointConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

impl NarrativeProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(&self, question: &str, digest: &ContextDigest) -> Result<String, ProviderError> {
        let key = credential(self.name(), self.config.api_key_env.as_deref())?;
        let path = format!("models/{}:generateContent", self.config.model);
        let mut request = ureq::post(&endpoint(&self.config.base_url, &path)).timeout(self.timeout);
        if let Some(key) = key {
            request = request.set("x-goog-api-key", &key);
        }
        let prompt = format!("{}\n\n{}", SYSTEM_PROMPT, build_prompt(question, digest));
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        let response: GenerateContentResponse = send(self.name(), request, body)?;
        non_empty(self.name(), response.text())
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

/// Local Ollama server
pub struct OllamaProvider {
    config: EndpointConfig,
    timeout: Duration,
}

impl OllamaProvider {
    pub fn new(config: EndpointConfig, timeout: Duration) -> Self {
        Self { config, timeout }
    }
}

impl NarrativeProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn generate(&self, question: &str, digest: &ContextDigest) -> Result<String, ProviderError> {
        let key = credential(self.name(), self.config.api_key_env.as_deref())?;
        let mut request =
            ureq::post(&endpoint(&self.config.base_url, "api/generate")).timeout(self.timeout);
        if let Some(key) = key {
            request = request.set("Authorization", &format!("Bearer {}", key));
        }
        let body = serde_json::json!({
            "model": self.config.model,
            "system": SYSTEM_PROMPT,
            "prompt": build_prompt(question, digest),
            "stream": false,
        });
        let response: OllamaResponse = send(self.name(), request, body)?;
        non_empty(self.name(), Some(response.response))
    }
}

/// Providers named in `[providers] order`, in that order. Unknown names are skipped.
pub fn providers_from_config(config: &ProvidersConfig) -> Vec<Box<dyn NarrativeProvider>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    config
        .order
        .iter()
        .filter_map(|name| -> Option<Box<dyn NarrativeProvider>> {
            match name.trim().to_lowercase().as_str() {
                "openai" => Some(Box::new(OpenAiProvider::new(config.openai.clone(), timeout))),
                "gemini" => Some(Box::new(GeminiProvider::new(config.gemini.clone(), timeout))),
                "ollama" => Some(Box::new(OllamaProvider::new(config.ollama.clone(), timeout))),
                other => {
                    tracing::warn!(provider = other, "unknown narrative provider skipped");
                    None
                }
            }
        })
        .collect()
}
