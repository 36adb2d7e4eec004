//! The single entry point: question in, answer string out.

use color_eyre::Result;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::dataset::Dataset;
use crate::digest::{build_digest, DigestOptions};
use crate::intent::{classify, Classification};
use crate::orchestrator::FallbackChain;
use crate::resolver::Resolver;
use crate::retrieval::RetrievalEngine;

const EMPTY_QUESTION: &str = "Please ask a question about the dataset.";

/// Routes each question to exact retrieval or to the narrative fallback chain
#[derive(Debug)]
pub struct QueryRouter {
    resolver: Resolver,
    engine: RetrievalEngine,
    digest_options: DigestOptions,
    chain: FallbackChain,
}

impl QueryRouter {
    /// Router with the providers named in the configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_chain(config, FallbackChain::from_config(&config.providers))
    }

    pub fn with_chain(config: &AppConfig, chain: FallbackChain) -> Result<Self> {
        let resolver = Resolver::new(
            config.query.identity_column.as_str(),
            config.query.match_mode()?,
        );
        Ok(Self {
            resolver,
            engine: RetrievalEngine::from_config(&config.query),
            digest_options: DigestOptions::from(&config.digest),
            chain,
        })
    }

    pub fn chain(&self) -> &FallbackChain {
        &self.chain
    }

    pub fn classify(&self, dataset: &Dataset, question: &str) -> Classification {
        classify(question, dataset, &self.resolver)
    }

    /// Answer a question. Always returns readable text, never an error.
    pub fn answer(&self, dataset: &Dataset, question: &str) -> String {
        if question.trim().is_empty() {
            return EMPTY_QUESTION.to_string();
        }
        let classification = self.classify(dataset, question);
        if let Some(answer) = self.engine.execute(&classification, dataset) {
            info!(intent = %classification.intent, "answered from data");
            return answer.render();
        }
        if classification.intent.is_retrieval() {
            debug!(intent = %classification.intent, "not retrievable, falling back to analysis");
        }
        let digest = build_digest(dataset, &self.digest_options);
        let narrative = self.chain.narrate(question, &digest);
        info!(source = ?narrative.source, "answered with narrative");
        narrative.text
    }

    /// Answer a question supplied as an untyped value. Anything but a string is a caller
    /// bug and is reported as an internal error instead of being guessed at.
    pub fn answer_value(&self, dataset: &Dataset, question: &serde_json::Value) -> String {
        match question {
            serde_json::Value::String(text) => self.answer(dataset, text),
            other => format!(
                "Internal error: question must be text, got {}",
                json_kind(other)
            ),
        }
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
