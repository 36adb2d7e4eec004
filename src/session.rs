//! Per-user session context: the current dataset and the question/answer transcript.

use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::dataset::{load_dataset, Dataset, DatasetLoadError};
use crate::router::QueryRouter;
use crate::OpenOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEntry {
    pub question: String,
    pub answer: String,
}

/// Append-only record of a session's questions and answers, in the order asked
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, question: impl Into<String>, answer: impl Into<String>) -> &TranscriptEntry {
        self.entries.push(TranscriptEntry {
            question: question.into(),
            answer: answer.into(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.entries.iter()
    }
}

/// The dataset is shared read-only; loading a new one swaps the whole reference
#[derive(Debug, Clone)]
pub struct Session {
    dataset: Arc<Dataset>,
    transcript: Transcript,
}

impl Session {
    pub fn new(dataset: Dataset) -> Self {
        Self {
            dataset: Arc::new(dataset),
            transcript: Transcript::new(),
        }
    }

    /// Start a session from a file
    pub fn open(path: &Path, options: &OpenOptions) -> Result<Self, DatasetLoadError> {
        Ok(Self::new(load_dataset(path, options)?))
    }

    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.dataset)
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn replace_dataset(&mut self, dataset: Dataset) {
        self.dataset = Arc::new(dataset);
    }

    /// Load a new dataset. The current one stays in place until loading has fully
    /// succeeded, and is kept when it fails.
    pub fn load(&mut self, path: &Path, options: &OpenOptions) -> Result<(), DatasetLoadError> {
        let dataset = load_dataset(path, options)?;
        info!(
            path = %path.display(),
            rows = dataset.height(),
            columns = dataset.width(),
            "dataset replaced"
        );
        self.replace_dataset(dataset);
        Ok(())
    }

    /// Answer a question against the current dataset and record it
    pub fn ask(&mut self, router: &QueryRouter, question: &str) -> &str {
        let answer = router.answer(&self.dataset, question);
        &self.transcript.push(question, answer).answer
    }

    /// Like [`Session::ask`] for an untyped question value
    pub fn ask_value(&mut self, router: &QueryRouter, question: &serde_json::Value) -> &str {
        let answer = router.answer_value(&self.dataset, question);
        let asked = match question {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        &self.transcript.push(asked, answer).answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::orchestrator::FallbackChain;
    use polars::prelude::df;

    fn session() -> Session {
        let df = df!("name" => ["arun", "neha"], "age" => [25i64, 30]).unwrap();
        Session::new(Dataset::from_frame(df).unwrap())
    }

    fn router() -> QueryRouter {
        QueryRouter::with_chain(&AppConfig::default(), FallbackChain::offline()).unwrap()
    }

    #[test]
    fn test_transcript_appends_in_call_order() {
        let mut session = session();
        let router = router();
        session.ask(&router, "age of neha");
        session.ask(&router, "age of arun");
        session.ask(&router, "age of neha");
        let questions: Vec<&str> = session
            .transcript()
            .iter()
            .map(|e| e.question.as_str())
            .collect();
        assert_eq!(questions, vec!["age of neha", "age of arun", "age of neha"]);
        assert_eq!(session.transcript().entries()[1].answer, "arun's age: 25");
    }

    #[test]
    fn test_failed_load_keeps_dataset() {
        let mut session = session();
        let before = session.dataset();
        let result = session.load(Path::new("missing.unknownext"), &OpenOptions::new());
        assert!(result.is_err());
        assert!(Arc::ptr_eq(&before, &session.dataset()));
    }

    #[test]
    fn test_replace_dataset_does_not_disturb_readers() {
        let mut session = session();
        let held = session.dataset();
        let df = df!("name" => ["ravi"], "age" => [41i64]).unwrap();
        session.replace_dataset(Dataset::from_frame(df).unwrap());
        assert_eq!(held.height(), 2);
        assert_eq!(session.dataset().height(), 1);
    }

    #[test]
    fn test_ask_value_records_non_text() {
        let mut session = session();
        let answer = session.ask_value(&router(), &serde_json::json!(7)).to_string();
        assert!(answer.starts_with("Internal error"));
        assert_eq!(session.transcript().entries()[0].question, "7");
    }
}
