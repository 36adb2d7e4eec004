#![allow(dead_code)]

use datask::config::AppConfig;
use datask::provider::{NarrativeProvider, ProviderError};
use datask::{ContextDigest, Dataset, FallbackChain, QueryRouter};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// People table with a "name" identity column; arun appears twice
pub fn people() -> Dataset {
    let df = df!(
        "Name" => ["Arun", "Neha", "Ravi", "Arun", "Meena"],
        "Age" => [25i64, 30, 41, 27, 35],
        "Salary" => [50000.0, 60000.0, 90000.0, 52000.0, 40000.0],
        "Department" => ["HR", "IT", "Sales ", "HR", "IT"]
    )
    .unwrap();
    Dataset::from_frame(df).unwrap()
}

/// A table whose department column has 25 distinct values
pub fn many_departments() -> Dataset {
    let df = df!(
        "name" => (0..25).map(|i| format!("person{}", i)).collect::<Vec<_>>(),
        "department" => (0..25).map(|i| format!("dept{}", i)).collect::<Vec<_>>()
    )
    .unwrap();
    Dataset::from_frame(df).unwrap()
}

pub fn offline_router() -> QueryRouter {
    QueryRouter::with_chain(&AppConfig::default(), FallbackChain::offline()).unwrap()
}

pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Provider with a canned outcome that counts how often it is called
pub struct StubProvider {
    pub name: &'static str,
    pub reply: Option<&'static str>,
    pub calls: Arc<AtomicUsize>,
}

impl StubProvider {
    pub fn ok(name: &'static str, reply: &'static str) -> Self {
        Self {
            name,
            reply: Some(reply),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &'static str) -> Self {
        Self {
            name,
            reply: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl NarrativeProvider for StubProvider {
    fn name(&self) -> &str {
        self.name
    }

    fn generate(&self, _question: &str, _digest: &ContextDigest) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.map(str::to_string).ok_or_else(|| ProviderError::Transport {
            provider: self.name.to_string(),
            message: "connection refused".to_string(),
        })
    }
}
