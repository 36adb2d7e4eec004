//! Ordered provider failover ending in a local summary.

use std::fmt::Write as _;
use tracing::{debug, warn};

use crate::config::ProvidersConfig;
use crate::digest::ContextDigest;
use crate::provider::{providers_from_config, NarrativeProvider};

/// Where a narrative came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrativeSource {
    Provider(String),
    LocalSummary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narrative {
    pub text: String,
    pub source: NarrativeSource,
}

/// Providers tried strictly in order; the first non-empty narrative wins
pub struct FallbackChain {
    providers: Vec<Box<dyn NarrativeProvider>>,
}

impl FallbackChain {
    pub fn new(providers: Vec<Box<dyn NarrativeProvider>>) -> Self {
        Self { providers }
    }

    /// A chain with no providers: every narrative is the local summary
    pub fn offline() -> Self {
        Self::new(Vec::new())
    }

    pub fn from_config(config: &ProvidersConfig) -> Self {
        Self::new(providers_from_config(config))
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Never fails: provider errors are logged and the next provider is tried
    pub fn narrate(&self, question: &str, digest: &ContextDigest) -> Narrative {
        for provider in &self.providers {
            match provider.generate(question, digest) {
                Ok(text) if !text.trim().is_empty() => {
                    debug!(provider = provider.name(), "narrative generated");
                    return Narrative {
                        text,
                        source: NarrativeSource::Provider(provider.name().to_string()),
                    };
                }
                Ok(_) => warn!(provider = provider.name(), "provider returned no text, trying next"),
                Err(e) => warn!(provider = provider.name(), error = %e, "provider unavailable, trying next"),
            }
        }
        debug!("all providers unavailable, using local summary");
        Narrative {
            text: local_summary(digest),
            source: NarrativeSource::LocalSummary,
        }
    }
}

impl std::fmt::Debug for FallbackChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackChain")
            .field("providers", &self.provider_names())
            .finish()
    }
}

/// Deterministic prose built from the digest alone. Never empty.
pub fn local_summary(digest: &ContextDigest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Summary (generated locally): the dataset has {} rows and {} columns.",
        digest.rows, digest.columns
    );

    for summary in &digest.numeric {
        match (summary.quartiles, summary.mean) {
            (Some(q), Some(mean)) => {
                let _ = writeln!(
                    out,
                    "- {} ranges from {:.2} to {:.2} with a mean of {:.2}.",
                    summary.column, q.min, q.max, mean
                );
            }
            _ => {
                let _ = writeln!(out, "- {} has no numeric values.", summary.column);
            }
        }
    }

    for summary in &digest.categorical {
        match summary.top.first() {
            Some((value, count)) => {
                let _ = writeln!(
                    out,
                    "- {} has {} unique values; the most frequent is '{}' ({} rows).",
                    summary.column, summary.unique, value, count
                );
            }
            None => {
                let _ = writeln!(out, "- {} has no values.", summary.column);
            }
        }
    }

    if digest.missing_cells == 0 {
        let _ = write!(out, "No values are missing.");
    } else {
        let columns: Vec<String> = digest
            .missing
            .iter()
            .map(|(column, count)| format!("{} ({})", column, count))
            .collect();
        let _ = write!(
            out,
            "{} of {} cells are missing ({:.1}% complete)",
            digest.missing_cells,
            digest.total_cells,
            digest.completeness()
        );
        if columns.is_empty() {
            let _ = write!(out, ".");
        } else {
            let _ = write!(out, ": {}.", columns.join(", "));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dataset;
    use crate::digest::{build_digest, DigestOptions};
    use crate::provider::ProviderError;
    use polars::prelude::df;

    struct Fixed(&'static str, Option<&'static str>);

    impl NarrativeProvider for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn generate(&self, _: &str, _: &ContextDigest) -> Result<String, ProviderError> {
            self.1.map(str::to_string).ok_or_else(|| ProviderError::Empty {
                provider: self.0.to_string(),
            })
        }
    }

    fn digest() -> ContextDigest {
        let df = df!(
            "name" => ["arun", "neha", "arun"],
            "age" => [Some(25.0), None, Some(31.0)]
        )
        .unwrap();
        build_digest(&Dataset::from_frame(df).unwrap(), &DigestOptions::default())
    }

    #[test]
    fn test_blank_text_counts_as_failure() {
        let chain = FallbackChain::new(vec![
            Box::new(Fixed("first", Some("  "))),
            Box::new(Fixed("second", Some("narrative"))),
        ]);
        let narrative = chain.narrate("why", &digest());
        assert_eq!(narrative.text, "narrative");
        assert_eq!(narrative.source, NarrativeSource::Provider("second".into()));
    }

    #[test]
    fn test_offline_chain_uses_local_summary() {
        let chain = FallbackChain::offline();
        assert!(chain.provider_names().is_empty());
        let narrative = chain.narrate("why", &digest());
        assert_eq!(narrative.source, NarrativeSource::LocalSummary);
        assert_eq!(narrative.text, local_summary(&digest()));
    }

    #[test]
    fn test_local_summary_content() {
        let text = local_summary(&digest());
        assert!(text.contains("3 rows and 2 columns"));
        assert!(text.contains("age ranges from 25.00 to 31.00 with a mean of 28.00"));
        assert!(text.contains("most frequent is 'arun' (2 rows)"));
        assert!(text.contains("1 of 6 cells are missing"));
        assert!(text.contains("age (1)"));
    }

    #[test]
    fn test_local_summary_of_empty_frame_is_not_empty() {
        let df = df!("x" => Vec::<f64>::new()).unwrap();
        let digest = build_digest(&Dataset::from_frame(df).unwrap(), &DigestOptions::default());
        let text = local_summary(&digest);
        assert!(!text.trim().is_empty());
        assert!(text.contains("x has no numeric values"));
    }
}
