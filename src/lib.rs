//! Answer free-text questions about a tabular dataset.
//!
//! A question is classified by keyword precedence and either answered exactly from the
//! data (lookups, aggregates, lists, comparisons) or handed to a chain of narrative
//! providers together with a statistical digest of the dataset. The chain always ends
//! in a local summary, so [`QueryRouter::answer`] never fails.

pub mod cache;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod digest;
pub mod intent;
pub mod orchestrator;
pub mod provider;
pub mod resolver;
pub mod retrieval;
pub mod router;
pub mod session;

pub use cache::{CacheManager, QuestionHistory};
pub use cli::{Args, MatchMode};
pub use config::{AppConfig, ConfigManager};
pub use dataset::{load_dataset, Dataset, DatasetLoadError, SemanticType};
pub use digest::{build_digest, ContextDigest, DigestOptions};
pub use intent::{classify, Classification, EntityReference, Intent};
pub use orchestrator::{local_summary, FallbackChain, Narrative, NarrativeSource};
pub use provider::{NarrativeProvider, ProviderError};
pub use resolver::{Aggregation, Resolver};
pub use retrieval::{Answer, ComparisonPayload, RetrievalEngine};
pub use router::QueryRouter;
pub use session::{Session, Transcript, TranscriptEntry};

/// Application name used for cache directory and other app-specific paths
pub const APP_NAME: &str = "datask";

/// Re-export compression format from CLI module
pub use cli::CompressionFormat;

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        // Check final extension (e.g., .csv.gz -> gz)
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Options controlling how a dataset file is read
#[derive(Debug, Default, Clone)]
pub struct OpenOptions {
    pub delimiter: Option<u8>,
    pub has_header: Option<bool>,
    pub sheet: Option<String>,
    pub compression: Option<CompressionFormat>,
    /// Cell values read as missing. `None` uses the built-in markers (`NA`, `null`, ...)
    pub null_values: Option<Vec<String>>,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn with_has_header(mut self, has_header: bool) -> Self {
        self.has_header = Some(has_header);
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_compression(mut self, compression: CompressionFormat) -> Self {
        self.compression = Some(compression);
        self
    }

    pub fn with_null_values(mut self, null_values: Vec<String>) -> Self {
        self.null_values = Some(null_values);
        self
    }

    /// Create OpenOptions from CLI args and config, with CLI args taking precedence
    pub fn from_args_and_config(args: &cli::Args, config: &AppConfig) -> Self {
        let mut opts = OpenOptions::new();

        opts.delimiter = args
            .delimiter
            .or(config.file_loading.delimiter)
            .filter(char::is_ascii)
            .map(|c| c as u8);

        opts.has_header = if args.no_header {
            Some(false)
        } else {
            config.file_loading.has_header
        };

        opts.sheet = args.sheet.clone().or_else(|| config.file_loading.sheet.clone());

        // Config compression was validated on load; an invalid value here means "auto-detect"
        opts.compression = args
            .compression
            .or_else(|| config.file_loading.compression().ok().flatten());

        // Configured markers replace the built-in list; CLI markers are appended to either
        opts.null_values = match (&config.file_loading.null_values, args.null_value.is_empty()) {
            (None, true) => None,
            (configured, _) => {
                let base: Vec<String> = match configured {
                    Some(values) => values.clone(),
                    None => dataset::DEFAULT_NULL_VALUES
                        .iter()
                        .map(|v| v.to_string())
                        .collect(),
                };
                Some(base.into_iter().chain(args.null_value.iter().cloned()).collect())
            }
        };

        opts
    }
}

impl From<&cli::Args> for OpenOptions {
    fn from(args: &cli::Args) -> Self {
        let config = AppConfig::default();
        Self::from_args_and_config(args, &config)
    }
}


#[cfg(test)]
mod open_options_tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "datask",
            "data.csv",
            "--delimiter",
            ";",
            "--no-header",
            "--sheet",
            "people",
        ]);
        let mut config = AppConfig::default();
        config.file_loading.delimiter = Some(',');
        config.file_loading.has_header = Some(true);
        config.file_loading.compression = Some("zstd".to_string());

        let opts = OpenOptions::from_args_and_config(&args, &config);
        assert_eq!(opts.delimiter, Some(b';'));
        assert_eq!(opts.has_header, Some(false));
        assert_eq!(opts.sheet.as_deref(), Some("people"));
        assert_eq!(opts.compression, Some(CompressionFormat::Zstd));
        assert_eq!(opts.null_values, None);
    }

    #[test]
    fn test_null_values_merge_config_and_cli() {
        let args = Args::parse_from(["datask", "data.csv", "--null-value", "-"]);
        let mut config = AppConfig::default();
        config.file_loading.null_values = Some(vec!["NA".to_string()]);

        let opts = OpenOptions::from_args_and_config(&args, &config);
        assert_eq!(
            opts.null_values,
            Some(vec!["NA".to_string(), "-".to_string()])
        );

        let opts = OpenOptions::from_args_and_config(&args, &AppConfig::default());
        let markers = opts.null_values.unwrap();
        assert!(markers.iter().any(|m| m == "NA"));
        assert_eq!(markers.last().map(String::as_str), Some("-"));
    }

    #[test]
    fn test_config_used_when_cli_silent() {
        let args = Args::parse_from(["datask", "data.csv"]);
        let mut config = AppConfig::default();
        config.file_loading.delimiter = Some('|');

        let opts = OpenOptions::from_args_and_config(&args, &config);
        assert_eq!(opts.delimiter, Some(b'|'));
        assert_eq!(opts.has_header, None);
        assert_eq!(opts.compression, None);
    }
}
