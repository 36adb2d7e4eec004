use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::MatchMode;
use crate::CompressionFormat;

/// Provider names understood by `[providers] order`
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "gemini", "ollama"];

/// Manages config directory and config file operations
#[derive(Clone)]
pub struct ConfigManager {
    pub(crate) config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| eyre!("Could not determine config directory"))?
            .join(app_name);

        Ok(Self { config_dir })
    }

    /// Get the config directory path
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Get path to a specific config file or subdirectory
    pub fn config_path(&self, path: &str) -> PathBuf {
        self.config_dir.join(path)
    }

    /// Ensure the config directory exists
    pub fn ensure_config_dir(&self) -> Result<()> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        Ok(())
    }

    /// Generate default configuration template as a string
    pub fn generate_default_config(&self) -> String {
        DEFAULT_CONFIG_TEMPLATE.to_string()
    }

    /// Write default configuration to config file
    pub fn write_default_config(&self, force: bool) -> Result<PathBuf> {
        let config_path = self.config_path("config.toml");

        if config_path.exists() && !force {
            return Err(eyre!(
                "Config file already exists at {}. Use --force to overwrite.",
                config_path.display()
            ));
        }

        self.ensure_config_dir()?;
        std::fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE)?;

        Ok(config_path)
    }

    /// Load `config.toml` from this directory layered over the defaults
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = AppConfig::default();
        let config_path = self.config_path("config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).map_err(|e| {
                eyre!(
                    "Failed to read config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            let user_config: AppConfig = toml::from_str(&content).map_err(|e| {
                eyre!(
                    "Failed to parse config file at {}: {}",
                    config_path.display(),
                    e
                )
            })?;
            config.merge(user_config);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Configuration format version (for future compatibility)
    pub version: String,
    pub file_loading: FileLoadingConfig,
    pub query: QueryConfig,
    pub digest: DigestConfig,
    pub providers: ProvidersConfig,
    pub history: HistoryConfig,
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoadingConfig {
    pub delimiter: Option<char>,
    pub has_header: Option<bool>,
    pub sheet: Option<String>,
    pub compression: Option<String>,
    /// Cell values read as missing; replaces the built-in markers when set
    pub null_values: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub identity_column: String,
    pub match_mode: String,
    pub list_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub top_categories: usize,
    pub max_columns: usize,
    pub max_label_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub order: Vec<String>,
    pub timeout_secs: u64,
    pub openai: EndpointConfig,
    pub gemini: EndpointConfig,
    pub ollama: EndpointConfig,
}

/// Where and how to reach one narrative provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the credential; `None` for providers that need none
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DebugConfig {
    pub enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: "0.1".to_string(),
            file_loading: FileLoadingConfig::default(),
            query: QueryConfig::default(),
            digest: DigestConfig::default(),
            providers: ProvidersConfig::default(),
            history: HistoryConfig::default(),
            debug: DebugConfig::default(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            identity_column: "name".to_string(),
            match_mode: "substring".to_string(),
            list_limit: 20,
        }
    }
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            top_categories: 5,
            max_columns: 40,
            max_label_len: 40,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: vec!["openai".to_string(), "gemini".to_string()],
            timeout_secs: 30,
            openai: EndpointConfig {
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4-turbo".to_string(),
                api_key_env: Some("OPENAI_API_KEY".to_string()),
            },
            gemini: EndpointConfig {
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-1.5-flash".to_string(),
                api_key_env: Some("GEMINI_API_KEY".to_string()),
            },
            ollama: EndpointConfig {
                base_url: "http://localhost:11434".to_string(),
                model: "llama3.2".to_string(),
                api_key_env: None,
            },
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            limit: 1000,
        }
    }
}

// Configuration loading and merging
impl AppConfig {
    /// Load configuration from all layers (default → user)
    pub fn load(app_name: &str) -> Result<Self> {
        ConfigManager::new(app_name)?.load()
    }

    /// Merge another config into this one (other takes precedence)
    pub fn merge(&mut self, other: AppConfig) {
        if other.version != AppConfig::default().version {
            self.version = other.version;
        }

        self.file_loading.merge(other.file_loading);
        self.query.merge(other.query);
        self.digest.merge(other.digest);
        self.providers.merge(other.providers);
        self.history.merge(other.history);
        self.debug.merge(other.debug);
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !self.version.starts_with("0.1") {
            return Err(eyre!(
                "Unsupported config version: {}. Expected 0.1.x",
                self.version
            ));
        }

        if self.query.identity_column.trim().is_empty() {
            return Err(eyre!("identity_column must not be empty"));
        }
        self.query.match_mode()?;
        if self.query.list_limit == 0 {
            return Err(eyre!("list_limit must be greater than 0"));
        }

        if self.digest.top_categories == 0 {
            return Err(eyre!("top_categories must be greater than 0"));
        }
        if self.digest.max_columns == 0 {
            return Err(eyre!("max_columns must be greater than 0"));
        }

        if self.providers.timeout_secs == 0 {
            return Err(eyre!("timeout_secs must be greater than 0"));
        }
        for name in &self.providers.order {
            if !KNOWN_PROVIDERS.contains(&name.as_str()) {
                return Err(eyre!(
                    "Unknown provider '{}'. Must be one of: {}",
                    name,
                    KNOWN_PROVIDERS.join(", ")
                ));
            }
        }

        if let Some(delimiter) = self.file_loading.delimiter {
            if !delimiter.is_ascii() {
                return Err(eyre!("delimiter must be a single ASCII character"));
            }
        }
        self.file_loading.compression()?;

        Ok(())
    }
}

// Merge implementations for each config section
impl FileLoadingConfig {
    pub fn merge(&mut self, other: Self) {
        if other.delimiter.is_some() {
            self.delimiter = other.delimiter;
        }
        if other.has_header.is_some() {
            self.has_header = other.has_header;
        }
        if other.sheet.is_some() {
            self.sheet = other.sheet;
        }
        if other.compression.is_some() {
            self.compression = other.compression;
        }
        if other.null_values.is_some() {
            self.null_values = other.null_values;
        }
    }

    /// Parse the configured compression name
    pub fn compression(&self) -> Result<Option<CompressionFormat>> {
        match self.compression.as_deref() {
            None => Ok(None),
            Some("gzip") => Ok(Some(CompressionFormat::Gzip)),
            Some("zstd") => Ok(Some(CompressionFormat::Zstd)),
            Some("bzip2") => Ok(Some(CompressionFormat::Bzip2)),
            Some("xz") => Ok(Some(CompressionFormat::Xz)),
            Some(other) => Err(eyre!(
                "Invalid compression: {}. Must be 'gzip', 'zstd', 'bzip2' or 'xz'",
                other
            )),
        }
    }
}

impl QueryConfig {
    pub fn merge(&mut self, other: Self) {
        let default = QueryConfig::default();
        if other.identity_column != default.identity_column {
            self.identity_column = other.identity_column;
        }
        if other.match_mode != default.match_mode {
            self.match_mode = other.match_mode;
        }
        if other.list_limit != default.list_limit {
            self.list_limit = other.list_limit;
        }
    }

    /// Parse the configured match mode
    pub fn match_mode(&self) -> Result<MatchMode> {
        match self.match_mode.as_str() {
            "substring" => Ok(MatchMode::Substring),
            "word" => Ok(MatchMode::Word),
            other => Err(eyre!(
                "Invalid match_mode: {}. Must be 'substring' or 'word'",
                other
            )),
        }
    }
}

impl DigestConfig {
    pub fn merge(&mut self, other: Self) {
        let default = DigestConfig::default();
        if other.top_categories != default.top_categories {
            self.top_categories = other.top_categories;
        }
        if other.max_columns != default.max_columns {
            self.max_columns = other.max_columns;
        }
        if other.max_label_len != default.max_label_len {
            self.max_label_len = other.max_label_len;
        }
    }
}

impl ProvidersConfig {
    pub fn merge(&mut self, other: Self) {
        let default = ProvidersConfig::default();
        if other.order != default.order {
            self.order = other.order;
        }
        if other.timeout_secs != default.timeout_secs {
            self.timeout_secs = other.timeout_secs;
        }
        self.openai.merge(other.openai, &default.openai);
        self.gemini.merge(other.gemini, &default.gemini);
        self.ollama.merge(other.ollama, &default.ollama);
    }
}

impl EndpointConfig {
    fn merge(&mut self, other: Self, default: &Self) {
        // A table written in config.toml without a key deserializes that key as empty
        if !other.base_url.is_empty() && other.base_url != default.base_url {
            self.base_url = other.base_url;
        }
        if !other.model.is_empty() && other.model != default.model {
            self.model = other.model;
        }
        if other.api_key_env.is_some() && other.api_key_env != default.api_key_env {
            self.api_key_env = other.api_key_env;
        }
    }
}

impl HistoryConfig {
    pub fn merge(&mut self, other: Self) {
        let default = HistoryConfig::default();
        if other.enabled != default.enabled {
            self.enabled = other.enabled;
        }
        if other.limit != default.limit {
            self.limit = other.limit;
        }
    }
}

impl DebugConfig {
    pub fn merge(&mut self, other: Self) {
        if other.enabled {
            self.enabled = true;
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("../config/default.toml");
