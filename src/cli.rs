use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Compression format for delimited data files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// Zstandard compression (.zst)
    Zstd,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ compression (.xz)
    Xz,
}

/// How column names and entity values are matched against a question
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum MatchMode {
    /// Plain substring containment ("an" matches inside "anjali")
    #[default]
    Substring,
    /// Whole-word matching on word boundaries
    Word,
}

/// Command-line arguments for datask
#[derive(Parser, Debug)]
#[command(version, about = "Ask questions of a tabular dataset")]
pub struct Args {
    /// Dataset to load (csv, tsv, psv, txt, parquet, xlsx, xlsm, xlsb, xls, ods)
    #[arg(required_unless_present_any = ["clear_cache", "generate_config"])]
    pub path: Option<PathBuf>,

    /// Questions to answer. When omitted, questions are read from stdin, one per line.
    pub questions: Vec<String>,

    /// Specify the delimiter to use when reading a delimited file
    #[arg(long = "delimiter")]
    pub delimiter: Option<char>,

    /// Specify that the file has no header
    #[arg(long = "no-header", action)]
    pub no_header: bool,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz)
    /// If not specified, compression is auto-detected from file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Value to read as missing; repeat for several (adds to config `null_values`)
    #[arg(long = "null-value", value_name = "VALUE")]
    pub null_value: Vec<String>,

    /// Spreadsheet sheet to read, by 0-based index or by name (default: first sheet)
    #[arg(long = "sheet")]
    pub sheet: Option<String>,

    /// Column whose values identify rows (default: "name")
    #[arg(long = "identity-column")]
    pub identity_column: Option<String>,

    /// How columns and entities are matched against the question
    #[arg(long = "match-mode", value_enum)]
    pub match_mode: Option<MatchMode>,

    /// Narrative providers to try, in order (openai, gemini, ollama)
    #[arg(long = "providers", value_delimiter = ',')]
    pub providers: Option<Vec<String>>,

    /// Timeout in seconds for each provider call
    #[arg(long = "timeout")]
    pub timeout_secs: Option<u64>,

    /// Never contact a provider; analysis questions get the local summary
    #[arg(long = "offline", action)]
    pub offline: bool,

    /// Treat each stdin line as a JSON value instead of plain text
    #[arg(long = "json", action)]
    pub json: bool,

    /// Print the full question/answer transcript before exiting
    #[arg(long = "transcript", action)]
    pub transcript: bool,

    /// Enable debug logging to stderr
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Write the default configuration file and exit
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Overwrite an existing configuration file with --generate-config
    #[arg(long = "force", action, requires = "generate_config")]
    pub force: bool,
}
