//! Loading and normalizing tabular data.
//!
//! Every source is read into a polars [`DataFrame`] and then normalized: headers are
//! trimmed and lower-cased, numeric columns become `Float64`, temporal columns become
//! trimmed text, and every other column becomes trimmed, lower-cased text. The semantic
//! type of each column is recorded so that re-normalizing is a no-op.

use calamine::{open_workbook_auto, Data, DataType as CellType, Reader};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use polars::datatypes::TimeUnit;
use polars::io::csv::read::NullValues;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::{CompressionFormat, OpenOptions};

/// Cell values read as missing when no `null_values` are configured
pub const DEFAULT_NULL_VALUES: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-NaN", "-nan", "<NA>", "N/A", "NA", "NULL", "NaN", "None",
    "n/a", "nan", "null",
];

/// Errors raised while loading a dataset. A failed load never yields a partial dataset.
#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("unsupported file format: {}", path.display())]
    UnsupportedFormat { path: PathBuf },
    #[error("could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse dataset: {0}")]
    Parse(String),
    #[error("dataset has no columns")]
    Empty,
}

impl From<PolarsError> for DatasetLoadError {
    fn from(e: PolarsError) -> Self {
        DatasetLoadError::Parse(e.to_string())
    }
}

/// How the values of a column are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Numeric,
    Categorical,
    Datetime,
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SemanticType::Numeric => write!(f, "numeric"),
            SemanticType::Categorical => write!(f, "categorical"),
            SemanticType::Datetime => write!(f, "datetime"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Delimited { separator: Option<u8> },
    Parquet,
    Spreadsheet,
}

/// A canonical, normalized, read-only table
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    kinds: Vec<SemanticType>,
}

/// Load and normalize a dataset from a file, picking the reader from the file extension.
pub fn load_dataset(path: &Path, options: &OpenOptions) -> Result<Dataset, DatasetLoadError> {
    let (format, compression) = detect_format(path, options)?;
    let null_values = null_markers(options);
    let frame = match format {
        SourceFormat::Delimited { separator } => {
            let bytes = read_bytes(path, compression)?;
            read_delimited(
                bytes,
                options.delimiter.or(separator),
                options.has_header,
                &null_values,
            )?
        }
        SourceFormat::Parquet => {
            let file = File::open(path).map_err(|source| DatasetLoadError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            ParquetReader::new(file).finish()?
        }
        SourceFormat::Spreadsheet => {
            read_spreadsheet(path, options.sheet.as_deref(), &null_values)?
        }
    };
    let dataset = Dataset::from_frame(frame)?;
    debug!(
        path = %path.display(),
        rows = dataset.height(),
        columns = dataset.width(),
        "dataset loaded"
    );
    Ok(dataset)
}

fn detect_format(
    path: &Path,
    options: &OpenOptions,
) -> Result<(SourceFormat, Option<CompressionFormat>), DatasetLoadError> {
    let unsupported = || DatasetLoadError::UnsupportedFormat {
        path: path.to_path_buf(),
    };
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_lowercase)
        .ok_or_else(unsupported)?;

    // A compression suffix (data.csv.gz) is peeled off before looking at the format extension
    let detected = CompressionFormat::from_extension(path);
    let inner_name = match detected {
        Some(c) => file_name
            .strip_suffix(&format!(".{}", c.extension()))
            .or_else(|| file_name.rsplit_once('.').map(|(stem, _)| stem))
            .unwrap_or(&file_name)
            .to_string(),
        None => file_name.clone(),
    };
    let compression = options.compression.or(detected);

    let ext = Path::new(&inner_name)
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(unsupported)?;
    let format = match ext {
        "csv" => SourceFormat::Delimited {
            separator: Some(b','),
        },
        "tsv" | "tab" => SourceFormat::Delimited {
            separator: Some(b'\t'),
        },
        "psv" => SourceFormat::Delimited {
            separator: Some(b'|'),
        },
        "txt" => SourceFormat::Delimited { separator: None },
        "parquet" => SourceFormat::Parquet,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => SourceFormat::Spreadsheet,
        _ => return Err(unsupported()),
    };

    // An explicit delimiter always wins over the one implied by the extension
    let format = match (format, options.delimiter) {
        (SourceFormat::Delimited { .. }, Some(d)) => SourceFormat::Delimited { separator: Some(d) },
        (f, _) => f,
    };

    if compression.is_some() && !matches!(format, SourceFormat::Delimited { .. }) {
        return Err(unsupported());
    }
    Ok((format, compression))
}

fn read_bytes(
    path: &Path,
    compression: Option<CompressionFormat>,
) -> Result<Vec<u8>, DatasetLoadError> {
    let io_err = |source: std::io::Error| DatasetLoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_err)?;
    let mut reader: Box<dyn Read> = match compression {
        None => Box::new(BufReader::new(file)),
        Some(CompressionFormat::Gzip) => {
            Box::new(flate2::read::GzDecoder::new(BufReader::new(file)))
        }
        Some(CompressionFormat::Zstd) => {
            Box::new(zstd::stream::read::Decoder::new(file).map_err(io_err)?)
        }
        Some(CompressionFormat::Bzip2) => {
            Box::new(bzip2::read::BzDecoder::new(BufReader::new(file)))
        }
        Some(CompressionFormat::Xz) => Box::new(xz2::read::XzDecoder::new(BufReader::new(file))),
    };
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(io_err)?;
    Ok(bytes)
}

/// Pick the most frequent candidate delimiter in the header line, defaulting to a comma.
fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    [b',', b';', b'\t', b'|']
        .into_iter()
        .map(|d| (d, header.iter().filter(|b| **b == d).count()))
        .filter(|(_, count)| *count > 0)
        .max_by_key(|(_, count)| *count)
        .map(|(d, _)| d)
        .unwrap_or(b',')
}

/// Markers read as missing: the configured list, or the built-in one when none is set
fn null_markers(options: &OpenOptions) -> Vec<String> {
    match &options.null_values {
        Some(values) => values.clone(),
        None => DEFAULT_NULL_VALUES.iter().map(|v| v.to_string()).collect(),
    }
}

fn read_delimited(
    bytes: Vec<u8>,
    separator: Option<u8>,
    has_header: Option<bool>,
    null_values: &[String],
) -> Result<DataFrame, DatasetLoadError> {
    let separator = separator.unwrap_or_else(|| sniff_delimiter(&bytes));
    let mut read_options = CsvReadOptions::default();
    if let Some(has_header) = has_header {
        read_options.has_header = has_header;
    }
    // Scan every row before settling on column types so late text does not break parsing
    read_options.infer_schema_length = None;
    let nv = (!null_values.is_empty()).then(|| {
        NullValues::AllColumns(
            null_values
                .iter()
                .map(|v| PlSmallStr::from(v.as_str()))
                .collect(),
        )
    });
    read_options = read_options.map_parse_options(|opts| {
        opts.with_separator(separator)
            .with_try_parse_dates(true)
            .with_null_values(nv.clone())
    });
    let df = CsvReader::new(Cursor::new(bytes))
        .with_options(read_options)
        .finish()?;
    Ok(df)
}

fn spreadsheet_error(e: impl std::fmt::Display) -> DatasetLoadError {
    DatasetLoadError::Parse(format!("spreadsheet: {}", e))
}

fn read_spreadsheet(
    path: &Path,
    sheet: Option<&str>,
    null_values: &[String],
) -> Result<DataFrame, DatasetLoadError> {
    let mut workbook = open_workbook_auto(path).map_err(spreadsheet_error)?;
    let range = match sheet {
        Some(sel) => match sel.parse::<usize>() {
            Ok(idx) => workbook
                .worksheet_range_at(idx)
                .ok_or_else(|| spreadsheet_error(format!("no sheet at index {}", idx)))?
                .map_err(spreadsheet_error)?,
            Err(_) => workbook.worksheet_range(sel).map_err(spreadsheet_error)?,
        },
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| spreadsheet_error("workbook has no worksheets"))?
            .map_err(spreadsheet_error)?,
    };

    let rows: Vec<Vec<Data>> = range.rows().map(|r| r.to_vec()).collect();
    let Some((header, body)) = rows.split_first() else {
        return Err(DatasetLoadError::Empty);
    };

    let mut seen = HashSet::new();
    let mut columns = Vec::with_capacity(header.len());
    for (idx, cell) in header.iter().enumerate() {
        let raw = cell.as_string().unwrap_or_else(|| cell.to_string());
        let name = unique_name(raw.trim(), idx, &mut seen);
        let cells: Vec<Option<&Data>> = body.iter().map(|row| row.get(idx)).collect();
        columns.push(spreadsheet_column(&name, &cells, null_values)?.into());
    }
    Ok(DataFrame::new(columns)?)
}

fn cell_is_blank(cell: &Data, null_values: &[String]) -> bool {
    cell.is_empty()
        || cell.get_string().is_some_and(|s| {
            let s = s.trim();
            s.is_empty() || null_values.iter().any(|marker| marker == s)
        })
}

fn filled_cell<'a>(cell: &Option<&'a Data>, null_values: &[String]) -> Option<&'a Data> {
    cell.filter(|c| !cell_is_blank(c, null_values))
}

/// Converts a cell to NaiveDateTime (Excel serial, DateTimeIso, or ISO-style string).
fn cell_to_naive_datetime(cell: &Data) -> Option<NaiveDateTime> {
    if let Some(dt) = cell.as_datetime() {
        return Some(dt);
    }
    let s = cell.get_datetime_iso().or_else(|| cell.get_string())?.trim();
    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Build a series from one spreadsheet column: numeric if every filled cell is a number,
/// temporal if every filled cell is a date, boolean if every filled cell is a bool, text otherwise.
fn spreadsheet_column(
    name: &str,
    cells: &[Option<&Data>],
    null_values: &[String],
) -> Result<Series, DatasetLoadError> {
    let filled: Vec<&Data> = cells
        .iter()
        .flatten()
        .copied()
        .filter(|c| !cell_is_blank(c, null_values))
        .collect();

    if !filled.is_empty() && filled.iter().all(|c| c.is_int() || c.is_float()) {
        let v: Vec<Option<f64>> = cells
            .iter()
            .map(|c| filled_cell(c, null_values).and_then(|cell| cell.as_f64()))
            .collect();
        return Ok(Series::new(name.into(), v));
    }

    let has_date_cell = filled
        .iter()
        .any(|c| c.is_datetime() || c.is_datetime_iso());
    if has_date_cell && filled.iter().all(|c| cell_to_naive_datetime(c).is_some()) {
        let parsed: Vec<Option<NaiveDateTime>> = cells
            .iter()
            .map(|c| filled_cell(c, null_values).and_then(cell_to_naive_datetime))
            .collect();
        let all_midnight = parsed.iter().flatten().all(|dt| dt.time() == NaiveTime::MIN);
        let series = if all_midnight {
            let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
            let days: Vec<Option<i32>> = parsed
                .iter()
                .map(|dt| dt.map(|dt| (dt.date() - epoch).num_days() as i32))
                .collect();
            Series::new(name.into(), days).cast(&DataType::Date)?
        } else {
            let micros: Vec<Option<i64>> = parsed
                .iter()
                .map(|dt| dt.map(|dt| dt.and_utc().timestamp_micros()))
                .collect();
            Series::new(name.into(), micros)
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))?
        };
        return Ok(series);
    }

    if !filled.is_empty() && filled.iter().all(|c| c.is_bool()) {
        let v: Vec<Option<bool>> = cells
            .iter()
            .map(|c| filled_cell(c, null_values).and_then(|cell| cell.get_bool()))
            .collect();
        return Ok(Series::new(name.into(), v));
    }

    let v: Vec<Option<String>> = cells
        .iter()
        .map(|c| {
            filled_cell(c, null_values).map(|cell| cell.as_string().unwrap_or_else(|| cell.to_string()))
        })
        .collect();
    Ok(Series::new(name.into(), v))
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Trim and lower-case a column header
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Make `name` unique among `seen`, naming blank headers after their position.
fn unique_name(name: &str, idx: usize, seen: &mut HashSet<String>) -> String {
    let base = if name.is_empty() {
        format!("column_{}", idx + 1)
    } else {
        name.to_string()
    };
    let mut candidate = base.clone();
    let mut n = 2;
    while seen.contains(&candidate) {
        candidate = format!("{}_{}", base, n);
        n += 1;
    }
    seen.insert(candidate.clone());
    candidate
}

fn normalized_series(
    series: &Series,
    name: &str,
    kind: SemanticType,
) -> Result<Series, DatasetLoadError> {
    let normalized = match kind {
        SemanticType::Numeric => series.cast(&DataType::Float64)?.with_name(name.into()),
        SemanticType::Datetime => {
            let text = series.cast(&DataType::String)?;
            let values: Vec<Option<String>> = text
                .str()?
                .iter()
                .map(|v| v.map(|s| s.trim().to_string()))
                .collect();
            Series::new(name.into(), values)
        }
        SemanticType::Categorical => {
            let text = series.cast(&DataType::String)?;
            let values: Vec<Option<String>> = text
                .str()?
                .iter()
                .map(|v| v.map(|s| s.trim().to_lowercase()))
                .collect();
            Series::new(name.into(), values)
        }
    };
    Ok(normalized)
}

/// Render a number the way answers show it: integral values without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl Dataset {
    /// Normalize an in-memory frame into a dataset
    pub fn from_frame(frame: DataFrame) -> Result<Self, DatasetLoadError> {
        if frame.width() == 0 {
            return Err(DatasetLoadError::Empty);
        }
        let mut seen = HashSet::new();
        let mut columns = Vec::with_capacity(frame.width());
        let mut kinds = Vec::with_capacity(frame.width());
        for (idx, column) in frame.get_columns().iter().enumerate() {
            let series = column.as_materialized_series();
            let name = unique_name(&normalize_header(series.name().as_str()), idx, &mut seen);
            let dtype = series.dtype();
            let kind = if is_numeric_type(dtype) {
                SemanticType::Numeric
            } else if dtype.is_temporal() {
                SemanticType::Datetime
            } else {
                SemanticType::Categorical
            };
            columns.push(normalized_series(series, &name, kind)?.into());
            kinds.push(kind);
        }
        Ok(Self {
            frame: DataFrame::new(columns)?,
            kinds,
        })
    }

    /// Re-apply normalization using the recorded semantic types
    pub fn renormalized(&self) -> Result<Self, DatasetLoadError> {
        let mut columns = Vec::with_capacity(self.width());
        for (column, kind) in self.frame.get_columns().iter().zip(&self.kinds) {
            let series = column.as_materialized_series();
            let name = normalize_header(series.name().as_str());
            columns.push(normalized_series(series, &name, *kind)?.into());
        }
        Ok(Self {
            frame: DataFrame::new(columns)?,
            kinds: self.kinds.clone(),
        })
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    /// Column names and types in declaration order
    pub fn columns(&self) -> impl Iterator<Item = (&str, SemanticType)> + '_ {
        self.frame
            .get_columns()
            .iter()
            .map(|c| c.name().as_str())
            .zip(self.kinds.iter().copied())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns().map(|(name, _)| name).collect()
    }

    pub fn semantic_type(&self, name: &str) -> Option<SemanticType> {
        self.columns()
            .find(|(column, _)| *column == name)
            .map(|(_, kind)| kind)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.semantic_type(name).is_some()
    }

    fn series(&self, name: &str) -> Option<&Series> {
        self.frame
            .column(name)
            .ok()
            .map(|c| c.as_materialized_series())
    }

    /// Values of a numeric column; NaN counts as missing. `None` for non-numeric columns.
    pub fn numeric_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if self.semantic_type(name)? != SemanticType::Numeric {
            return None;
        }
        let values = self
            .series(name)?
            .f64()
            .ok()?
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()))
            .collect();
        Some(values)
    }

    /// Values of any column rendered as text
    pub fn text_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        match self.semantic_type(name)? {
            SemanticType::Numeric => Some(
                self.numeric_values(name)?
                    .into_iter()
                    .map(|v| v.map(format_number))
                    .collect(),
            ),
            SemanticType::Categorical | SemanticType::Datetime => Some(
                self.series(name)?
                    .str()
                    .ok()?
                    .iter()
                    .map(|v| v.map(str::to_string))
                    .collect(),
            ),
        }
    }

    /// The value at `row` of `column` as display text; `None` when missing
    pub fn display_value(&self, column: &str, row: usize) -> Option<String> {
        self.text_values(column)?.into_iter().nth(row).flatten()
    }

    /// Rows whose `column` equals `value` exactly, in row order
    pub fn rows_matching(&self, column: &str, value: &str) -> Vec<usize> {
        self.text_values(column)
            .unwrap_or_default()
            .iter()
            .enumerate()
            .filter(|(_, v)| v.as_deref() == Some(value))
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Distinct non-missing values of a column in order of first appearance
    pub fn distinct_values(&self, column: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.text_values(column)
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter(|v| seen.insert(v.clone()))
            .collect()
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        if self.kinds != other.kinds || self.column_names() != other.column_names() {
            return false;
        }
        self.columns().all(|(name, kind)| match kind {
            SemanticType::Numeric => self.numeric_values(name) == other.numeric_values(name),
            _ => self.text_values(name) == other.text_values(name),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Dataset {
        let df = df!(
            " Name " => ["  Arun", "NEHA ", "Ravi"],
            "AGE" => [25i64, 30, 41],
            "Salary" => [Some(50000.0), None, Some(72000.5)],
            "Dept" => [Some(" HR"), Some("It"), None]
        )
        .unwrap();
        Dataset::from_frame(df).unwrap()
    }

    #[test]
    fn test_headers_and_text_are_normalized() {
        let ds = people();
        assert_eq!(ds.column_names(), vec!["name", "age", "salary", "dept"]);
        assert_eq!(
            ds.text_values("name").unwrap(),
            vec![
                Some("arun".to_string()),
                Some("neha".to_string()),
                Some("ravi".to_string())
            ]
        );
        assert_eq!(ds.text_values("dept").unwrap()[2], None);
    }

    #[test]
    fn test_semantic_types() {
        let ds = people();
        assert_eq!(ds.semantic_type("name"), Some(SemanticType::Categorical));
        assert_eq!(ds.semantic_type("age"), Some(SemanticType::Numeric));
        assert_eq!(ds.semantic_type("salary"), Some(SemanticType::Numeric));
        assert_eq!(ds.semantic_type("missing"), None);
        assert!(ds.numeric_values("name").is_none());
    }

    #[test]
    fn test_renormalize_is_idempotent() {
        let ds = people();
        let again = ds.renormalized().unwrap();
        assert_eq!(ds, again);
        assert_eq!(again, again.renormalized().unwrap());
    }

    #[test]
    fn test_duplicate_headers_get_suffix() {
        let df = DataFrame::new(vec![
            Series::new("Age".into(), [1i64, 2]).into(),
            Series::new("age ".into(), [3i64, 4]).into(),
        ])
        .unwrap();
        let ds = Dataset::from_frame(df).unwrap();
        assert_eq!(ds.column_names(), vec!["age", "age_2"]);
    }

    #[test]
    fn test_rows_matching_and_display() {
        let ds = people();
        assert_eq!(ds.rows_matching("name", "neha"), vec![1]);
        assert_eq!(ds.display_value("age", 0).as_deref(), Some("25"));
        assert_eq!(ds.display_value("salary", 2).as_deref(), Some("72000.5"));
        assert_eq!(ds.display_value("salary", 1), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(25.0), "25");
        assert_eq!(format_number(-3.0), "-3");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_sniff_delimiter() {
        assert_eq!(sniff_delimiter(b"a;b;c\n1;2;3"), b';');
        assert_eq!(sniff_delimiter(b"a\tb\n1\t2"), b'\t');
        assert_eq!(sniff_delimiter(b"single\n1"), b',');
    }

    #[test]
    fn test_detect_format() {
        let opts = OpenOptions::new();
        assert_eq!(
            detect_format(Path::new("data.CSV"), &opts).unwrap(),
            (
                SourceFormat::Delimited {
                    separator: Some(b',')
                },
                None
            )
        );
        assert_eq!(
            detect_format(Path::new("data.csv.gz"), &opts).unwrap(),
            (
                SourceFormat::Delimited {
                    separator: Some(b',')
                },
                Some(CompressionFormat::Gzip)
            )
        );
        assert_eq!(
            detect_format(Path::new("book.xlsx"), &opts).unwrap().0,
            SourceFormat::Spreadsheet
        );
        assert!(matches!(
            detect_format(Path::new("notes.docx"), &opts),
            Err(DatasetLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("book.xlsx.gz"), &opts),
            Err(DatasetLoadError::UnsupportedFormat { .. })
        ));
    }
}
