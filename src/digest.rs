//! Bounded statistical summary of a dataset used as narrative context.
//!
//! A digest carries per-column aggregates only. Raw rows are never copied into it, and
//! rendering caps both the number of columns and the length of category labels.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::debug;

use crate::config::DigestConfig;
use crate::dataset::{Dataset, SemanticType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestOptions {
    /// Most frequent values reported per categorical column
    pub top_categories: usize,
    /// Columns summarized before the rest are only counted
    pub max_columns: usize,
    /// Longest category label rendered before truncation
    pub max_label_len: usize,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            top_categories: 5,
            max_columns: 40,
            max_label_len: 40,
        }
    }
}

impl From<&DigestConfig> for DigestOptions {
    fn from(config: &DigestConfig) -> Self {
        Self {
            top_categories: config.top_categories,
            max_columns: config.max_columns,
            max_label_len: config.max_label_len,
        }
    }
}

/// Five-number summary of a numeric column (linear interpolation between ranks)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quartiles {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub column: String,
    /// Non-missing values
    pub count: usize,
    /// `None` when the column has no values
    pub quartiles: Option<Quartiles>,
    pub mean: Option<f64>,
    /// Sample standard deviation; `None` with fewer than two values
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoricalSummary {
    pub column: String,
    pub unique: usize,
    /// Most frequent values with their counts, most frequent first
    pub top: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContextDigest {
    pub rows: usize,
    pub columns: usize,
    pub numeric: Vec<NumericSummary>,
    pub categorical: Vec<CategoricalSummary>,
    /// Missing-cell count per column, only for columns with gaps
    pub missing: Vec<(String, usize)>,
    pub duplicate_rows: usize,
    pub total_cells: usize,
    pub missing_cells: usize,
    /// Columns beyond `max_columns` that were left out of the per-column sections
    pub omitted_columns: usize,
    max_label_len: usize,
}

/// Value at quantile `p` of sorted data, interpolating linearly between ranks
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

fn summarize_numeric(column: &str, values: &[Option<f64>]) -> NumericSummary {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let count = sorted.len();

    if count == 0 {
        return NumericSummary {
            column: column.to_string(),
            count,
            quartiles: None,
            mean: None,
            std: None,
        };
    }

    let mean = sorted.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let var = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        var.sqrt()
    });
    NumericSummary {
        column: column.to_string(),
        count,
        quartiles: Some(Quartiles {
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[count - 1],
        }),
        mean: Some(mean),
        std,
    }
}

fn summarize_categorical(column: &str, values: &[Option<String>], top: usize) -> CategoricalSummary {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for value in values.iter().flatten() {
        let entry = counts.entry(value.as_str()).or_insert(0);
        if *entry == 0 {
            order.push(value.as_str());
        }
        *entry += 1;
    }
    // Stable sort keeps first-appearance order among equal counts
    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|value| (value.to_string(), counts[value]))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    let unique = ranked.len();
    ranked.truncate(top);
    CategoricalSummary {
        column: column.to_string(),
        unique,
        top: ranked,
    }
}

fn count_duplicate_rows(columns: &[Vec<Option<String>>], rows: usize) -> usize {
    let mut seen = HashSet::with_capacity(rows);
    (0..rows)
        .filter(|&row| {
            let key: Vec<Option<&str>> = columns
                .iter()
                .map(|values| values.get(row).and_then(|v| v.as_deref()))
                .collect();
            !seen.insert(key)
        })
        .count()
}

/// Summarize the full dataset. Columns without any valid value are reported as empty
/// rather than failing the digest.
pub fn build_digest(dataset: &Dataset, options: &DigestOptions) -> ContextDigest {
    let rows = dataset.height();
    let text: Vec<Vec<Option<String>>> = dataset
        .column_names()
        .into_iter()
        .map(|name| dataset.text_values(name).unwrap_or_default())
        .collect();

    let mut numeric = Vec::new();
    let mut categorical = Vec::new();
    let mut missing = Vec::new();
    let mut missing_cells = 0;

    for (idx, (name, kind)) in dataset.columns().enumerate() {
        let gaps = text[idx].iter().filter(|v| v.is_none()).count();
        missing_cells += gaps;
        if idx >= options.max_columns {
            continue;
        }
        if gaps > 0 {
            missing.push((name.to_string(), gaps));
        }
        match kind {
            SemanticType::Numeric => {
                let values = dataset.numeric_values(name).unwrap_or_default();
                numeric.push(summarize_numeric(name, &values));
            }
            SemanticType::Categorical | SemanticType::Datetime => {
                categorical.push(summarize_categorical(name, &text[idx], options.top_categories));
            }
        }
    }

    let digest = ContextDigest {
        rows,
        columns: dataset.width(),
        numeric,
        categorical,
        missing,
        duplicate_rows: count_duplicate_rows(&text, rows),
        total_cells: rows * dataset.width(),
        missing_cells,
        omitted_columns: dataset.width().saturating_sub(options.max_columns),
        max_label_len: options.max_label_len,
    };
    debug!(
        rows = digest.rows,
        columns = digest.columns,
        omitted = digest.omitted_columns,
        "context digest built"
    );
    digest
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v))
}

impl ContextDigest {
    pub fn complete_cells(&self) -> usize {
        self.total_cells - self.missing_cells
    }

    pub fn completeness(&self) -> f64 {
        if self.total_cells == 0 {
            100.0
        } else {
            percent(self.complete_cells(), self.total_cells)
        }
    }

    fn label(&self, value: &str) -> String {
        if value.chars().count() <= self.max_label_len {
            value.to_string()
        } else {
            let mut short: String = value.chars().take(self.max_label_len).collect();
            short.push_str("...");
            short
        }
    }

    /// Text block handed to narrative providers
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Dataset overview: {} rows, {} columns", self.rows, self.columns);

        if !self.numeric.is_empty() {
            let _ = writeln!(out, "\nNumeric columns:");
            for summary in &self.numeric {
                let Some(q) = summary.quartiles else {
                    let _ = writeln!(out, "  - {}: no numeric values", summary.column);
                    continue;
                };
                let _ = writeln!(
                    out,
                    "  - {}: count {}, min {:.2}, q1 {:.2}, median {:.2}, q3 {:.2}, max {:.2}, mean {}, std {}",
                    summary.column,
                    summary.count,
                    q.min,
                    q.q1,
                    q.median,
                    q.q3,
                    q.max,
                    fmt_opt(summary.mean),
                    fmt_opt(summary.std)
                );
            }
        }

        if !self.categorical.is_empty() {
            let _ = writeln!(out, "\nCategorical columns:");
            for summary in &self.categorical {
                let _ = writeln!(out, "  - {}: {} unique values", summary.column, summary.unique);
                for (rank, (value, count)) in summary.top.iter().enumerate() {
                    let _ = writeln!(
                        out,
                        "      {}. {}: {} ({:.1}%)",
                        rank + 1,
                        self.label(value),
                        count,
                        percent(*count, self.rows)
                    );
                }
            }
        }

        if self.omitted_columns > 0 {
            let _ = writeln!(out, "\n{} more columns not summarized", self.omitted_columns);
        }

        if !self.missing.is_empty() {
            let _ = writeln!(out, "\nMissing data:");
            for (column, count) in &self.missing {
                let _ = writeln!(
                    out,
                    "  - {}: {} missing ({:.1}%)",
                    column,
                    count,
                    percent(*count, self.rows)
                );
            }
        }

        let _ = writeln!(
            out,
            "\nDuplicate rows: {} ({:.1}%)",
            self.duplicate_rows,
            percent(self.duplicate_rows, self.rows)
        );
        let _ = write!(
            out,
            "Data quality: {} total cells, {} complete ({:.1}%)",
            self.total_cells,
            self.complete_cells(),
            self.completeness()
        );
        out
    }
}

impl std::fmt::Display for ContextDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    fn dataset() -> Dataset {
        let df = df!(
            "name" => ["arun", "neha", "ravi", "meena", "arun", "kiran"],
            "score" => [11.0, 23.0, 57.0, 61.0, 80.0, 99.0],
            "bonus" => [None::<f64>, None, None, None, None, None],
            "team" => [Some("red"), Some("blue"), Some("red"), None, Some("red"), Some("green")]
        )
        .unwrap();
        Dataset::from_frame(df).unwrap()
    }

    #[test]
    fn test_numeric_summary() {
        let digest = build_digest(&dataset(), &DigestOptions::default());
        let score = &digest.numeric[0];
        assert_eq!(score.count, 6);
        let q = score.quartiles.unwrap();
        assert_eq!(q.min, 11.0);
        assert_eq!(q.max, 99.0);
        assert!((q.q1 - 31.5).abs() < 1e-9);
        assert!((q.median - 59.0).abs() < 1e-9);
        assert!((q.q3 - 75.25).abs() < 1e-9);
        assert!((score.mean.unwrap() - 331.0 / 6.0).abs() < 1e-9);
        assert!(score.std.is_some());
    }

    #[test]
    fn test_empty_numeric_column_is_skipped_not_fatal() {
        let digest = build_digest(&dataset(), &DigestOptions::default());
        let bonus = &digest.numeric[1];
        assert_eq!(bonus.count, 0);
        assert!(bonus.quartiles.is_none());
        assert!(digest.render().contains("bonus: no numeric values"));
    }

    #[test]
    fn test_categorical_top_values_and_missing() {
        let digest = build_digest(&dataset(), &DigestOptions::default());
        let team = digest
            .categorical
            .iter()
            .find(|c| c.column == "team")
            .unwrap();
        assert_eq!(team.unique, 3);
        assert_eq!(team.top[0], ("red".to_string(), 3));
        assert_eq!(digest.missing, vec![("bonus".to_string(), 6), ("team".to_string(), 1)]);
        assert_eq!(digest.total_cells, 24);
        assert_eq!(digest.complete_cells(), 17);
    }

    #[test]
    fn test_render_has_no_raw_values() {
        let text = build_digest(&dataset(), &DigestOptions::default()).render();
        assert!(text.contains("Dataset overview: 6 rows, 4 columns"));
        assert!(text.contains("min 11.00"));
        for raw in ["23.00", "57.00", "61.00", "80.00"] {
            assert!(!text.contains(raw), "raw value {} leaked", raw);
        }
    }

    #[test]
    fn test_bounds() {
        let options = DigestOptions {
            top_categories: 1,
            max_columns: 2,
            max_label_len: 2,
        };
        let digest = build_digest(&dataset(), &options);
        assert_eq!(digest.omitted_columns, 2);
        assert_eq!(digest.categorical.len(), 1);
        assert_eq!(digest.categorical[0].top.len(), 1);
        let text = digest.render();
        assert!(text.contains("2 more columns not summarized"));
        assert!(text.contains("ar..."));
    }

    #[test]
    fn test_duplicate_rows() {
        let df = df!("a" => ["x", "x", "y"], "b" => [1.0, 1.0, 2.0]).unwrap();
        let digest = build_digest(&Dataset::from_frame(df).unwrap(), &DigestOptions::default());
        assert_eq!(digest.duplicate_rows, 1);
    }
}
