//! Exact answers computed from the dataset.
//!
//! [`RetrievalEngine::execute`] returns `None` whenever a question turns out not to be
//! answerable from the data (no usable column, no numeric values), so the router can
//! hand it to the narrative path instead.

use serde::Serialize;

use crate::config::QueryConfig;
use crate::dataset::{format_number, Dataset, SemanticType};
use crate::intent::{Classification, Intent};
use crate::resolver::Aggregation;

/// Number of known entities listed in a "no records found" answer
const ENTITY_PREVIEW: usize = 10;

/// Paired per-entity values for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparedColumn {
    pub column: String,
    /// One value per entity, in entity order; `None` when missing
    pub values: Vec<Option<f64>>,
}

/// Structured side-by-side comparison of two entities, meant for a chart renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPayload {
    pub kind: &'static str,
    pub entities: Vec<String>,
    pub columns: Vec<ComparedColumn>,
}

impl ComparisonPayload {
    pub fn new(entities: Vec<String>, columns: Vec<ComparedColumn>) -> Self {
        Self {
            kind: "comparison",
            entities,
            columns,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ComparedColumn> {
        self.columns.iter().find(|c| c.column == name)
    }
}

/// A deterministic answer
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Comparison(ComparisonPayload),
}

impl Answer {
    /// The answer as the string handed back to the caller; comparisons render as JSON
    pub fn render(&self) -> String {
        match self {
            Answer::Text(text) => text.clone(),
            Answer::Comparison(payload) => serde_json::to_string(payload)
                .unwrap_or_else(|e| format!("Comparison could not be rendered: {}", e)),
        }
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

fn describe(value: Option<String>) -> String {
    value.unwrap_or_else(|| "no value recorded".to_string())
}

fn capitalized(aggregation: Aggregation) -> String {
    let name = aggregation.to_string();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => name,
    }
}

fn apply(aggregation: Aggregation, values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let result = match aggregation {
        Aggregation::Mean => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Count => values.len() as f64,
    };
    Some(result)
}

fn format_aggregate(aggregation: Aggregation, value: f64) -> String {
    match aggregation {
        Aggregation::Mean => format!("{:.2}", value),
        _ => format_number(value),
    }
}

/// Executes retrieval intents against a dataset
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    identity_column: String,
    list_limit: usize,
}

impl Default for RetrievalEngine {
    fn default() -> Self {
        Self::new("name", 20)
    }
}

impl RetrievalEngine {
    pub fn new(identity_column: impl Into<String>, list_limit: usize) -> Self {
        Self {
            identity_column: identity_column.into().trim().to_lowercase(),
            list_limit,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.identity_column.as_str(), config.list_limit)
    }

    /// Answer a classified question, or `None` when it cannot be answered from the data
    pub fn execute(&self, classification: &Classification, dataset: &Dataset) -> Option<Answer> {
        let reference = &classification.reference;
        match classification.intent {
            Intent::DataRetrievalScalar => {
                if let Some(phrase) = &reference.unresolved {
                    return Some(Answer::Text(self.no_records(phrase, dataset)));
                }
                let entity = reference.entities.first()?;
                let column = reference.column.as_deref()?;
                self.scalar(entity, column, dataset).map(Answer::Text)
            }
            Intent::DataRetrievalAggregate => {
                let column = reference.column.as_deref()?;
                let aggregation = reference.aggregation?;
                match reference.entities.first() {
                    Some(entity) => self.entity_aggregate(entity, column, aggregation, dataset),
                    None => self.aggregate(column, aggregation, dataset),
                }
                .map(Answer::Text)
            }
            Intent::DataRetrievalList => {
                let column = reference.column.as_deref()?;
                self.list(column, dataset).map(Answer::Text)
            }
            Intent::DataRetrievalMultiEntity => {
                let column = reference.column.as_deref()?;
                let lines: Vec<String> = reference
                    .entities
                    .iter()
                    .filter_map(|entity| self.scalar(entity, column, dataset))
                    .collect();
                (!lines.is_empty()).then(|| Answer::Text(lines.join("\n")))
            }
            Intent::DataRetrievalComparison => self
                .compare(&reference.entities, dataset)
                .map(Answer::Comparison),
            Intent::Analysis => None,
        }
    }

    fn first_row(&self, entity: &str, dataset: &Dataset) -> Option<usize> {
        dataset
            .rows_matching(&self.identity_column, entity)
            .first()
            .copied()
    }

    /// Value of `column` at the entity's first row. Later rows for the same entity are ignored.
    fn scalar(&self, entity: &str, column: &str, dataset: &Dataset) -> Option<String> {
        if !dataset.has_column(column) {
            return None;
        }
        let answer = match self.first_row(entity, dataset) {
            Some(row) => format!(
                "{}'s {}: {}",
                entity,
                column,
                describe(dataset.display_value(column, row))
            ),
            None => self.no_records(entity, dataset),
        };
        Some(answer)
    }

    fn entity_aggregate(
        &self,
        entity: &str,
        column: &str,
        aggregation: Aggregation,
        dataset: &Dataset,
    ) -> Option<String> {
        let all = dataset.numeric_values(column)?;
        let rows = dataset.rows_matching(&self.identity_column, entity);
        if rows.is_empty() {
            return Some(self.no_records(entity, dataset));
        }
        if rows.len() == 1 && aggregation == Aggregation::Mean {
            let value = all.get(rows[0]).copied().flatten().map(format_number);
            return Some(format!(
                "{} has only one record: {} = {} (average not applicable for a single record)",
                entity,
                column,
                describe(value)
            ));
        }
        let values: Vec<f64> = rows.iter().filter_map(|&r| all.get(r).copied().flatten()).collect();
        let result = apply(aggregation, &values)?;
        Some(format!(
            "{}'s {} {}: {}",
            entity,
            aggregation,
            column,
            format_aggregate(aggregation, result)
        ))
    }

    fn aggregate(&self, column: &str, aggregation: Aggregation, dataset: &Dataset) -> Option<String> {
        if aggregation == Aggregation::Count {
            let values = dataset.text_values(column)?;
            let present = values.iter().flatten().count();
            let unique = dataset.distinct_values(column).len();
            return Some(format!(
                "Count of {}: {} values ({} unique)",
                column, present, unique
            ));
        }

        let values: Vec<f64> = dataset.numeric_values(column)?.into_iter().flatten().collect();
        let result = apply(aggregation, &values)?;
        let label = match aggregation {
            Aggregation::Sum => format!("Sum of {}", column),
            other => format!("{} {}", capitalized(other), column),
        };
        Some(format!("{}: {}", label, format_aggregate(aggregation, result)))
    }

    fn list(&self, column: &str, dataset: &Dataset) -> Option<String> {
        if !dataset.has_column(column) {
            return None;
        }
        let values = dataset.distinct_values(column);
        let answer = if values.len() > self.list_limit {
            format!("{}: {} unique values", column, values.len())
        } else if values.is_empty() {
            format!("{}: no values recorded", column)
        } else {
            format!("{}: {}", column, values.join(", "))
        };
        Some(answer)
    }

    fn compare(&self, entities: &[String], dataset: &Dataset) -> Option<ComparisonPayload> {
        if entities.is_empty() {
            return None;
        }
        let rows: Vec<Option<usize>> = entities
            .iter()
            .map(|entity| self.first_row(entity, dataset))
            .collect();
        let columns = dataset
            .columns()
            .filter(|(name, kind)| *kind == SemanticType::Numeric && *name != self.identity_column)
            .filter_map(|(name, _)| {
                let all = dataset.numeric_values(name)?;
                let values = rows
                    .iter()
                    .map(|row| row.and_then(|r| all.get(r).copied().flatten()))
                    .collect();
                Some(ComparedColumn {
                    column: name.to_string(),
                    values,
                })
            })
            .collect();
        Some(ComparisonPayload::new(entities.to_vec(), columns))
    }

    /// Recovered answer for an entity that is not in the identity column
    fn no_records(&self, phrase: &str, dataset: &Dataset) -> String {
        let known = dataset.distinct_values(&self.identity_column);
        if known.is_empty() {
            return format!("No records found for '{}'.", phrase);
        }
        let mut listed = known
            .iter()
            .take(ENTITY_PREVIEW)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        if known.len() > ENTITY_PREVIEW {
            listed.push_str(&format!(" and {} more", known.len() - ENTITY_PREVIEW));
        }
        format!("No records found for '{}'. Available entities: {}", phrase, listed)
    }
}
