//! Keyword-precedence routing of questions.
//!
//! The order of the checks in [`classify`] is the contract: an analysis keyword wins
//! over list, lookup and aggregate detection, so "what are the average patterns" is
//! analysis even though it names an aggregation.

use serde::Serialize;
use tracing::debug;

use crate::dataset::Dataset;
use crate::resolver::{has_word, normalize_question, Aggregation, Resolver};

/// Keywords that route a question to generative analysis
pub const ANALYSIS_KEYWORDS: &[&str] = &[
    "pattern",
    "trend",
    "analyze",
    "analysis",
    "summary",
    "summarize",
    "why",
    "insight",
    "describe",
    "compare",
    "comparison",
    "correlat",
    "relationship",
    "outlier",
    "anomal",
    "quality",
    "overview",
    "key statistics",
    "what are the",
];

/// Keywords that mark a two-entity comparison
pub const COMPARISON_KEYWORDS: &[&str] = &["compare", "vs", "versus", "difference", "between"];

/// The handling path chosen for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DataRetrievalScalar,
    DataRetrievalAggregate,
    DataRetrievalList,
    DataRetrievalMultiEntity,
    DataRetrievalComparison,
    Analysis,
}

impl Intent {
    pub fn is_retrieval(&self) -> bool {
        !matches!(self, Intent::Analysis)
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Intent::DataRetrievalScalar => "data_retrieval_scalar",
            Intent::DataRetrievalAggregate => "data_retrieval_aggregate",
            Intent::DataRetrievalList => "data_retrieval_list",
            Intent::DataRetrievalMultiEntity => "data_retrieval_multi_entity",
            Intent::DataRetrievalComparison => "data_retrieval_comparison",
            Intent::Analysis => "analysis",
        };
        write!(f, "{}", name)
    }
}

/// What a question refers to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReference {
    /// Identity-column values, in discovery order
    pub entities: Vec<String>,
    pub column: Option<String>,
    pub aggregation: Option<Aggregation>,
    /// A `<column> of <phrase>` phrase that matched no known entity
    pub unresolved: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub intent: Intent,
    pub reference: EntityReference,
}

impl Classification {
    fn new(intent: Intent, reference: EntityReference) -> Self {
        Self { intent, reference }
    }

    fn analysis() -> Self {
        Self::new(Intent::Analysis, EntityReference::default())
    }
}

fn contains_any(question: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| question.contains(k))
}

/// Assign exactly one intent to a question. Pure: the same question against the same
/// dataset columns always yields the same classification.
pub fn classify(question: &str, dataset: &Dataset, resolver: &Resolver) -> Classification {
    let q = normalize_question(question);
    let classification = classify_normalized(&q, dataset, resolver);
    debug!(
        intent = %classification.intent,
        entities = ?classification.reference.entities,
        column = ?classification.reference.column,
        "question classified"
    );
    classification
}

fn classify_normalized(q: &str, dataset: &Dataset, resolver: &Resolver) -> Classification {
    let entities = resolver.entities(q, dataset);
    let targets = resolver.target_columns(q, dataset);

    // 1. "a and b" with a referenced column
    if has_word(q, "and") && entities.len() >= 2 {
        if let Some(column) = targets.first() {
            return Classification::new(
                Intent::DataRetrievalMultiEntity,
                EntityReference {
                    entities,
                    column: Some(column.to_string()),
                    ..Default::default()
                },
            );
        }
    }

    // 2. two entities side by side
    if contains_any(q, COMPARISON_KEYWORDS) && entities.len() == 2 {
        return Classification::new(
            Intent::DataRetrievalComparison,
            EntityReference {
                entities,
                ..Default::default()
            },
        );
    }

    // 3. analysis keywords pre-empt everything below
    if contains_any(q, ANALYSIS_KEYWORDS) {
        return Classification::analysis();
    }

    // 4. list of a column's values
    if q.contains("list") || (q.contains("show") && q.contains("all")) {
        if let Some(column) = resolver.columns(q, dataset).first() {
            return Classification::new(
                Intent::DataRetrievalList,
                EntityReference {
                    column: Some(column.to_string()),
                    ..Default::default()
                },
            );
        }
    }

    let aggregation = resolver.aggregation(q);

    // 5. scoped to one entity
    if let Some(entity) = entities.into_iter().next() {
        let scoped = aggregation.filter(Aggregation::is_entity_scoped);
        if let (Some(aggregation), Some(column)) = (scoped, resolver.numeric_target(q, dataset)) {
            return Classification::new(
                Intent::DataRetrievalAggregate,
                EntityReference {
                    entities: vec![entity],
                    column: Some(column.to_string()),
                    aggregation: Some(aggregation),
                    unresolved: None,
                },
            );
        }
        if let Some(column) = targets.first() {
            return Classification::new(
                Intent::DataRetrievalScalar,
                EntityReference {
                    entities: vec![entity],
                    column: Some(column.to_string()),
                    ..Default::default()
                },
            );
        }
        // Entity without a column: nothing to retrieve
        return Classification::analysis();
    }

    // 6. dataset-wide aggregate
    if let Some(aggregation) = aggregation {
        let column = if aggregation.needs_numeric() {
            resolver.numeric_target(q, dataset)
        } else {
            resolver.columns(q, dataset).first().copied()
        };
        if let Some(column) = column {
            return Classification::new(
                Intent::DataRetrievalAggregate,
                EntityReference {
                    column: Some(column.to_string()),
                    aggregation: Some(aggregation),
                    ..Default::default()
                },
            );
        }
    } else if let Some(phrase) = resolver.unresolved_mention(q, dataset) {
        // An entity was asked for by name but is not in the identity column
        return Classification::new(
            Intent::DataRetrievalScalar,
            EntityReference {
                column: targets.first().map(|c| c.to_string()),
                unresolved: Some(phrase),
                ..Default::default()
            },
        );
    }

    // 7. everything else
    Classification::analysis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::df;

    fn dataset() -> Dataset {
        let df = df!(
            "name" => ["arun", "neha", "ravi"],
            "age" => [25i64, 30, 41],
            "salary" => [50000.0, 60000.0, 72000.0],
            "department" => ["hr", "it", "it"]
        )
        .unwrap();
        Dataset::from_frame(df).unwrap()
    }

    fn intent(question: &str) -> Intent {
        classify(question, &dataset(), &Resolver::default()).intent
    }

    #[test]
    fn test_scalar_lookup() {
        let c = classify("What is the age of Arun", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalScalar);
        assert_eq!(c.reference.entities, vec!["arun"]);
        assert_eq!(c.reference.column.as_deref(), Some("age"));
    }

    #[test]
    fn test_analysis_keyword_preempts_lookup() {
        assert_eq!(intent("what is the trend in age"), Intent::Analysis);
        assert_eq!(intent("why is the salary of arun high"), Intent::Analysis);
        assert_eq!(intent("what are the average patterns"), Intent::Analysis);
    }

    #[test]
    fn test_multi_entity_needs_column() {
        let c = classify("salary of arun and neha", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalMultiEntity);
        assert_eq!(c.reference.entities, vec!["arun", "neha"]);
        assert_eq!(c.reference.column.as_deref(), Some("salary"));
    }

    #[test]
    fn test_comparison() {
        let c = classify("compare arun and neha", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalComparison);
        assert_eq!(c.reference.entities, vec!["arun", "neha"]);
        assert_eq!(intent("arun vs neha"), Intent::DataRetrievalComparison);
    }

    #[test]
    fn test_compare_with_one_entity_is_analysis() {
        assert_eq!(intent("compare arun with the team"), Intent::Analysis);
    }

    #[test]
    fn test_list() {
        let c = classify("list department", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalList);
        assert_eq!(c.reference.column.as_deref(), Some("department"));
        assert_eq!(intent("show all name values"), Intent::DataRetrievalList);
    }

    #[test]
    fn test_entity_scoped_aggregate() {
        let c = classify("average salary of arun", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalAggregate);
        assert_eq!(c.reference.aggregation, Some(Aggregation::Mean));
        assert_eq!(c.reference.entities, vec!["arun"]);
    }

    #[test]
    fn test_dataset_aggregate() {
        let c = classify("average salary of team", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalAggregate);
        assert!(c.reference.entities.is_empty());
        assert_eq!(c.reference.column.as_deref(), Some("salary"));
        assert_eq!(intent("count department"), Intent::DataRetrievalAggregate);
    }

    #[test]
    fn test_entity_without_column_is_analysis() {
        assert_eq!(intent("tell me about arun"), Intent::Analysis);
    }

    #[test]
    fn test_unresolved_entity() {
        let c = classify("what is the age of jd master", &dataset(), &Resolver::default());
        assert_eq!(c.intent, Intent::DataRetrievalScalar);
        assert_eq!(c.reference.unresolved.as_deref(), Some("jd master"));
    }

    #[test]
    fn test_default_is_analysis() {
        assert_eq!(intent("hello there"), Intent::Analysis);
    }

    #[test]
    fn test_classification_is_pure() {
        let ds = dataset();
        let resolver = Resolver::default();
        let a = classify("salary of neha", &ds, &resolver);
        let b = classify("salary of neha", &ds, &resolver);
        assert_eq!(a, b);
    }
}
