//! Finding the columns, entities and aggregation verbs a question refers to.

use regex::Regex;
use std::collections::HashSet;

use crate::cli::MatchMode;
use crate::dataset::{Dataset, SemanticType};

/// Aggregation named by a verb in the question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Mean,
    Max,
    Min,
    Sum,
    Count,
}

impl Aggregation {
    /// Whether the aggregation may be scoped to a single entity's rows
    pub fn is_entity_scoped(&self) -> bool {
        matches!(self, Aggregation::Mean | Aggregation::Max | Aggregation::Min)
    }

    /// Whether the aggregation needs a numeric column
    pub fn needs_numeric(&self) -> bool {
        !matches!(self, Aggregation::Count)
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Aggregation::Mean => write!(f, "average"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Sum => write!(f, "sum"),
            Aggregation::Count => write!(f, "count"),
        }
    }
}

// Checked in this order; the first verb present decides the aggregation.
const AGGREGATION_VERBS: &[(&str, Aggregation)] = &[
    ("average", Aggregation::Mean),
    ("mean", Aggregation::Mean),
    ("maximum", Aggregation::Max),
    ("highest", Aggregation::Max),
    ("max", Aggregation::Max),
    ("minimum", Aggregation::Min),
    ("lowest", Aggregation::Min),
    ("min", Aggregation::Min),
    ("sum", Aggregation::Sum),
    ("total", Aggregation::Sum),
    ("count", Aggregation::Count),
];

/// Lower-case and trim a question for matching
pub fn normalize_question(question: &str) -> String {
    question.trim().to_lowercase()
}

/// Whether `word` appears in `text` as a whole word
pub fn has_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric())
        .any(|token| token == word)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether `needle` occurs in `text` with no word character on either side.
/// Works for multi-word needles such as "jd master".
pub fn contains_word(text: &str, needle: &str) -> bool {
    text.match_indices(needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

fn mask_verbs(question: &str) -> String {
    question
        .split(' ')
        .map(|token| {
            let bare = token.trim_matches(|c: char| !c.is_alphanumeric());
            if AGGREGATION_VERBS.iter().any(|(verb, _)| *verb == bare) {
                " ".repeat(token.len())
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves column names and identity-column entities mentioned in a question
#[derive(Debug, Clone)]
pub struct Resolver {
    identity_column: String,
    mode: MatchMode,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new("name", MatchMode::Substring)
    }
}

impl Resolver {
    pub fn new(identity_column: impl Into<String>, mode: MatchMode) -> Self {
        Self {
            identity_column: identity_column.into().trim().to_lowercase(),
            mode,
        }
    }

    /// Whether `needle` occurs in the (already normalized) question under the match mode.
    /// An empty needle never matches.
    pub fn mentions(&self, question: &str, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::Substring => question.contains(needle),
            MatchMode::Word => contains_word(question, needle),
        }
    }

    /// Whether the dataset has the identity column
    pub fn has_identity(&self, dataset: &Dataset) -> bool {
        dataset.has_column(&self.identity_column)
    }

    /// Every column mentioned in the question, in declaration order.
    /// Aggregation verbs are blanked out first so "age" is not found inside "average".
    pub fn columns<'a>(&self, question: &str, dataset: &'a Dataset) -> Vec<&'a str> {
        let text = mask_verbs(question);
        dataset
            .columns()
            .map(|(name, _)| name)
            .filter(|name| self.mentions(&text, name))
            .collect()
    }

    /// Mentioned columns other than the identity column, in declaration order
    pub fn target_columns<'a>(&self, question: &str, dataset: &'a Dataset) -> Vec<&'a str> {
        self.columns(question, dataset)
            .into_iter()
            .filter(|name| *name != self.identity_column)
            .collect()
    }

    /// First mentioned numeric column other than the identity column
    pub fn numeric_target<'a>(&self, question: &str, dataset: &'a Dataset) -> Option<&'a str> {
        self.target_columns(question, dataset)
            .into_iter()
            .find(|name| dataset.semantic_type(name) == Some(SemanticType::Numeric))
    }

    /// Every identity-column value found in the question, in row order, without duplicates.
    /// Always empty when the dataset has no identity column.
    pub fn entities(&self, question: &str, dataset: &Dataset) -> Vec<String> {
        let mut seen = HashSet::new();
        dataset
            .distinct_values(&self.identity_column)
            .into_iter()
            .filter(|value| self.mentions(question, value))
            .filter(|value| seen.insert(value.clone()))
            .collect()
    }

    /// The aggregation named by the first verb present in the question as a whole word,
    /// so "min" inside "jasmine" does not count
    pub fn aggregation(&self, question: &str) -> Option<Aggregation> {
        AGGREGATION_VERBS
            .iter()
            .find(|(verb, _)| has_word(question, verb))
            .map(|(_, aggregation)| *aggregation)
    }

    /// The phrase naming an entity in a `<column> of|for <phrase>` question when that
    /// phrase is not a known entity, e.g. "jd master" in "what is the age of jd master".
    pub fn unresolved_mention(&self, question: &str, dataset: &Dataset) -> Option<String> {
        if !self.has_identity(dataset) {
            return None;
        }
        for column in self.target_columns(question, dataset) {
            let pattern = format!(r"{}\s+(?:of|for)\s+(.+)$", regex::escape(column));
            let Ok(re) = Regex::new(&pattern) else {
                continue;
            };
            if let Some(caps) = re.captures(question) {
                let phrase = caps[1]
                    .trim_matches(|c: char| !c.is_alphanumeric())
                    .trim_start_matches("the ")
                    .trim()
                    .to_string();
                if !phrase.is_empty() {
                    return Some(phrase);
                }
            }
        }
        None
    }
}
