use std::{fmt, str::FromStr};

use log::{debug, warn};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{Dataset, Row},
    error::{EngineError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    NotContains,
    NotEquals,
    IsEmpty,
    IsNotEmpty,
    Regex,
}

impl Operator {
    pub const ALL: [Operator; 9] = [
        Operator::Contains,
        Operator::Equals,
        Operator::StartsWith,
        Operator::EndsWith,
        Operator::NotContains,
        Operator::NotEquals,
        Operator::IsEmpty,
        Operator::IsNotEmpty,
        Operator::Regex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Contains => "contains",
            Operator::Equals => "equals",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::NotContains => "not_contains",
            Operator::NotEquals => "not_equals",
            Operator::IsEmpty => "is_empty",
            Operator::IsNotEmpty => "is_not_empty",
            Operator::Regex => "regex",
        }
    }

    /// `is_empty` and `is_not_empty` ignore the filter value.
    pub fn is_unary(self) -> bool {
        matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_ascii_lowercase();
        let op = match lowered.as_str() {
            "=" | "==" => Operator::Equals,
            "!=" => Operator::NotEquals,
            "~" => Operator::Regex,
            other => Operator::ALL
                .into_iter()
                .find(|op| op.as_str() == other || op.as_str().replace('_', "") == other)
                .ok_or_else(|| EngineError::InvalidFilter(format!("unknown operator '{s}'")))?,
        };
        Ok(op)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

impl Filter {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// A filter without a value only means something for the unary operators.
    pub fn is_active(&self) -> bool {
        !self.column.is_empty() && (self.operator.is_unary() || !self.value.is_empty())
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator.is_unary() {
            write!(f, "{} {}", self.column, self.operator)
        } else {
            write!(f, "{} {} {}", self.column, self.operator, self.value)
        }
    }
}

/// Parses `column operator value` (or `column is_empty`). Keyword operators
/// must be surrounded by whitespace; `!=`, `=` and `~` may touch their operands.
pub fn parse_filter(expression: &str) -> Result<Filter> {
    let trimmed = expression.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidFilter("empty filter expression".to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();
    for op in [Operator::IsNotEmpty, Operator::IsEmpty] {
        let suffix = format!(" {}", op.as_str());
        if lowered.ends_with(&suffix) {
            let column = trimmed[..trimmed.len() - suffix.len()].trim();
            return Ok(Filter::new(unquote(column), op, ""));
        }
    }

    let keywords = Operator::ALL
        .into_iter()
        .filter(|op| !op.is_unary())
        .map(|op| (lowered.find(&format!(" {} ", op.as_str())), op.as_str().len() + 2, op));
    let symbols = [
        ("!=", Operator::NotEquals),
        ("=", Operator::Equals),
        ("~", Operator::Regex),
    ]
    .into_iter()
    .map(|(needle, op)| (trimmed.find(needle), needle.len(), op));
    // The left-most operator splits the expression; values may contain any other.
    let split = keywords
        .chain(symbols)
        .filter_map(|(idx, len, op)| idx.map(|idx| (idx, len, op)))
        .min_by_key(|&(idx, _, _)| idx);
    if let Some((idx, len, op)) = split {
        let column = trimmed[..idx].trim();
        let value = trimmed[idx + len..].trim();
        return Ok(Filter::new(unquote(column), op, unquote(value)));
    }

    Err(EngineError::InvalidFilter(format!(
        "failed to parse filter expression '{trimmed}'"
    )))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

#[derive(Debug)]
enum Predicate {
    Text { operator: Operator, needle: String },
    Unary(Operator),
    Pattern(Regex),
    /// Invalid regex: never matches.
    Never,
}

/// A filter prepared for one evaluation pass: column resolved, value
/// lowercased, regex compiled once.
#[derive(Debug)]
pub struct CompiledFilter {
    column: Option<usize>,
    predicate: Predicate,
}

impl CompiledFilter {
    pub fn matches(&self, row: &Row) -> bool {
        let raw = self.column.map(|idx| row.get(idx)).unwrap_or("");
        let cell = raw.trim().to_lowercase();
        match &self.predicate {
            Predicate::Text { operator, needle } => match operator {
                Operator::Contains => cell.contains(needle.as_str()),
                Operator::Equals => cell == *needle,
                Operator::StartsWith => cell.starts_with(needle.as_str()),
                Operator::EndsWith => cell.ends_with(needle.as_str()),
                Operator::NotContains => !cell.contains(needle.as_str()),
                Operator::NotEquals => cell != *needle,
                _ => true,
            },
            Predicate::Unary(Operator::IsEmpty) => cell.is_empty(),
            Predicate::Unary(_) => !cell.is_empty(),
            Predicate::Pattern(regex) => regex.is_match(&cell),
            Predicate::Never => false,
        }
    }
}

/// Compiles `filters` against `dataset`. Invalid regex patterns are reported
/// through `on_warning` and compile to a never-matching filter.
pub fn compile_filters(
    dataset: &Dataset,
    filters: &[Filter],
    mut on_warning: impl FnMut(String),
) -> Vec<CompiledFilter> {
    filters
        .iter()
        .map(|filter| {
            let predicate = match filter.operator {
                op if op.is_unary() => Predicate::Unary(op),
                Operator::Regex => match RegexBuilder::new(&filter.value)
                    .case_insensitive(true)
                    .build()
                {
                    Ok(regex) => Predicate::Pattern(regex),
                    Err(err) => {
                        warn!("Invalid regex pattern '{}': {err}", filter.value);
                        on_warning(format!(
                            "Invalid regex pattern '{}' on column '{}', no rows match it",
                            filter.value, filter.column
                        ));
                        Predicate::Never
                    }
                },
                operator => Predicate::Text {
                    operator,
                    needle: filter.value.trim().to_lowercase(),
                },
            };
            CompiledFilter {
                column: dataset.column_index(&filter.column),
                predicate,
            }
        })
        .collect()
}

pub fn matches_all(filters: &[CompiledFilter], row: &Row) -> bool {
    filters.iter().all(|filter| filter.matches(row))
}

/// Rows passing every filter, as indices into the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    pub rows: Vec<usize>,
    /// More rows matched than the cap allowed.
    pub truncated: bool,
}

/// Scans `dataset` in order. With `limit = Some(k)` the scan stops once a
/// `k + 1`-th match proves the result is truncated.
pub fn evaluate(dataset: &Dataset, filters: &[CompiledFilter], limit: Option<usize>) -> Selection {
    let mut selection = Selection::default();
    for (idx, row) in dataset.rows().iter().enumerate() {
        if !matches_all(filters, row) {
            continue;
        }
        if let Some(limit) = limit
            && selection.rows.len() >= limit
        {
            selection.truncated = true;
            break;
        }
        selection.rows.push(idx);
    }
    debug!(
        "Filter pass kept {} of {} row(s){}",
        selection.rows.len(),
        dataset.len(),
        if selection.truncated { " (truncated)" } else { "" }
    );
    selection
}
