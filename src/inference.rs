//! Column type inference over a bounded sample of leading rows.

use std::fmt;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    config::EngineConfig,
    data::{parse_calendar, parse_number},
    dataset::Dataset,
    error::{EngineError, Result},
};

/// Share of sampled values (in percent) that must parse for a typed column.
const TYPE_THRESHOLD_PERCENT: usize = 80;
/// Date literals must be longer than this to count, so short numeric-looking
/// strings are not read as dates.
const MIN_DATE_LEN: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Number,
    Date,
    #[default]
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Text => "text",
        };
        write!(f, "{label}")
    }
}

/// How many leading rows are sampled for a dataset of `rows` rows.
pub fn sample_rows(rows: usize, config: &EngineConfig) -> usize {
    let cap = if rows > config.large_dataset_rows {
        config.large_sample_size
    } else {
        config.sample_size
    };
    rows.min(cap)
}

/// Classifies already-sampled, non-empty values.
pub fn classify<'a, I>(values: I) -> ColumnType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut total = 0usize;
    let mut numeric = 0usize;
    let mut dates = 0usize;
    for value in values {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        total += 1;
        if parse_number(value).is_some() {
            numeric += 1;
        }
        if value.chars().count() > MIN_DATE_LEN && parse_calendar(value).is_some() {
            dates += 1;
        }
    }

    if total == 0 {
        ColumnType::Text
    } else if numeric * 100 >= total * TYPE_THRESHOLD_PERCENT {
        ColumnType::Number
    } else if dates * 100 >= total * TYPE_THRESHOLD_PERCENT {
        ColumnType::Date
    } else {
        ColumnType::Text
    }
}

fn infer_column(dataset: &Dataset, column: &str, sample: usize) -> Result<ColumnType> {
    let index = dataset
        .column_index(column)
        .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))?;
    Ok(classify(
        dataset.rows()[..sample].iter().map(|row| row.get(index)),
    ))
}

/// One type per header, in header order. A column that cannot be inspected
/// falls back to `text` and is reported through `on_warning`.
pub fn infer_column_types(
    dataset: &Dataset,
    config: &EngineConfig,
    mut on_warning: impl FnMut(String),
) -> Vec<ColumnType> {
    if dataset.is_empty() {
        debug!("No data rows, every column defaults to text");
        return vec![ColumnType::Text; dataset.column_count()];
    }
    let sample = sample_rows(dataset.len(), config);
    let types: Vec<ColumnType> = dataset
        .headers()
        .iter()
        .map(|header| {
            infer_column(dataset, header, sample).unwrap_or_else(|err| {
                warn!("Type detection failed for column '{header}': {err}");
                on_warning(format!("Error detecting type for column '{header}': {err}"));
                ColumnType::Text
            })
        })
        .collect();
    info!(
        "Column types: {}",
        dataset
            .headers()
            .iter()
            .zip(&types)
            .take(10)
            .map(|(header, ty)| format!("{header}({ty})"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_requires_eighty_percent() {
        let four_of_five = ["1", "2", "3", "4", "x"];
        assert_eq!(classify(four_of_five), ColumnType::Number);

        let mut values: Vec<String> = (0..79).map(|i| i.to_string()).collect();
        values.extend((0..21).map(|i| format!("name{i}")));
        assert_eq!(classify(values.iter().map(String::as_str)), ColumnType::Text);
    }

    #[test]
    fn classify_dates_need_minimum_length() {
        assert_eq!(
            classify(["2024-01-01", "2024-02-03", "03/04/2024"]),
            ColumnType::Date
        );
        assert_eq!(classify(["", "  "]), ColumnType::Text);
    }

    #[test]
    fn sample_shrinks_for_large_datasets() {
        let config = EngineConfig::default();
        assert_eq!(sample_rows(120, &config), 120);
        assert_eq!(sample_rows(5_000, &config), 500);
        assert_eq!(sample_rows(20_000, &config), 200);
    }
}
