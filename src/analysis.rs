use std::collections::HashMap;

use serde::Serialize;

use crate::{
    dataset::Dataset,
    error::{EngineError, Result},
};

pub const DEFAULT_TOP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Share of all dataset rows, 0-100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAnalysis {
    pub column: String,
    pub distinct: usize,
    pub values: Vec<ValueCount>,
}

impl ColumnAnalysis {
    /// `[column, value, count, percent]` rows for table output.
    pub fn render_rows(&self) -> Vec<Vec<String>> {
        self.values
            .iter()
            .map(|entry| {
                vec![
                    self.column.clone(),
                    entry.value.clone(),
                    entry.count.to_string(),
                    format!("{:.1}%", entry.percent),
                ]
            })
            .collect()
    }
}

/// Most frequent non-empty trimmed values of `column`, by count then value.
/// `top = 0` keeps every distinct value.
pub fn top_values(dataset: &Dataset, column: &str, top: usize) -> Result<ColumnAnalysis> {
    let index = dataset
        .column_index(column)
        .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for row in dataset.rows() {
        let value = row.get(index).trim();
        if !value.is_empty() {
            *counts.entry(value).or_insert(0) += 1;
        }
    }

    let distinct = counts.len();
    let mut items: Vec<(&str, usize)> = counts.into_iter().collect();
    items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    if top > 0 {
        items.truncate(top);
    }

    let total = dataset.len().max(1) as f64;
    Ok(ColumnAnalysis {
        column: column.to_string(),
        distinct,
        values: items
            .into_iter()
            .map(|(value, count)| ValueCount {
                value: value.to_string(),
                count,
                percent: count as f64 / total * 100.0,
            })
            .collect(),
    })
}

pub fn analyze_columns(dataset: &Dataset, columns: &[String], top: usize) -> Result<Vec<ColumnAnalysis>> {
    columns
        .iter()
        .map(|column| top_values(dataset, column, top))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    #[test]
    fn counts_trimmed_non_empty_values() {
        let (dataset, _) =
            parse_text("status\nopen\n open \nclosed\n\"\"\npending\nclosed\nopen\n").unwrap();
        let analysis = top_values(&dataset, "status", 2).unwrap();
        assert_eq!(analysis.distinct, 3);
        let values: Vec<_> = analysis
            .values
            .iter()
            .map(|v| (v.value.as_str(), v.count))
            .collect();
        assert_eq!(values, vec![("open", 3), ("closed", 2)]);
        assert_eq!(analysis.render_rows()[0][3], "42.9%");
    }

    #[test]
    fn unknown_column_is_rejected() {
        let (dataset, _) = parse_text("a\n1\n").unwrap();
        assert!(matches!(
            top_values(&dataset, "b", 10),
            Err(EngineError::UnknownColumn(_))
        ));
    }
}
