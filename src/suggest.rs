//! Heuristic filter suggestions derived from the leading rows of a dataset.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use crate::{
    data::parse_number,
    dataset::Dataset,
    filter::{Filter, Operator},
    inference::ColumnType,
};

/// Datasets larger than this get no suggestions.
pub const MAX_ROWS: usize = 50_000;
const SAMPLE_ROWS: usize = 1000;
const AFFIX_VALUES: usize = 500;
const AFFIX_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub filter: Filter,
    pub reason: String,
    /// Share of sampled values supporting the suggestion, 0-100.
    pub confidence: f64,
}

pub fn suggest_filters(dataset: &Dataset, column_types: &[ColumnType]) -> Vec<Suggestion> {
    if dataset.is_empty() {
        debug!("No data rows, no suggestions");
        return Vec::new();
    }
    if dataset.len() > MAX_ROWS {
        info!("Skipping filter suggestions for a dataset above {MAX_ROWS} rows");
        return Vec::new();
    }

    let sample = &dataset.rows()[..dataset.len().min(SAMPLE_ROWS)];
    let mut suggestions = Vec::new();
    for (idx, header) in dataset.headers().iter().enumerate() {
        let values: Vec<&str> = sample
            .iter()
            .map(|row| row.get(idx).trim())
            .filter(|value| !value.is_empty())
            .collect();
        match column_types.get(idx).copied().unwrap_or_default() {
            ColumnType::Text => affix_suggestions(header, &values, &mut suggestions),
            ColumnType::Number => above_mean_suggestion(header, &values, &mut suggestions),
            ColumnType::Date => {}
        }

        let empty = sample.len() - values.len();
        if empty * 100 > sample.len() * 5 {
            suggestions.push(Suggestion {
                filter: Filter::new(header.clone(), Operator::IsEmpty, ""),
                reason: format!("{empty} empty values detected (sampled)"),
                confidence: percent(empty, sample.len()),
            });
        }
    }

    suggestions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    debug!("Generated {} filter suggestion(s)", suggestions.len());
    suggestions
}

fn affix_suggestions(header: &str, values: &[&str], out: &mut Vec<Suggestion>) {
    let mut prefixes: BTreeMap<String, usize> = BTreeMap::new();
    let mut suffixes: BTreeMap<String, usize> = BTreeMap::new();
    for value in values.iter().take(AFFIX_VALUES) {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= AFFIX_LEN {
            continue;
        }
        let prefix: String = chars[..AFFIX_LEN].iter().collect();
        let suffix: String = chars[chars.len() - AFFIX_LEN..].iter().collect();
        *prefixes.entry(prefix).or_insert(0) += 1;
        *suffixes.entry(suffix).or_insert(0) += 1;
    }

    // More than 10% of sampled values, and never fewer than three.
    let threshold = (values.len() as f64 * 0.1).max(2.0);
    for (operator, counts, verb) in [
        (Operator::StartsWith, prefixes, "start"),
        (Operator::EndsWith, suffixes, "end"),
    ] {
        for (affix, count) in counts {
            if count as f64 > threshold {
                out.push(Suggestion {
                    reason: format!("{count} values {verb} with \"{affix}\""),
                    filter: Filter::new(header, operator, affix),
                    confidence: percent(count, values.len()),
                });
            }
        }
    }
}

fn above_mean_suggestion(header: &str, values: &[&str], out: &mut Vec<Suggestion>) {
    let numbers: Vec<f64> = values.iter().filter_map(|v| parse_number(v)).collect();
    if numbers.is_empty() {
        return;
    }
    let mean = numbers.iter().sum::<f64>() / numbers.len() as f64;
    let above = numbers.iter().filter(|&&n| n > mean).count();
    if above * 10 > numbers.len() * 3 {
        out.push(Suggestion {
            filter: Filter::new(header, Operator::Regex, format!("^[{}-9]", mean.floor())),
            reason: format!("{above} values above average ({mean:.2})"),
            confidence: percent(above, numbers.len()),
        });
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64 * 1000.0).round() / 10.0
    }
}
