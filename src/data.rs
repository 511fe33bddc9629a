use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::inference::ColumnType;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%b %d %Y",
    "%b %d, %Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

/// Date or date-time, whichever parses. Dates map to midnight.
pub fn parse_calendar(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    parse_naive_datetime(value).or_else(|| {
        parse_naive_date(value).and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Finite numeric literal; `NaN`, `inf` and friends do not count.
pub fn parse_number(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|number| number.is_finite())
}

/// Sort key for one cell under the column's inferred type.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    Number(f64),
    /// Unparsable dates carry `None` and sort before every valid date.
    Date(Option<NaiveDateTime>),
    Text(String),
}

impl SortKey {
    pub fn for_cell(value: &str, column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Number => SortKey::Number(parse_number(value).unwrap_or(0.0)),
            ColumnType::Date => SortKey::Date(parse_calendar(value)),
            ColumnType::Text => SortKey::Text(value.to_lowercase()),
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Number(a), SortKey::Number(b)) => a.total_cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            // Keys of one sort pass share a column type.
            _ => Ordering::Equal,
        }
    }
}
