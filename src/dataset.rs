use serde_json::{Map, Value as JsonValue};

/// One retained data row. Fields are aligned with [`Dataset::headers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row(Vec<String>);

impl Row {
    pub(crate) fn new(fields: Vec<String>) -> Self {
        Row(fields)
    }

    pub fn fields(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, column: usize) -> &str {
        self.0.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fully parsed CSV content. Every row has exactly `headers.len()` fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
    skipped: usize,
}

impl Dataset {
    pub(crate) fn from_parts(headers: Vec<String>, rows: Vec<Row>, skipped: usize) -> Self {
        debug_assert!(rows.iter().all(|row| row.len() == headers.len()));
        Self {
            headers,
            rows,
            skipped,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Data lines dropped because their field count never matched the header.
    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    /// Cell lookup by header name; unknown columns read as empty.
    pub fn cell<'a>(&'a self, row: &'a Row, column: &str) -> &'a str {
        self.column_index(column)
            .map(|idx| row.get(idx))
            .unwrap_or("")
    }

    /// Header -> value object for `columns`, in the given order.
    pub fn record(&self, row: &Row, columns: &[usize]) -> Map<String, JsonValue> {
        columns
            .iter()
            .map(|&idx| {
                (
                    self.headers[idx].clone(),
                    JsonValue::String(row.get(idx).to_string()),
                )
            })
            .collect()
    }
}

/// Makes header names unique by suffixing repeats (`id`, `id_2`, `id_3`).
/// Returns the renamed headers alongside the names that had to change.
pub(crate) fn dedupe_headers(headers: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    let mut renamed = Vec::new();
    let mut unique = Vec::with_capacity(headers.len());
    for header in headers {
        if seen.insert(header.clone()) {
            unique.push(header);
            continue;
        }
        let mut suffix = 2;
        let candidate = loop {
            let candidate = format!("{header}_{suffix}");
            if !seen.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        seen.insert(candidate.clone());
        renamed.push(format!("{header} -> {candidate}"));
        unique.push(candidate);
    }
    (unique, renamed)
}
