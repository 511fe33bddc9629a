//! The current result set: row indices into the dataset, ordered and narrowed
//! by sort and search without re-running the filters.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    data::SortKey,
    dataset::Dataset,
    filter::{Filter, Selection},
    inference::ColumnType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => f.write_str("asc"),
            SortDirection::Desc => f.write_str("desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(anyhow!("Unknown sort direction '{other}'")),
        }
    }
}

/// `column[:asc|desc]` as accepted on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortDirective {
    pub column: String,
    pub direction: SortDirection,
}

impl SortDirective {
    pub fn parse(raw: &str) -> Result<Self> {
        let (column, direction) = match raw.rsplit_once(':') {
            Some((column, direction)) => (column, direction.parse()?),
            None => (raw, SortDirection::Asc),
        };
        let column = column.trim();
        if column.is_empty() {
            return Err(anyhow!("Sort directive is missing a column"));
        }
        Ok(SortDirective {
            column: column.to_string(),
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilteredView {
    /// Result of the last filter pass, in current sort order.
    base: Vec<usize>,
    rows: Vec<usize>,
    truncated: bool,
    sort: Option<(usize, SortDirection)>,
    search: Option<String>,
    /// Filters that produced `base`.
    filters: Vec<Filter>,
}

impl FilteredView {
    pub fn from_selection(selection: Selection) -> Self {
        Self {
            base: selection.rows.clone(),
            rows: selection.rows,
            truncated: selection.truncated,
            sort: None,
            search: None,
            filters: Vec::new(),
        }
    }

    /// Records the filter list this view was evaluated from.
    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn truncated(&self) -> bool {
        self.truncated
    }

    pub fn sort_state(&self) -> Option<(usize, SortDirection)> {
        self.sort
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Direction a click on `column` should use: the opposite of the current
    /// direction when the view is already sorted by it, ascending otherwise.
    pub fn next_direction(&self, column: usize) -> SortDirection {
        match self.sort {
            Some((current, direction)) if current == column => direction.toggled(),
            _ => SortDirection::Asc,
        }
    }

    /// Stable sort of the view (and of the base it returns to when a search
    /// is cleared) by one column.
    pub fn sort_by(
        &mut self,
        dataset: &Dataset,
        column: usize,
        column_type: ColumnType,
        direction: SortDirection,
    ) {
        sort_indices(&mut self.rows, dataset, column, column_type, direction);
        sort_indices(&mut self.base, dataset, column, column_type, direction);
        self.sort = Some((column, direction));
        debug!(
            "Sorted {} row(s) by column #{column} ({column_type}, {direction})",
            self.rows.len()
        );
    }

    /// Keeps rows where any of `columns` contains `term`, case-insensitively.
    /// The term is matched as given, whitespace included. Successive searches
    /// narrow further; only an empty term restores the base.
    pub fn search_within(&mut self, dataset: &Dataset, columns: &[usize], term: &str) {
        if term.is_empty() {
            self.rows = self.base.clone();
            self.search = None;
            return;
        }
        let needle = term.to_lowercase();
        self.rows.retain(|&idx| {
            dataset.row(idx).is_some_and(|row| {
                columns
                    .iter()
                    .any(|&column| row.get(column).to_lowercase().contains(&needle))
            })
        });
        self.search = Some(needle);
    }
}

fn sort_indices(
    indices: &mut Vec<usize>,
    dataset: &Dataset,
    column: usize,
    column_type: ColumnType,
    direction: SortDirection,
) {
    let mut keyed: Vec<(SortKey, usize)> = indices
        .iter()
        .map(|&idx| {
            let cell = dataset.row(idx).map(|row| row.get(column)).unwrap_or("");
            (SortKey::for_cell(cell, column_type), idx)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match direction {
        SortDirection::Asc => a.compare(b),
        SortDirection::Desc => b.compare(a),
    });
    *indices = keyed.into_iter().map(|(_, idx)| idx).collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_text;

    fn sample() -> Dataset {
        parse_text("name,age\nbob,10\nAlice,9\ncarol,10\ndave,x\n")
            .unwrap()
            .0
    }

    fn full_view(dataset: &Dataset) -> FilteredView {
        FilteredView::from_selection(Selection {
            rows: (0..dataset.len()).collect(),
            truncated: false,
        })
    }

    #[test]
    fn numeric_sort_is_stable_and_treats_garbage_as_zero() {
        let dataset = sample();
        let mut view = full_view(&dataset);
        view.sort_by(&dataset, 1, ColumnType::Number, SortDirection::Asc);
        assert_eq!(view.rows(), &[3, 1, 0, 2]);
        view.sort_by(&dataset, 1, ColumnType::Number, SortDirection::Desc);
        assert_eq!(view.rows(), &[0, 2, 1, 3]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let dataset = sample();
        let mut view = full_view(&dataset);
        view.sort_by(&dataset, 0, ColumnType::Text, SortDirection::Asc);
        assert_eq!(view.rows(), &[1, 0, 2, 3]);
        assert_eq!(view.next_direction(0), SortDirection::Desc);
        assert_eq!(view.next_direction(1), SortDirection::Asc);
    }

    #[test]
    fn search_narrows_and_empty_term_restores() {
        let dataset = sample();
        let mut view = full_view(&dataset);
        view.search_within(&dataset, &[0, 1], "A");
        assert_eq!(view.rows(), &[1, 2, 3]);
        view.search_within(&dataset, &[0, 1], "10");
        assert_eq!(view.rows(), &[2]);
        view.search_within(&dataset, &[0, 1], "");
        assert_eq!(view.len(), 4);
        assert_eq!(view.search_term(), None);
    }

    #[test]
    fn search_keeps_whitespace_in_term() {
        let dataset = parse_text("name\nAnn Lee\nBob\nLeeds\n").unwrap().0;
        let mut view = full_view(&dataset);
        view.search_within(&dataset, &[0], " ");
        assert_eq!(view.rows(), &[0]);
        assert_eq!(view.search_term(), Some(" "));

        let mut view = full_view(&dataset);
        view.search_within(&dataset, &[0], " lee");
        assert_eq!(view.rows(), &[0]);
    }

    #[test]
    fn sort_directive_parses_direction() {
        assert_eq!(
            SortDirective::parse("created at:desc").unwrap(),
            SortDirective {
                column: "created at".to_string(),
                direction: SortDirection::Desc,
            }
        );
        assert_eq!(
            SortDirective::parse("name").unwrap().direction,
            SortDirection::Asc
        );
        assert!(SortDirective::parse(":asc").is_err());
        assert!(SortDirective::parse("name:sideways").is_err());
    }
}
