//! Plain-text rendering of a page of rows for the terminal.

use std::{borrow::Cow, fmt::Write as _};

use itertools::Itertools;

/// Cells wider than this are cut and end in `...`.
pub const DEFAULT_MAX_CELL_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy)]
pub struct TableStyle {
    pub max_cell_width: usize,
    /// Prepend a `#` column holding 1-based row numbers.
    pub row_numbers_from: Option<usize>,
}

impl Default for TableStyle {
    fn default() -> Self {
        Self {
            max_cell_width: DEFAULT_MAX_CELL_WIDTH,
            row_numbers_from: None,
        }
    }
}

pub fn render_table<S: AsRef<str>>(headers: &[S], rows: &[Vec<S>], style: TableStyle) -> String {
    let mut header_cells: Vec<Cow<'_, str>> = headers
        .iter()
        .map(|h| fit_cell(h.as_ref(), style.max_cell_width))
        .collect();
    let mut body: Vec<Vec<Cow<'_, str>>> = rows
        .iter()
        .map(|row| {
            row.iter()
                .take(headers.len())
                .map(|cell| fit_cell(cell.as_ref(), style.max_cell_width))
                .collect()
        })
        .collect();

    if let Some(first) = style.row_numbers_from {
        header_cells.insert(0, Cow::Borrowed("#"));
        for (offset, row) in body.iter_mut().enumerate() {
            row.insert(0, Cow::Owned((first + offset).to_string()));
        }
    }

    let mut widths: Vec<usize> = header_cells.iter().map(|h| char_width(h).max(3)).collect();
    for row in &body {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(char_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_line(&header_cells, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).join("  ");
    let _ = writeln!(output, "{rule}");
    for row in &body {
        let _ = writeln!(output, "{}", format_line(row, &widths));
    }
    output
}

fn format_line(cells: &[Cow<'_, str>], widths: &[usize]) -> String {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .join("  ");
    line.trim_end().to_string()
}

fn char_width(value: &str) -> usize {
    value.chars().count()
}

/// Flattens control whitespace and cuts overly long cells.
fn fit_cell(value: &str, max_width: usize) -> Cow<'_, str> {
    let flattened: Cow<'_, str> = if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    };
    if max_width < 4 || char_width(&flattened) <= max_width {
        return flattened;
    }
    let mut cut: String = flattened.chars().take(max_width - 3).collect();
    cut.push_str("...");
    Cow::Owned(cut)
}
