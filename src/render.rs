//! Plain-text table rendering for terminal previews.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{data::Cell, table::Table};

/// Cells wider than this are cut and marked with an ellipsis.
const MAX_CELL_WIDTH: usize = 40;
const GAP: &str = "  ";

/// Renders the first `limit` rows of `table`. Numbers are right-aligned,
/// everything else left-aligned.
pub fn render_table(table: &Table, limit: usize) -> String {
    let shown = &table.rows()[..limit.min(table.row_count())];
    let cells: Vec<Vec<(String, bool)>> = shown
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| (clip(&sanitize_cell(&cell.as_display())), is_numeric(cell)))
                .collect()
        })
        .collect();
    let headers: Vec<String> = table.headers().iter().map(|h| clip(h)).collect();

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in &cells {
        for (idx, (text, _)) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(text.chars().count());
        }
    }

    let mut output = String::new();
    let header_cells: Vec<(String, bool)> = headers.into_iter().map(|h| (h, false)).collect();
    let _ = writeln!(output, "{}", format_row(&header_cells, &widths));
    let separator: Vec<(String, bool)> = widths.iter().map(|w| ("-".repeat(*w), false)).collect();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in &cells {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    if table.row_count() > shown.len() {
        let _ = writeln!(
            output,
            "... {} more row(s)",
            table.row_count() - shown.len()
        );
    }
    output
}

pub fn print_table(table: &Table, limit: usize) {
    print!("{}", render_table(table, limit));
}

fn is_numeric(cell: &Cell) -> bool {
    matches!(cell, Cell::Integer(_) | Cell::Float(_))
}

fn format_row(values: &[(String, bool)], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|((text, right), width)| {
            if *right {
                format!("{text:>width$}")
            } else {
                format!("{text:<width$}")
            }
        })
        .collect::<Vec<_>>()
        .join(GAP);
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn clip(value: &str) -> String {
    if value.chars().count() <= MAX_CELL_WIDTH {
        return value.to_string();
    }
    let mut clipped: String = value.chars().take(MAX_CELL_WIDTH - 1).collect();
    clipped.push('…');
    clipped
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
