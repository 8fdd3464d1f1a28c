//! In-memory tabular model shared by every pipeline stage.
//!
//! A [`Table`] is an ordered list of column names plus positionally aligned
//! rows of [`Cell`]s. Tables are plain values: stages take `&Table` and hand
//! back a new one, so no two stages ever share a mutable table.

use crate::{
    data::Cell,
    error::{PipelineError, PipelineResult},
};

static EMPTY_CELL: Cell = Cell::Empty;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table, padding short rows with blanks and truncating long ones.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn with_headers<S: AsRef<str>>(headers: &[S]) -> Self {
        Self::new(headers.iter().map(|h| h.as_ref().to_string()).collect())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<Cell>>) {
        (self.headers, self.rows)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn require_column(&self, name: &str, context: &str) -> PipelineResult<usize> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::schema(context, name))
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY_CELL)
    }

    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Cell> {
        self.rows
            .iter()
            .map(move |row| row.get(column).unwrap_or(&EMPTY_CELL))
    }

    /// Returns the named columns in the requested order, with blank cells for
    /// names this table does not carry.
    pub fn project<S: AsRef<str>>(&self, columns: &[S]) -> Table {
        let indices: Vec<Option<usize>> = columns
            .iter()
            .map(|name| self.column_index(name.as_ref()))
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|idx| idx.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                    .collect()
            })
            .collect();
        Table {
            headers: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            rows,
        }
    }

    /// Like [`Table::project`] but every requested column must exist.
    pub fn select<S: AsRef<str>>(&self, columns: &[S], context: &str) -> PipelineResult<Table> {
        for name in columns {
            self.require_column(name.as_ref(), context)?;
        }
        Ok(self.project(columns))
    }

    /// Sets `name` to `values`, replacing an existing column in place or
    /// appending a new one at the end.
    pub fn with_column(&self, name: &str, values: Vec<Cell>) -> Table {
        let mut next = self.clone();
        match next.column_index(name) {
            Some(idx) => {
                for (row, value) in next.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                next.headers.push(name.to_string());
                let mut values = values.into_iter();
                for row in next.rows.iter_mut() {
                    row.push(values.next().unwrap_or_default());
                }
            }
        }
        next
    }

    pub fn slice(&self, start: usize, end: usize) -> Table {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        Table {
            headers: self.headers.clone(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Display strings of every row, in header order.
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(Cell::as_display).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            vec!["id".into(), "name".into()],
            vec![
                vec![Cell::Integer(1), Cell::text("Alice")],
                vec![Cell::Integer(2)],
            ],
        )
    }

    #[test]
    fn from_rows_pads_short_rows() {
        let table = sample();
        assert_eq!(table.rows()[1], vec![Cell::Integer(2), Cell::Empty]);
    }

    #[test]
    fn project_fills_absent_columns_with_blanks() {
        let projected = sample().project(&["name", "missing"]);
        assert_eq!(projected.headers(), ["name", "missing"]);
        assert_eq!(projected.rows()[0], vec![Cell::text("Alice"), Cell::Empty]);
    }

    #[test]
    fn select_rejects_absent_columns() {
        let err = sample().select(&["id", "sku"], "selecting").unwrap_err();
        assert!(err.to_string().contains("'sku'"));
    }

    #[test]
    fn with_column_replaces_in_place() {
        let table = sample().with_column("name", vec![Cell::text("A"), Cell::text("B")]);
        assert_eq!(table.headers(), ["id", "name"]);
        assert_eq!(table.cell(1, 1), &Cell::text("B"));
    }

    #[test]
    fn slice_clamps_to_bounds() {
        let table = sample();
        assert_eq!(table.slice(1, 10).row_count(), 1);
        assert_eq!(table.slice(5, 10).row_count(), 0);
    }
}
