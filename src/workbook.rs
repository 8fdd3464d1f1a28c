//! Workbook codecs: `calamine` for reading, `rust_xlsxwriter` for writing.

use std::path::Path;

use calamine::{Data, DataType, Range, Reader, open_workbook_auto};
use log::debug;
use rust_xlsxwriter::{Workbook, XlsxError};

use crate::{
    data::Cell,
    error::{PipelineError, PipelineResult},
    table::Table,
};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

pub fn sheet_names(path: &Path) -> PipelineResult<Vec<String>> {
    let workbook = open_workbook_auto(path).map_err(|err| PipelineError::parse(path, err))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Reads one sheet, or the first sheet when `sheet` is `None`.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> PipelineResult<(String, Table)> {
    let mut workbook = open_workbook_auto(path).map_err(|err| PipelineError::parse(path, err))?;
    let names = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(requested) => names
            .iter()
            .find(|n| n.as_str() == requested)
            .cloned()
            .ok_or_else(|| PipelineError::Schema {
                context: format!("Selecting sheet in {path:?}"),
                column: requested.to_string(),
            })?,
        None => names
            .first()
            .cloned()
            .ok_or_else(|| PipelineError::parse(path, "workbook has no sheets"))?,
    };
    let range = workbook
        .worksheet_range(&name)
        .map_err(|err| PipelineError::parse(path, format!("sheet '{name}': {err}")))?;
    Ok((name, range_to_table(&range)))
}

/// Reads every sheet in workbook order.
pub fn read_all_sheets(path: &Path) -> PipelineResult<Vec<(String, Table)>> {
    let mut workbook = open_workbook_auto(path).map_err(|err| PipelineError::parse(path, err))?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| PipelineError::parse(path, format!("sheet '{name}': {err}")))?;
        let table = range_to_table(&range);
        debug!(
            "Loaded sheet '{}' from {:?}: {} row(s)",
            name,
            path,
            table.row_count()
        );
        sheets.push((name, table));
    }
    Ok(sheets)
}

/// The first row with any content is the header row; rows after it are data.
/// Trailing fully blank rows are dropped.
fn range_to_table(range: &Range<Data>) -> Table {
    let mut rows = range.rows();
    let headers: Vec<String> = loop {
        match rows.next() {
            Some(row) if row.iter().all(|c| matches!(c, Data::Empty)) => continue,
            Some(row) => break row.iter().map(|c| convert_cell(c).as_display()).collect(),
            None => return Table::default(),
        }
    };

    let mut data: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();
    while data
        .last()
        .is_some_and(|row| row.iter().all(|c| matches!(c, Cell::Empty)))
    {
        data.pop();
    }
    Table::from_rows(headers, data)
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::text(s.clone()),
        Data::Int(i) => Cell::Integer(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Boolean(*b),
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) if dt.time() == chrono::NaiveTime::MIN => {
                Cell::Text(dt.format("%Y-%m-%d").to_string())
            }
            Some(dt) => Cell::Text(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            None => Cell::Empty,
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::text(s.clone()),
    }
}

/// Integers beyond this magnitude do not survive a round trip through an
/// IEEE double and are written as text.
const MAX_EXACT_INTEGER: i64 = 1 << 53;

/// Serialises `(sheet name, table)` pairs into an in-memory `.xlsx`.
pub fn workbook_bytes(path: &Path, sheets: &[(&str, &Table)]) -> PipelineResult<Vec<u8>> {
    let to_err = |err: XlsxError| PipelineError::workbook(path, err);
    let mut workbook = Workbook::new();
    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(truncate_sheet_name(name)).map_err(to_err)?;
        for (col, header) in table.headers().iter().enumerate() {
            worksheet
                .write_string(0, column_number(path, col)?, header)
                .map_err(to_err)?;
        }
        for (row_idx, row) in table.rows().iter().enumerate() {
            let row_num = row_number(path, row_idx + 1)?;
            for (col, cell) in row.iter().enumerate() {
                let col = column_number(path, col)?;
                match cell {
                    Cell::Empty => {}
                    Cell::Text(s) => {
                        worksheet.write_string(row_num, col, s).map_err(to_err)?;
                    }
                    Cell::Integer(i) if i.unsigned_abs() > MAX_EXACT_INTEGER as u64 => {
                        worksheet
                            .write_string(row_num, col, i.to_string())
                            .map_err(to_err)?;
                    }
                    Cell::Integer(i) => {
                        worksheet.write_number(row_num, col, *i as f64).map_err(to_err)?;
                    }
                    Cell::Float(f) => {
                        worksheet.write_number(row_num, col, *f).map_err(to_err)?;
                    }
                    Cell::Boolean(b) => {
                        worksheet.write_boolean(row_num, col, *b).map_err(to_err)?;
                    }
                }
            }
        }
    }
    workbook.save_to_buffer().map_err(to_err)
}

pub fn write_workbook(path: &Path, sheets: &[(&str, &Table)]) -> PipelineResult<()> {
    let bytes = workbook_bytes(path, sheets)?;
    std::fs::write(path, bytes).map_err(|err| PipelineError::io(path, err))
}

fn column_number(path: &Path, col: usize) -> PipelineResult<u16> {
    u16::try_from(col)
        .map_err(|_| PipelineError::workbook(path, format!("column {col} is past the worksheet limit")))
}

fn row_number(path: &Path, row: usize) -> PipelineResult<u32> {
    u32::try_from(row)
        .map_err(|_| PipelineError::workbook(path, format!("row {row} is past the worksheet limit")))
}

fn truncate_sheet_name(name: &str) -> String {
    name.chars().take(MAX_SHEET_NAME).collect()
}
