//! Input loader: turns a file on disk into a [`Table`].
//!
//! The format is chosen from the file extension. Delimited text goes through
//! [`io_utils`] (encoding fallback, delimiter choice); workbooks go through
//! [`workbook`].

use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use log::debug;

use crate::{
    error::{PipelineError, PipelineResult},
    io_utils::{self, DelimiterChoice},
    table::Table,
    workbook,
};

const TEXT_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited,
    Workbook,
}

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub delimiter: DelimiterChoice,
    pub encoding: &'static Encoding,
    pub fallback_encoding: &'static Encoding,
    pub sheet: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: DelimiterChoice::Extension,
            encoding: UTF_8,
            fallback_encoding: WINDOWS_1252,
            sheet: None,
        }
    }
}

impl LoadOptions {
    pub fn with_sheet(mut self, sheet: Option<String>) -> Self {
        self.sheet = sheet;
        self
    }

    pub fn with_delimiter(mut self, delimiter: DelimiterChoice) -> Self {
        self.delimiter = delimiter;
        self
    }
}

pub fn detect_format(path: &Path) -> PipelineResult<FileFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if TEXT_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileFormat::Delimited)
    } else if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        Ok(FileFormat::Workbook)
    } else {
        Err(PipelineError::Format {
            path: path.to_path_buf(),
            extension,
        })
    }
}

pub fn load_table(path: &Path, options: &LoadOptions) -> PipelineResult<Table> {
    match detect_format(path)? {
        FileFormat::Delimited => load_delimited(path, options),
        FileFormat::Workbook => {
            let (sheet, table) = workbook::read_sheet(path, options.sheet.as_deref())?;
            debug!(
                "Loaded sheet '{}' from {:?}: {} column(s), {} row(s)",
                sheet,
                path,
                table.column_count(),
                table.row_count()
            );
            Ok(table)
        }
    }
}

/// Every sheet of a workbook, in order. Delimited files yield a single sheet
/// named after the file stem.
pub fn load_workbook(path: &Path, options: &LoadOptions) -> PipelineResult<Vec<(String, Table)>> {
    match detect_format(path)? {
        FileFormat::Workbook => workbook::read_all_sheets(path),
        FileFormat::Delimited => {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Sheet1")
                .to_string();
            Ok(vec![(name, load_delimited(path, options)?)])
        }
    }
}

fn load_delimited(path: &Path, options: &LoadOptions) -> PipelineResult<Table> {
    let bytes = io_utils::read_bytes(path)?;
    let text =
        io_utils::decode_with_fallback(path, &bytes, options.encoding, options.fallback_encoding);
    let delimiter = match options.delimiter {
        DelimiterChoice::Fixed(delimiter) => delimiter,
        DelimiterChoice::Extension => io_utils::resolve_input_delimiter(path, None),
        DelimiterChoice::Sniff => io_utils::sniff_delimiter(&text),
    };
    debug!(
        "Reading {:?} with delimiter '{}'",
        path,
        io_utils::printable_delimiter(delimiter)
    );
    io_utils::parse_delimited(path, &text, delimiter)
}
