//! Delimited-text I/O: encodings, delimiters, and CSV reading/writing.
//!
//! All delimited-text traffic flows through this module:
//!
//! - **Encoding**: input is decoded with a primary encoding and, when that
//!   fails, re-decoded with a permissive fallback (windows-1252 by default).
//!   Output may be transcoded and may carry a UTF-8 byte-order mark so
//!   spreadsheet applications keep non-ASCII text intact.
//! - **Delimiters**: a fixed delimiter, extension-based resolution
//!   (`.tsv` → tab, anything else → comma), or sniffing from a sample.
//! - **Quoting**: output uses `QuoteStyle::Necessary`.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::warn;

use crate::{
    data::{Cell, infer_cell},
    error::{PipelineError, PipelineResult},
    table::Table,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const SNIFF_CANDIDATES: &[u8] = b",;\t|";
const SNIFF_SAMPLE_LINES: usize = 10;
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// How the loader picks the field delimiter for delimited text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DelimiterChoice {
    Fixed(u8),
    #[default]
    Extension,
    Sniff,
}

impl DelimiterChoice {
    pub fn from_arg(value: Option<u8>) -> Self {
        match value {
            Some(0) => DelimiterChoice::Sniff,
            Some(delimiter) => DelimiterChoice::Fixed(delimiter),
            None => DelimiterChoice::Extension,
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

/// Picks the candidate delimiter that appears the same non-zero number of
/// times on every sampled line, preferring the one seen most often. Falls
/// back to a comma when nothing is consistent.
pub fn sniff_delimiter(sample: &str) -> u8 {
    let lines: Vec<&str> = sample
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_SAMPLE_LINES)
        .collect();
    if lines.is_empty() {
        return DEFAULT_CSV_DELIMITER;
    }

    let mut best: Option<(u8, usize)> = None;
    for &candidate in SNIFF_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        match best {
            Some((_, seen)) if seen >= first => {}
            _ => best = Some((candidate, first)),
        }
    }
    best.map(|(delimiter, _)| delimiter)
        .unwrap_or(DEFAULT_CSV_DELIMITER)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0usize;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

/// Decodes `bytes` with `primary`, retrying with `fallback` when the primary
/// encoding reports malformed input. A leading BOM is honoured and stripped.
pub fn decode_with_fallback(
    path: &Path,
    bytes: &[u8],
    primary: &'static Encoding,
    fallback: &'static Encoding,
) -> String {
    let (text, _, had_errors) = primary.decode(bytes);
    if !had_errors {
        return text.into_owned();
    }
    warn!(
        "{:?} is not valid {}; retrying as {}",
        path,
        primary.name(),
        fallback.name()
    );
    let (text, _, _) = fallback.decode(bytes);
    text.into_owned()
}

/// Parses already-decoded delimited text. The first record is the header
/// row. Shorter records are padded with blanks; a record wider than the
/// header is a parse error.
pub fn parse_delimited(path: &Path, text: &str, delimiter: u8) -> PipelineResult<Table> {
    if text.trim().is_empty() {
        return Err(PipelineError::parse(path, "No columns to parse from file"));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()
        .map_err(|err| PipelineError::parse(path, err))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let width = headers.len();
    let mut table = Table::new(headers);
    for (row_idx, record) in reader.records().enumerate() {
        let line = row_idx + 2;
        let record =
            record.map_err(|err| PipelineError::parse(path, format!("row {line}: {err}")))?;
        if record.len() > width {
            return Err(PipelineError::parse(
                path,
                format!("row {line}: expected {width} field(s), saw {}", record.len()),
            ));
        }
        table.push_row(record.iter().map(infer_cell).collect());
    }
    Ok(table)
}

/// Output settings for delimited text.
#[derive(Debug, Clone, Copy)]
pub struct CsvOutput {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub byte_order_mark: bool,
}

impl Default for CsvOutput {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_CSV_DELIMITER,
            encoding: UTF_8,
            byte_order_mark: false,
        }
    }
}

impl CsvOutput {
    pub fn with_bom(mut self) -> Self {
        self.byte_order_mark = true;
        self
    }
}

pub fn table_to_csv_bytes(table: &Table, output: &CsvOutput) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(output.delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(Vec::new());
    let to_err = |err: csv::Error| PipelineError::parse("<output>", err);
    writer.write_record(table.headers()).map_err(to_err)?;
    for row in table.rows() {
        writer
            .write_record(row.iter().map(Cell::as_display))
            .map_err(to_err)?;
    }
    let utf8 = writer
        .into_inner()
        .map_err(|err| PipelineError::parse("<output>", err.error()))?;

    if output.encoding == UTF_8 {
        let mut bytes = Vec::with_capacity(utf8.len() + UTF8_BOM.len());
        if output.byte_order_mark {
            bytes.extend_from_slice(UTF8_BOM);
        }
        bytes.extend_from_slice(&utf8);
        return Ok(bytes);
    }

    let text = String::from_utf8(utf8).map_err(|err| PipelineError::parse("<output>", err))?;
    let (encoded, _, had_errors) = output.encoding.encode(&text);
    if had_errors {
        return Err(PipelineError::parse(
            "<output>",
            format!("text cannot be represented in {}", output.encoding.name()),
        ));
    }
    Ok(encoded.into_owned())
}

pub fn write_table_csv(path: &Path, table: &Table, output: &CsvOutput) -> PipelineResult<()> {
    let bytes = table_to_csv_bytes(table, output)?;
    let file = File::create(path).map_err(|err| PipelineError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .map_err(|err| PipelineError::io(path, err))
}

pub fn read_bytes(path: &Path) -> PipelineResult<Vec<u8>> {
    fs::read(path).map_err(|err| PipelineError::io(path, err))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        0 => "auto".to_string(),
        other => (other as char).to_string(),
    }
}
