use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{pivot::EventSource, reasons::UnmappedReason};

#[derive(Debug, Parser)]
#[command(author, version, about = "Spreadsheet jobs for PIM review teams", long_about = None)]
pub struct Cli {
    /// YAML configuration with reason labels, column names and defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Directory that receives every output file
    #[arg(short = 'o', long = "output-dir", global = true, default_value = ".")]
    pub output_dir: PathBuf,
    /// Write manifest.json listing the files this run produced
    #[arg(long, global = true)]
    pub manifest: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Summarise approve/reject decisions per seller, category and reason
    Pivot(PivotArgs),
    /// Merge seller SKU exports and attach seller ids and category paths
    Merge(MergeArgs),
    /// Split a workbook into upload-sized chunk workbooks
    Split(SplitArgs),
    /// Check generic brands against restricted categories and colour fields
    Audit(AuditArgs),
    /// Preview the first rows of a CSV or workbook in a formatted table
    Preview(PreviewArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum PimFormat {
    #[default]
    Xlsx,
    Csv,
}

#[derive(Debug, Args)]
pub struct PivotArgs {
    /// Review export (CSV or workbook)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet to read (defaults to the first)
    #[arg(long)]
    pub sheet: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|', 'auto')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// How approvals and rejections are counted
    #[arg(long, value_enum)]
    pub events: Option<EventSource>,
    /// Rendering of reason codes missing from the dictionary
    #[arg(long = "unmapped-reason", value_enum)]
    pub unmapped_reason: Option<UnmappedReason>,
    /// Two-column code/label file replacing the configured reason labels
    #[arg(long)]
    pub reasons: Option<PathBuf>,
    /// Format of the PIM status file
    #[arg(long = "pim-format", value_enum, default_value_t = PimFormat::Xlsx)]
    pub pim_format: PimFormat,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Seller SKU exports to merge
    #[arg(short = 'i', long = "input", required = true, num_args = 1..)]
    pub inputs: Vec<PathBuf>,
    /// Seller name to id reference
    #[arg(long, default_value = "sellers.xlsx")]
    pub sellers: PathBuf,
    /// Category id to category path reference
    #[arg(long = "category-tree", default_value = "category_tree.xlsx")]
    pub category_tree: PathBuf,
    /// CSV delimiter character (sniffed per file when omitted)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct SplitArgs {
    /// Workbook to split
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Maximum data rows per chunk (defaults to 9998)
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Sheet copied whole into every chunk; repeatable (defaults to RejectionReasons)
    #[arg(long = "aux-sheet", action = clap::ArgAction::Append)]
    pub aux_sheets: Vec<String>,
    /// File name prefix of each chunk (defaults to KE_PIM)
    #[arg(long)]
    pub prefix: Option<String>,
    /// Also bundle the chunks into a zip archive
    #[arg(long)]
    pub zip: bool,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// Listing export to audit
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Category file listing codes where a generic brand is not allowed
    #[arg(long)]
    pub categories: PathBuf,
    /// Worksheet to read (defaults to the first)
    #[arg(long)]
    pub sheet: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|', 'auto')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// File to preview
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Worksheet to read (defaults to the first)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Number of rows to display
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
    /// CSV delimiter character (supports ',', 'tab', ';', '|', 'auto')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

/// Parses a delimiter argument. `auto` maps to `0`, which the loader reads
/// as "sniff from the file".
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        "auto" => Ok(0),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() || first == '\0' {
                return Err("Delimiter must be a printable ASCII character".to_string());
            }
            Ok(first as u8)
        }
    }
}
