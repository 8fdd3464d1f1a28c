//! Reshape engine: approve/reject records → seller × category × reason
//! summary.
//!
//! The transformation runs in explicit stages so each one can be inspected
//! on its own:
//!
//! 1. [`aggregate`] groups rows by (seller, category, reason) and counts
//!    approved and rejected events per group, zero-filled.
//! 2. [`melt`] turns the two counts into long rows, one per event type.
//! 3. [`drop_zeros`] keeps only combinations that actually occurred.
//! 4. [`widen`] folds the event type back into columns; a count that was
//!    never observed stays `None` (rendered blank), never zero.
//! 5. [`reshape`] sorts by reason (blank first, case-insensitive), maps
//!    reason codes to labels, and decorates the rows with the run's week
//!    number, date and annotation columns.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    cli::{PimFormat, PivotArgs},
    data::{Cell, CellKey},
    error::PipelineResult,
    io_utils::{self, CsvOutput},
    loader,
    naming::{Disambiguator, OutputName},
    pim,
    reasons::{ReasonBook, compare_reasons},
    session::{RunStamp, Session},
    table::Table,
    workbook,
};

pub const WEEK_NUMBER: &str = "Week_Number";
pub const FORMATTED_DATE: &str = "Formatted_Date";
pub const BLANK_COLUMN: &str = "Blank_Column";

/// Where approve/reject events come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    /// Marker columns when both exist, otherwise the reason column.
    #[default]
    Auto,
    /// Blank reason is an approval, anything else a rejection.
    Reason,
    /// Count non-blank cells of the approved/rejected marker columns.
    Markers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Event {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotColumns {
    pub seller: String,
    pub category: String,
    pub reason: String,
    pub approved: String,
    pub rejected: String,
}

impl Default for PivotColumns {
    fn default() -> Self {
        Self {
            seller: "SELLER_NAME".to_string(),
            category: "CATEGORY".to_string(),
            reason: "reason".to_string(),
            approved: "app".to_string(),
            rejected: "rej".to_string(),
        }
    }
}

/// A constant-valued column placed after the blank column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub name: String,
    pub value: String,
}

impl Annotation {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

pub fn default_annotations() -> Vec<Annotation> {
    vec![
        Annotation::new("new_col_1", "KE"),
        Annotation::new("new_col_2", "Charles"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotOptions {
    pub columns: PivotColumns,
    pub events: EventSource,
    pub annotations: Vec<Annotation>,
}

impl Default for PivotOptions {
    fn default() -> Self {
        Self {
            columns: PivotColumns::default(),
            events: EventSource::Auto,
            annotations: default_annotations(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub seller: CellKey,
    pub category: CellKey,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCounts {
    pub key: GroupKey,
    pub approved: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongRow {
    pub key: GroupKey,
    pub event: Event,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WideRow {
    pub key: GroupKey,
    pub approved: Option<usize>,
    pub rejected: Option<usize>,
}

fn reason_text(cell: &Cell) -> String {
    if cell.is_blank() {
        String::new()
    } else {
        cell.as_display()
    }
}

/// Groups rows by (seller, category, reason) in ascending key order.
pub fn aggregate(table: &Table, options: &PivotOptions) -> PipelineResult<Vec<GroupCounts>> {
    let context = "Building pivot";
    let columns = &options.columns;
    let seller_idx = table.require_column(&columns.seller, context)?;
    let category_idx = table.require_column(&columns.category, context)?;
    let reason_idx = table.require_column(&columns.reason, context)?;

    let use_markers = match options.events {
        EventSource::Markers => true,
        EventSource::Reason => false,
        EventSource::Auto => {
            table.has_column(&columns.approved) && table.has_column(&columns.rejected)
        }
    };
    let markers = if use_markers {
        Some((
            table.require_column(&columns.approved, context)?,
            table.require_column(&columns.rejected, context)?,
        ))
    } else {
        None
    };
    debug!(
        "Counting events from {}",
        if use_markers { "marker columns" } else { "reason column" }
    );

    let mut groups: BTreeMap<GroupKey, (usize, usize)> = BTreeMap::new();
    for row in table.rows() {
        let key = GroupKey {
            seller: CellKey(row[seller_idx].clone()),
            category: CellKey(row[category_idx].clone()),
            reason: reason_text(&row[reason_idx]),
        };
        let counts = groups.entry(key).or_insert((0, 0));
        match markers {
            Some((approved_idx, rejected_idx)) => {
                if !row[approved_idx].is_blank() {
                    counts.0 += 1;
                }
                if !row[rejected_idx].is_blank() {
                    counts.1 += 1;
                }
            }
            None => {
                if row[reason_idx].is_blank() {
                    counts.0 += 1;
                } else {
                    counts.1 += 1;
                }
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|(key, (approved, rejected))| GroupCounts {
            key,
            approved,
            rejected,
        })
        .collect())
}

pub fn melt(groups: &[GroupCounts]) -> Vec<LongRow> {
    groups
        .iter()
        .flat_map(|group| {
            [
                LongRow {
                    key: group.key.clone(),
                    event: Event::Approved,
                    count: group.approved,
                },
                LongRow {
                    key: group.key.clone(),
                    event: Event::Rejected,
                    count: group.rejected,
                },
            ]
        })
        .collect()
}

pub fn drop_zeros(rows: Vec<LongRow>) -> Vec<LongRow> {
    rows.into_iter().filter(|row| row.count != 0).collect()
}

pub fn widen(rows: &[LongRow]) -> Vec<WideRow> {
    let mut wide: BTreeMap<GroupKey, (Option<usize>, Option<usize>)> = BTreeMap::new();
    for row in rows {
        let slot = wide.entry(row.key.clone()).or_default();
        match row.event {
            Event::Approved => slot.0 = Some(row.count),
            Event::Rejected => slot.1 = Some(row.count),
        }
    }
    wide.into_iter()
        .map(|(key, (approved, rejected))| WideRow {
            key,
            approved,
            rejected,
        })
        .collect()
}

pub fn output_headers(options: &PivotOptions) -> Vec<String> {
    let columns = &options.columns;
    let mut headers = vec![
        WEEK_NUMBER.to_string(),
        FORMATTED_DATE.to_string(),
        columns.seller.clone(),
        columns.category.clone(),
        columns.approved.clone(),
        columns.rejected.clone(),
        BLANK_COLUMN.to_string(),
    ];
    headers.extend(options.annotations.iter().map(|a| a.name.clone()));
    headers.push(columns.reason.clone());
    headers
}

/// Runs the whole reshape and returns the decorated wide table.
pub fn reshape(
    table: &Table,
    options: &PivotOptions,
    reasons: &ReasonBook,
    stamp: &RunStamp,
) -> PipelineResult<Table> {
    let groups = aggregate(table, options)?;
    let long = drop_zeros(melt(&groups));
    let mut wide = widen(&long);
    wide.sort_by(|a, b| compare_reasons(&a.key.reason, &b.key.reason));

    let week = Cell::Integer(i64::from(stamp.iso_week()));
    let date = Cell::text(stamp.formatted_date());
    let count_cell = |count: Option<usize>| count.map(Cell::from).unwrap_or_default();

    let mut out = Table::new(output_headers(options));
    for row in wide {
        let mut cells = vec![
            week.clone(),
            date.clone(),
            row.key.seller.0,
            row.key.category.0,
            count_cell(row.approved),
            count_cell(row.rejected),
            Cell::Empty,
        ];
        cells.extend(options.annotations.iter().map(|a| Cell::text(a.value.clone())));
        cells.push(reasons.label_cell(&Cell::text(row.key.reason)));
        out.push_row(cells);
    }
    Ok(out)
}

/// `pivot` command: writes the pivot CSV and the PIM artifact into a
/// run-stamped folder under the output directory.
pub fn execute(args: &PivotArgs, session: &mut Session) -> Result<()> {
    let options = session.load_options(args.sheet.clone(), args.delimiter, args.input_encoding.as_deref())?;
    info!("Pivoting {:?}", args.input);
    let input = loader::load_table(&args.input, &options)
        .with_context(|| format!("Loading {:?}", args.input))?;

    let config = session.config();
    let mut pivot_options = config.pivot_options();
    if let Some(events) = args.events {
        pivot_options.events = events;
    }
    let unmapped = args.unmapped_reason.unwrap_or(config.unmapped_reason);
    let reasons = session.reason_book(args.reasons.as_deref(), unmapped)?;
    let stamp = session.stamp().clone();

    let summary = reshape(&input, &pivot_options, &reasons, &stamp)
        .with_context(|| format!("Reshaping {:?}", args.input))?;
    let pim_table = pim::build(&input, &session.config().pim_options(), &reasons)
        .with_context(|| format!("Building PIM table from {:?}", args.input))?;

    let folder = session.output_subdir(&format!("PIM_output_{}", stamp.minute_stamp()))?;

    let pivot_name = OutputName::new("Pivot_Date", stamp.minute_stamp(), "csv", Disambiguator::Counter);
    let pivot_path = session
        .write_output(&folder, &pivot_name, |path| {
            io_utils::write_table_csv(path, &summary, &CsvOutput::default().with_bom())
        })
        .with_context(|| format!("Writing pivot file in {folder:?}"))?;
    session.record_artifact("pivot", &pivot_path, summary.row_count());

    let extension = match args.pim_format {
        PimFormat::Xlsx => "xlsx",
        PimFormat::Csv => "csv",
    };
    let pim_name = OutputName::new(
        "PIM_Date_Time",
        stamp.minute_stamp(),
        extension,
        Disambiguator::Counter,
    );
    let pim_path = session
        .write_output(&folder, &pim_name, |path| match args.pim_format {
            PimFormat::Xlsx => workbook::write_workbook(path, &[("Sheet1", &pim_table)]),
            PimFormat::Csv => io_utils::write_table_csv(path, &pim_table, &CsvOutput::default()),
        })
        .with_context(|| format!("Writing PIM file in {folder:?}"))?;
    session.record_artifact("pim", &pim_path, pim_table.row_count());

    info!(
        "Pivot: {} row(s) -> {:?}; PIM: {} row(s) -> {:?}",
        summary.row_count(),
        pivot_path,
        pim_table.row_count(),
        pim_path
    );
    Ok(())
}
