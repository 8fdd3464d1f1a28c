//! Reject-reason codes and their human-readable labels.

use std::{cmp::Ordering, collections::BTreeMap, path::Path};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    error::{PipelineError, PipelineResult},
    loader::{self, LoadOptions},
    lookup::NOT_FOUND,
};

pub const APPROVED: &str = "Approved";
pub const REJECTED: &str = "Rejected";

/// How a non-blank code without a dictionary entry is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedReason {
    /// Keep the code itself.
    #[default]
    Raw,
    Blank,
    NotFound,
}

/// Static code → label dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonBook {
    labels: BTreeMap<String, String>,
    unmapped: UnmappedReason,
}

impl Default for ReasonBook {
    fn default() -> Self {
        Self::new(default_labels(), UnmappedReason::default())
    }
}

pub fn default_labels() -> BTreeMap<String, String> {
    [
        ("col", "Wrong Color"),
        ("cat", "Wrong Category"),
        ("var", "Wrong Variation - Size Only"),
        ("bra", "Wrong Brand"),
        (
            "Wrong Variation - means size only",
            "Wrong Variation - means size only",
        ),
    ]
    .into_iter()
    .map(|(code, label)| (code.to_string(), label.to_string()))
    .collect()
}

impl ReasonBook {
    pub fn new(labels: BTreeMap<String, String>, unmapped: UnmappedReason) -> Self {
        Self { labels, unmapped }
    }

    pub fn with_unmapped(mut self, unmapped: UnmappedReason) -> Self {
        self.unmapped = unmapped;
        self
    }

    /// Reads a two-column code/label sheet; the first two columns are used
    /// whatever their names.
    pub fn load(path: &Path, options: &LoadOptions, unmapped: UnmappedReason) -> PipelineResult<Self> {
        let table = loader::load_table(path, options)?;
        if table.column_count() < 2 {
            return Err(PipelineError::schema(
                format!("Reading reason labels from {path:?}"),
                "label",
            ));
        }
        let mut labels = BTreeMap::new();
        for row in table.rows() {
            let code = row[0].as_display().trim().to_string();
            if code.is_empty() {
                continue;
            }
            labels.entry(code).or_insert_with(|| row[1].as_display());
        }
        Ok(Self { labels, unmapped })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// `None` only for a blank code, which means "no rejection reason".
    pub fn label(&self, code: &str) -> Option<String> {
        let code = code.trim();
        if code.is_empty() {
            return None;
        }
        match self.labels.get(code) {
            Some(label) => Some(label.clone()),
            None => match self.unmapped {
                UnmappedReason::Raw => Some(code.to_string()),
                UnmappedReason::Blank => Some(String::new()),
                UnmappedReason::NotFound => Some(NOT_FOUND.to_string()),
            },
        }
    }

    pub fn label_cell(&self, code: &Cell) -> Cell {
        self.label(&code.as_display())
            .map(Cell::text)
            .unwrap_or(Cell::Empty)
    }
}

/// Blank first, then case-insensitive alphabetical; ties broken by the
/// original spelling so the order is total.
pub fn compare_reasons(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

pub fn sort_reasons<S: AsRef<str>>(reasons: &[S]) -> Vec<String> {
    let mut sorted: Vec<String> = reasons.iter().map(|r| r.as_ref().to_string()).collect();
    sorted.sort_by(|a, b| compare_reasons(a, b));
    sorted
}
