//! Per-product status table uploaded back to the PIM system.

use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    error::PipelineResult,
    reasons::{APPROVED, REJECTED, ReasonBook},
    table::Table,
};

pub const OUTPUT_COLUMNS: [&str; 5] = ["ProductSetSid", "ParentSKU", "Status", "Reason", "Comment"];

/// Attaches a fixed comment to every row whose reason label matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRule {
    pub reason: String,
    pub comment: String,
}

pub fn default_comment_rules() -> Vec<CommentRule> {
    vec![CommentRule {
        reason: "Wrong Brand".to_string(),
        comment: "Please use Fashion as brand name".to_string(),
    }]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PimOptions {
    pub product_column: String,
    pub parent_column: String,
    pub reason_column: String,
    pub comments: Vec<CommentRule>,
}

impl Default for PimOptions {
    fn default() -> Self {
        Self {
            product_column: "PRODUCT_SET_SID".to_string(),
            parent_column: "PARENTSKU".to_string(),
            reason_column: "reason".to_string(),
            comments: default_comment_rules(),
        }
    }
}

pub fn build(table: &Table, options: &PimOptions, reasons: &ReasonBook) -> PipelineResult<Table> {
    let context = "Building PIM table";
    let product_idx = table.require_column(&options.product_column, context)?;
    let parent_idx = table.require_column(&options.parent_column, context)?;
    let reason_idx = table.require_column(&options.reason_column, context)?;

    let mut rows: Vec<Vec<Cell>> = table
        .rows()
        .iter()
        .map(|row| {
            let label = reasons.label(&row[reason_idx].as_display());
            let (status, reason) = match label {
                None => (APPROVED, String::new()),
                Some(label) => (REJECTED, label),
            };
            let comment = options
                .comments
                .iter()
                .find(|rule| status == REJECTED && rule.reason == reason)
                .map(|rule| Cell::text(rule.comment.clone()))
                .unwrap_or_default();
            vec![
                row[product_idx].clone(),
                row[parent_idx].clone(),
                Cell::text(status),
                Cell::text(reason),
                comment,
            ]
        })
        .collect();

    // Rejected rows first; the sort is stable so input order holds within a status.
    rows.sort_by(|a, b| b[2].as_display().cmp(&a[2].as_display()));
    Ok(Table::from_rows(
        OUTPUT_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    ))
}
