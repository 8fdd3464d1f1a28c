//! Schema reconciliation and multi-table concatenation.
//!
//! Before several tables are stacked, a [`ReconcilePolicy`] decides which
//! columns the result carries:
//!
//! - **Intersection**: only the columns every contributing table has.
//! - **Union**: every column seen, blanks where a table lacks one.
//! - **Target**: an explicit column list. Required columns must be present in
//!   each table or that table is rejected with a schema error; optional
//!   columns are filled with blanks.
//!
//! Tables without rows contribute nothing and never shape the column set, so
//! appending an empty table is an identity operation.

use std::{collections::HashSet, path::PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    error::{PipelineError, PipelineResult},
    loader::{self, LoadOptions},
    table::Table,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColumn {
    pub name: String,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl TargetColumn {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcilePolicy {
    Intersection,
    Union,
    Target(Vec<TargetColumn>),
}

/// Result of stacking several tables.
#[derive(Debug, Clone, Default)]
pub struct Concatenation {
    pub table: Table,
    /// Labels of inputs that contributed no rows to the result.
    pub skipped: Vec<String>,
    pub warnings: Vec<String>,
}

/// Checks one table against a target schema, returning the first missing
/// required column as a schema error.
pub fn validate_target(label: &str, table: &Table, target: &[TargetColumn]) -> PipelineResult<()> {
    for column in target.iter().filter(|c| c.required) {
        if !table.has_column(&column.name) {
            return Err(PipelineError::schema(
                format!("Validating columns of {label}"),
                column.name.clone(),
            ));
        }
    }
    Ok(())
}

/// The column set `policy` yields for `tables`. Empty tables are ignored
/// unless every table is empty, in which case the first one's headers stand.
pub fn reconcile(tables: &[&Table], policy: &ReconcilePolicy) -> Vec<String> {
    if let ReconcilePolicy::Target(target) = policy {
        return target.iter().map(|c| c.name.clone()).collect();
    }

    let contributing: Vec<&Table> = tables.iter().copied().filter(|t| !t.is_empty()).collect();
    let shaping: &[&Table] = if contributing.is_empty() {
        tables.get(..1).unwrap_or(&[])
    } else {
        &contributing
    };
    let Some(first) = shaping.first() else {
        return Vec::new();
    };

    match policy {
        ReconcilePolicy::Intersection => first
            .headers()
            .iter()
            .filter(|name| shaping.iter().all(|t| t.has_column(name)))
            .cloned()
            .collect(),
        ReconcilePolicy::Union => {
            let mut seen = HashSet::new();
            let mut columns = Vec::new();
            for table in shaping {
                for name in table.headers() {
                    if seen.insert(name.clone()) {
                        columns.push(name.clone());
                    }
                }
            }
            columns
        }
        ReconcilePolicy::Target(_) => unreachable!("handled above"),
    }
}

/// Stacks labelled tables in input order. Inputs that fail a required
/// column check or have no rows are skipped with a warning.
pub fn concat(inputs: Vec<(String, Table)>, policy: &ReconcilePolicy) -> Concatenation {
    let mut warnings = Vec::new();
    let mut skipped = Vec::new();
    let mut accepted: Vec<(String, Table)> = Vec::with_capacity(inputs.len());

    for (label, table) in inputs {
        if let ReconcilePolicy::Target(target) = policy
            && let Err(err) = validate_target(&label, &table, target)
        {
            warn!("{err}. Skipping...");
            warnings.push(format!("{err}. Skipping..."));
            skipped.push(label);
            continue;
        }
        if table.is_empty() {
            let message = format!("Empty table in file: {label}. Skipping...");
            warn!("{message}");
            warnings.push(message);
            skipped.push(label.clone());
        }
        accepted.push((label, table));
    }

    let refs: Vec<&Table> = accepted.iter().map(|(_, t)| t).collect();
    let columns = reconcile(&refs, policy);
    let mut result = Table::new(columns.clone());
    for (label, table) in &accepted {
        if table.is_empty() {
            continue;
        }
        let projected = table.project(&columns);
        debug!("Appending {} row(s) from {}", projected.row_count(), label);
        for row in projected.into_parts().1 {
            result.push_row(row);
        }
    }

    Concatenation {
        table: result,
        skipped,
        warnings,
    }
}

/// Loads and stacks files. Files that cannot be loaded are reported as
/// warnings and skipped; the remaining files are still concatenated.
pub fn concat_files(
    paths: &[PathBuf],
    options: &LoadOptions,
    policy: &ReconcilePolicy,
) -> Concatenation {
    let mut load_warnings = Vec::new();
    let mut load_skipped = Vec::new();
    let mut inputs = Vec::with_capacity(paths.len());
    for path in paths {
        let label = path.display().to_string();
        match loader::load_table(path, options) {
            Ok(table) => inputs.push((label, table)),
            Err(err) => {
                let message = format!("Error reading file: {label}. Skipping... ({err})");
                warn!("{message}");
                load_warnings.push(message);
                load_skipped.push(label);
            }
        }
    }
    let mut outcome = concat(inputs, policy);
    load_warnings.append(&mut outcome.warnings);
    load_skipped.append(&mut outcome.skipped);
    outcome.warnings = load_warnings;
    outcome.skipped = load_skipped;
    outcome
}
