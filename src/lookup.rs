//! VLOOKUP-style enrichment against small reference tables.
//!
//! A [`ReferenceTable`] maps a natural key (seller name, category id, ...)
//! to one attribute. Joins never remove or reorder working rows: each row
//! either picks up the attribute or gets the [`MissPolicy`] value.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use log::{info, warn};

use crate::{
    data::Cell,
    error::PipelineResult,
    loader::{self, LoadOptions},
    table::Table,
};

pub const NOT_FOUND: &str = "Not Found";

/// What an unmatched row receives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MissPolicy {
    #[default]
    Blank,
    Sentinel(String),
}

impl MissPolicy {
    pub fn not_found() -> Self {
        MissPolicy::Sentinel(NOT_FOUND.to_string())
    }

    fn cell(&self) -> Cell {
        match self {
            MissPolicy::Blank => Cell::Empty,
            MissPolicy::Sentinel(text) => Cell::text(text.clone()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    key_column: String,
    value_column: String,
    entries: HashMap<String, Cell>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub missed: usize,
}

impl ReferenceTable {
    pub fn empty(key_column: &str, value_column: &str) -> Self {
        Self {
            key_column: key_column.to_string(),
            value_column: value_column.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Indexes `table` by `key_column`. Blank keys are ignored and the first
    /// occurrence of a duplicate key wins.
    pub fn from_table(table: &Table, key_column: &str, value_column: &str) -> PipelineResult<Self> {
        let context = "Building reference table";
        let key_idx = table.require_column(key_column, context)?;
        let value_idx = table.require_column(value_column, context)?;
        let mut entries = HashMap::with_capacity(table.row_count());
        for row in table.rows() {
            let key = lookup_key(&row[key_idx]);
            if key.is_empty() {
                continue;
            }
            entries.entry(key).or_insert_with(|| row[value_idx].clone());
        }
        Ok(Self {
            key_column: key_column.to_string(),
            value_column: value_column.to_string(),
            entries,
        })
    }

    /// Loads a reference file. A missing, unreadable or mis-shaped file
    /// yields an empty reference table plus a warning for the caller, so the
    /// surrounding pipeline keeps running with blank lookups.
    pub fn load(
        path: &Path,
        key_column: &str,
        value_column: &str,
        options: &LoadOptions,
    ) -> (Self, Option<String>) {
        let loaded = loader::load_table(path, options)
            .and_then(|table| Self::from_table(&table, key_column, value_column));
        match loaded {
            Ok(reference) => {
                info!(
                    "Loaded {} {} -> {} reference entr(ies) from {:?}",
                    reference.len(),
                    key_column,
                    value_column,
                    path
                );
                (reference, None)
            }
            Err(err) => {
                let message = format!(
                    "No data to parse in file: {}. Lookups of '{}' will be blank ({err})",
                    path.display(),
                    value_column
                );
                warn!("{message}");
                (Self::empty(key_column, value_column), Some(message))
            }
        }
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn value_column(&self) -> &str {
        &self.value_column
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Cell) -> Option<&Cell> {
        self.entries.get(&lookup_key(key))
    }

    /// The key set, for membership checks.
    pub fn keys(&self) -> HashSet<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Keys compare by display text so `1001` from a workbook (float) matches
/// `1001` from a CSV (integer or text).
fn lookup_key(cell: &Cell) -> String {
    cell.as_display().trim().to_string()
}

/// Writes the looked-up attribute into `target_column` (appended when new).
pub fn append(
    table: &Table,
    key_column: &str,
    reference: &ReferenceTable,
    target_column: &str,
    miss: &MissPolicy,
) -> PipelineResult<(Table, JoinStats)> {
    let key_idx = table.require_column(key_column, "Joining reference data")?;
    let mut stats = JoinStats::default();
    let values = table
        .column_values(key_idx)
        .map(|key| match reference.get(key) {
            Some(value) => {
                stats.matched += 1;
                value.clone()
            }
            None => {
                stats.missed += 1;
                miss.cell()
            }
        })
        .collect();
    Ok((table.with_column(target_column, values), stats))
}

/// Replaces each cell of `column` with its looked-up value, keeping the
/// original cell when the key is unknown.
pub fn coalesce(
    table: &Table,
    column: &str,
    reference: &ReferenceTable,
) -> PipelineResult<(Table, JoinStats)> {
    let idx = table.require_column(column, "Replacing via reference data")?;
    let mut stats = JoinStats::default();
    let values = table
        .column_values(idx)
        .map(|original| match reference.get(original) {
            Some(value) if !value.is_blank() => {
                stats.matched += 1;
                value.clone()
            }
            _ => {
                stats.missed += 1;
                original.clone()
            }
        })
        .collect();
    Ok((table.with_column(column, values), stats))
}

/// Writes `flag(row, is_member)` into `target_column`, where `is_member`
/// says whether the row's key appears in `keys`.
pub fn membership<F>(
    table: &Table,
    key_column: &str,
    keys: &HashSet<String>,
    target_column: &str,
    mut flag: F,
) -> PipelineResult<Table>
where
    F: FnMut(&[Cell], bool) -> Cell,
{
    let key_idx = table.require_column(key_column, "Checking reference membership")?;
    let values = table
        .rows()
        .iter()
        .map(|row| {
            let member = keys.contains(&lookup_key(&row[key_idx]));
            flag(row, member)
        })
        .collect();
    Ok(table.with_column(target_column, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn working() -> Table {
        Table::from_rows(
            vec!["SellerName".into(), "Sku".into()],
            vec![
                vec![Cell::text("A"), Cell::text("s1")],
                vec![Cell::text("B"), Cell::text("s2")],
                vec![Cell::text("C"), Cell::text("s3")],
            ],
        )
    }

    fn sellers() -> ReferenceTable {
        let table = Table::from_rows(
            vec!["SellerName".into(), "Seller_ID".into()],
            vec![
                vec![Cell::text("A"), Cell::Integer(10)],
                vec![Cell::text("C"), Cell::Integer(30)],
                vec![Cell::text("A"), Cell::Integer(99)],
            ],
        );
        ReferenceTable::from_table(&table, "SellerName", "Seller_ID").expect("reference")
    }

    #[test]
    fn unmatched_keys_are_blank_by_default() {
        let (joined, stats) =
            append(&working(), "SellerName", &sellers(), "Seller_ID", &MissPolicy::Blank)
                .expect("join");
        let ids: Vec<String> = joined.column_values(2).map(|c| c.as_display()).collect();
        assert_eq!(ids, vec!["10", "", "30"]);
        assert_eq!(stats, JoinStats { matched: 2, missed: 1 });
    }

    #[test]
    fn sentinel_marks_explicit_non_membership() {
        let (joined, _) = append(
            &working(),
            "SellerName",
            &sellers(),
            "Seller_ID",
            &MissPolicy::not_found(),
        )
        .expect("join");
        assert_eq!(joined.cell(1, 2), &Cell::text(NOT_FOUND));
        assert_eq!(joined.cell(0, 2), &Cell::Integer(10));
    }

    #[test]
    fn coalesce_keeps_original_on_miss() {
        let table = Table::from_rows(
            vec!["PrimaryCategory".into()],
            vec![vec![Cell::Integer(1001)], vec![Cell::Integer(2002)]],
        );
        let tree = Table::from_rows(
            vec!["PrimaryCategory".into(), "Category".into()],
            vec![vec![Cell::Float(1001.0), Cell::text("Shoes")]],
        );
        let reference =
            ReferenceTable::from_table(&tree, "PrimaryCategory", "Category").expect("reference");
        let (out, stats) = coalesce(&table, "PrimaryCategory", &reference).expect("coalesce");
        assert_eq!(out.cell(0, 0), &Cell::text("Shoes"));
        assert_eq!(out.cell(1, 0), &Cell::Integer(2002));
        assert_eq!(stats.matched, 1);
    }

    #[test]
    fn missing_reference_file_yields_empty_table_and_warning() {
        let (reference, warning) = ReferenceTable::load(
            Path::new("does-not-exist.xlsx"),
            "SellerName",
            "Seller_ID",
            &LoadOptions::default(),
        );
        assert!(reference.is_empty());
        assert!(warning.expect("warning").contains("does-not-exist.xlsx"));
        let (joined, stats) =
            append(&working(), "SellerName", &reference, "Seller_ID", &MissPolicy::Blank)
                .expect("join");
        assert!(joined.column_values(2).all(Cell::is_blank));
        assert_eq!(stats.missed, 3);
    }

    #[test]
    fn missing_key_column_is_a_schema_error() {
        let err = append(&working(), "Vendor", &sellers(), "Seller_ID", &MissPolicy::Blank)
            .unwrap_err();
        assert!(err.to_string().contains("'Vendor'"));
    }

    #[test]
    fn membership_flags_rows() {
        let keys: HashSet<String> = ["A".to_string()].into_iter().collect();
        let out = membership(&working(), "SellerName", &keys, "known", |_, member| {
            Cell::text(if member { "Yes" } else { "No" })
        })
        .expect("membership");
        let flags: Vec<String> = out.column_values(2).map(|c| c.as_display()).collect();
        assert_eq!(flags, vec!["Yes", "No", "No"]);
    }
}
