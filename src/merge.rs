//! SKU merge: stacks seller exports, attaches seller ids and resolves
//! category ids to category paths.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    cli::MergeArgs,
    error::PipelineResult,
    io_utils::{self, CsvOutput, DelimiterChoice},
    lookup::{self, JoinStats, MissPolicy, ReferenceTable},
    naming::{Disambiguator, OutputName},
    schema::{self, ReconcilePolicy, TargetColumn},
    session::Session,
    table::Table,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeColumns {
    pub seller: String,
    pub sku: String,
    pub category: String,
    pub name: String,
    pub brand: String,
    /// Attribute looked up from the sellers file.
    pub seller_id: String,
    /// Attribute looked up from the category tree.
    pub category_label: String,
}

impl Default for MergeColumns {
    fn default() -> Self {
        Self {
            seller: "SellerName".to_string(),
            sku: "SellerSku".to_string(),
            category: "PrimaryCategory".to_string(),
            name: "Name".to_string(),
            brand: "Brand".to_string(),
            seller_id: "Seller_ID".to_string(),
            category_label: "Category".to_string(),
        }
    }
}

impl MergeColumns {
    /// Columns every export must provide.
    pub fn input_target(&self) -> Vec<TargetColumn> {
        [&self.seller, &self.sku, &self.category, &self.name, &self.brand]
            .into_iter()
            .map(|name| TargetColumn::required(name.clone()))
            .collect()
    }

    pub fn output_order(&self) -> Vec<&str> {
        vec![
            self.seller.as_str(),
            self.name.as_str(),
            self.seller_id.as_str(),
            self.sku.as_str(),
            self.category.as_str(),
            self.brand.as_str(),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub sellers: JoinStats,
    pub categories: JoinStats,
}

/// Enriches concatenated exports and puts the columns in upload order.
pub fn enrich(
    table: &Table,
    columns: &MergeColumns,
    sellers: &ReferenceTable,
    categories: &ReferenceTable,
) -> PipelineResult<(Table, MergeStats)> {
    let (with_ids, seller_stats) =
        lookup::append(table, &columns.seller, sellers, &columns.seller_id, &MissPolicy::Blank)?;
    let (resolved, category_stats) = lookup::coalesce(&with_ids, &columns.category, categories)?;
    let ordered = resolved.select(&columns.output_order(), "Ordering merged columns")?;
    Ok((
        ordered,
        MergeStats {
            sellers: seller_stats,
            categories: category_stats,
        },
    ))
}

pub fn execute(args: &MergeArgs, session: &mut Session) -> Result<()> {
    let columns = session.config().merge.clone();
    let mut load = session.load_options(None, args.delimiter, args.input_encoding.as_deref())?;
    if args.delimiter.is_none() {
        load = load.with_delimiter(DelimiterChoice::Sniff);
    }
    info!("Merging {} file(s)", args.inputs.len());

    let policy = ReconcilePolicy::Target(columns.input_target());
    let outcome = schema::concat_files(&args.inputs, &load, &policy);
    for message in outcome.warnings {
        session.warn(message);
    }
    info!(
        "Concatenated {} row(s); {} file(s) skipped",
        outcome.table.row_count(),
        outcome.skipped.len()
    );

    let sellers = session.reference(&args.sellers, &columns.seller, &columns.seller_id);
    let categories = session.reference(&args.category_tree, &columns.category, &columns.category_label);
    let (merged, stats) = enrich(&outcome.table, &columns, &sellers, &categories)
        .context("Enriching merged rows")?;
    info!(
        "Seller ids: {} matched, {} missing; categories: {} resolved, {} kept",
        stats.sellers.matched,
        stats.sellers.missed,
        stats.categories.matched,
        stats.categories.missed
    );

    let dir = session.ensure_output_dir()?.to_path_buf();
    let name = OutputName::new(
        "Merged_skus",
        session.stamp().compact_date(),
        "csv",
        Disambiguator::Letter,
    );
    let path = session
        .write_output(&dir, &name, |path| {
            io_utils::write_table_csv(path, &merged, &CsvOutput::default())
        })
        .with_context(|| format!("Writing merged file in {dir:?}"))?;
    session.record_artifact("merge", &path, merged.row_count());
    info!("Merge completed. Merged data saved to {:?}", path);
    Ok(())
}
