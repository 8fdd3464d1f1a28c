//! YAML configuration: static lookup data and column names.
//!
//! Every field has a default, so an empty file (or no file at all) behaves
//! like the stock setup. Command-line flags override individual fields.

use std::{collections::BTreeMap, fs, path::Path};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    audit::{AuditOptions, default_colour_words},
    merge::MergeColumns,
    pim::PimOptions,
    pivot::{Annotation, EventSource, PivotColumns, PivotOptions, default_annotations},
    reasons::{UnmappedReason, default_labels},
};

pub const DEFAULT_CHUNK_SIZE: usize = 9998;
pub const DEFAULT_AUXILIARY_SHEET: &str = "RejectionReasons";
pub const DEFAULT_SPLIT_PREFIX: &str = "KE_PIM";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub chunk_size: usize,
    pub auxiliary_sheets: Vec<String>,
    pub prefix: String,
    pub archive_name: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            auxiliary_sheets: vec![DEFAULT_AUXILIARY_SHEET.to_string()],
            prefix: DEFAULT_SPLIT_PREFIX.to_string(),
            archive_name: "output_files".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub brand_column: String,
    pub category_column: String,
    pub colour_column: String,
    pub generic_brand: String,
    pub colours: Vec<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            brand_column: "BRAND".to_string(),
            category_column: "CATEGORY_CODE".to_string(),
            colour_column: "COLOR".to_string(),
            generic_brand: "Generic".to_string(),
            colours: default_colour_words(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reason code → label.
    pub reasons: BTreeMap<String, String>,
    pub unmapped_reason: UnmappedReason,
    pub events: EventSource,
    pub pivot: PivotColumns,
    pub annotations: Vec<Annotation>,
    pub pim: PimOptions,
    pub merge: MergeColumns,
    pub split: SplitConfig,
    pub audit: AuditConfig,
    /// Keep reference tables in memory for the rest of the session instead
    /// of re-reading them on every lookup.
    pub reference_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reasons: default_labels(),
            unmapped_reason: UnmappedReason::default(),
            events: EventSource::default(),
            pivot: PivotColumns::default(),
            annotations: default_annotations(),
            pim: PimOptions::default(),
            merge: MergeColumns::default(),
            split: SplitConfig::default(),
            audit: AuditConfig::default(),
            reference_cache: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read_to_string(path).with_context(|| format!("Opening config file {path:?}"))?;
        if raw.trim().is_empty() {
            debug!("Config file {:?} is empty; using defaults", path);
            return Ok(Self::default());
        }
        let config: Config =
            serde_yaml::from_str(&raw).with_context(|| format!("Parsing config file {path:?}"))?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn pivot_options(&self) -> PivotOptions {
        PivotOptions {
            columns: self.pivot.clone(),
            events: self.events,
            annotations: self.annotations.clone(),
        }
    }

    pub fn pim_options(&self) -> PimOptions {
        self.pim.clone()
    }

    pub fn audit_options(&self) -> AuditOptions {
        AuditOptions {
            brand_column: self.audit.brand_column.clone(),
            category_column: self.audit.category_column.clone(),
            colour_column: self.audit.colour_column.clone(),
            generic_brand: self.audit.generic_brand.clone(),
            colours: self.audit.colours.clone(),
        }
    }
}
