//! Per-invocation context handed to every command.
//!
//! A [`Session`] owns what used to be ambient state in an interactive tool:
//! the output directory, the run timestamp captured once at start-up, the
//! artifacts written so far, accumulated warnings and (optionally) cached
//! reference tables. It is created by [`crate::run`] and consumed by
//! [`Session::finish`].

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::{Datelike, Local, NaiveDateTime};
use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    config::Config,
    error::PipelineResult,
    io_utils::{self, DelimiterChoice},
    loader::LoadOptions,
    lookup::ReferenceTable,
    naming::{self, OutputName},
    reasons::{ReasonBook, UnmappedReason},
};

pub const MANIFEST_FILE: &str = "manifest.json";

/// The moment a run started. Every timestamp a run writes derives from it,
/// so a folder name and the files inside it always agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp {
    at: NaiveDateTime,
}

impl RunStamp {
    pub fn new(at: NaiveDateTime) -> Self {
        Self { at }
    }

    pub fn now() -> Self {
        Self::new(Local::now().naive_local())
    }

    pub fn at(&self) -> NaiveDateTime {
        self.at
    }

    pub fn iso_week(&self) -> u32 {
        self.at.iso_week().week()
    }

    /// `01/03/2024`
    pub fn formatted_date(&self) -> String {
        self.at.format("%m/%d/%Y").to_string()
    }

    /// `2024-01-03_09-30`
    pub fn minute_stamp(&self) -> String {
        self.at.format("%Y-%m-%d_%H-%M").to_string()
    }

    /// `2024-01-03`
    pub fn date(&self) -> String {
        self.at.format("%Y-%m-%d").to_string()
    }

    /// `20240103`
    pub fn compact_date(&self) -> String {
        self.at.format("%Y%m%d").to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub kind: String,
    pub path: PathBuf,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    started_at: String,
    artifacts: &'a [Artifact],
    warnings: &'a [String],
}

type ReferenceKey = (PathBuf, String, String);

#[derive(Debug)]
pub struct Session {
    output_dir: PathBuf,
    config: Config,
    stamp: RunStamp,
    artifacts: Vec<Artifact>,
    warnings: Vec<String>,
    references: HashMap<ReferenceKey, ReferenceTable>,
}

impl Session {
    pub fn new(output_dir: PathBuf, config: Config, stamp: RunStamp) -> Self {
        Self {
            output_dir,
            config,
            stamp,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            references: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stamp(&self) -> &RunStamp {
        &self.stamp
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Loader options from the usual per-command flags. A delimiter of `0`
    /// (`--delimiter auto`) asks the loader to sniff.
    pub fn load_options(
        &self,
        sheet: Option<String>,
        delimiter: Option<u8>,
        input_encoding: Option<&str>,
    ) -> Result<LoadOptions> {
        let encoding = io_utils::resolve_encoding(input_encoding)?;
        Ok(LoadOptions {
            delimiter: DelimiterChoice::from_arg(delimiter),
            encoding,
            ..LoadOptions::default()
        }
        .with_sheet(sheet))
    }

    /// The reason dictionary: from `path` when given, otherwise from config.
    pub fn reason_book(&self, path: Option<&Path>, unmapped: UnmappedReason) -> Result<ReasonBook> {
        match path {
            Some(path) => {
                let book = ReasonBook::load(path, &LoadOptions::default(), unmapped)
                    .with_context(|| format!("Loading reason labels from {path:?}"))?;
                info!("Loaded {} reason label(s) from {:?}", book.len(), path);
                Ok(book)
            }
            None => Ok(ReasonBook::new(self.config.reasons.clone(), unmapped)),
        }
    }

    /// Loads a reference table, substituting an empty one (and recording a
    /// warning) when the file cannot be used. With `reference_cache` enabled
    /// a table is read at most once per session.
    pub fn reference(&mut self, path: &Path, key_column: &str, value_column: &str) -> ReferenceTable {
        self.usable_reference(path, key_column, value_column)
            .unwrap_or_else(|| ReferenceTable::empty(key_column, value_column))
    }

    /// Like [`Session::reference`] but returns `None` when the file could not
    /// be loaded or lacks the key or value column. A well-formed file with no
    /// rows is usable.
    pub fn usable_reference(
        &mut self,
        path: &Path,
        key_column: &str,
        value_column: &str,
    ) -> Option<ReferenceTable> {
        let cache_key = (
            path.to_path_buf(),
            key_column.to_string(),
            value_column.to_string(),
        );
        if let Some(cached) = self.references.get(&cache_key) {
            debug!("Reusing cached reference table {:?}", path);
            return Some(cached.clone());
        }
        let (reference, warning) =
            ReferenceTable::load(path, key_column, value_column, &LoadOptions::default());
        if let Some(message) = warning {
            self.warnings.push(message);
            return None;
        }
        if self.config.reference_cache {
            self.references.insert(cache_key, reference.clone());
        }
        Some(reference)
    }

    /// Creates (if needed) and returns a directory below the output root.
    pub fn output_subdir(&self, name: &str) -> Result<PathBuf> {
        let dir = self.output_dir.join(name);
        fs::create_dir_all(&dir).with_context(|| format!("Creating output folder {dir:?}"))?;
        Ok(dir)
    }

    pub fn ensure_output_dir(&self) -> Result<&Path> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("Creating output folder {:?}", self.output_dir))?;
        Ok(&self.output_dir)
    }

    /// Claims a fresh output path in `dir` and writes it with `write`.
    pub fn write_output<F>(&self, dir: &Path, name: &OutputName, write: F) -> Result<PathBuf>
    where
        F: FnOnce(&Path) -> PipelineResult<()>,
    {
        Ok(naming::allocate_and_write(dir, name, write)?)
    }

    pub fn record_artifact(&mut self, kind: &str, path: &Path, rows: usize) {
        debug!("Recorded {} artifact {:?} ({} row(s))", kind, path, rows);
        self.artifacts.push(Artifact {
            kind: kind.to_string(),
            path: path.to_path_buf(),
            rows,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(message);
    }

    /// Ends the session. Returns the manifest path when one was written.
    pub fn finish(self, write_manifest: bool) -> Result<Option<PathBuf>> {
        if !self.warnings.is_empty() {
            warn!("Completed with {} warning(s)", self.warnings.len());
        }
        info!("Wrote {} artifact(s)", self.artifacts.len());
        if !write_manifest {
            return Ok(None);
        }
        let dir = self.ensure_output_dir()?;
        let path = dir.join(MANIFEST_FILE);
        let manifest = Manifest {
            started_at: self.stamp.at().format("%Y-%m-%dT%H:%M:%S").to_string(),
            artifacts: &self.artifacts,
            warnings: &self.warnings,
        };
        let json = serde_json::to_string_pretty(&manifest).context("Serializing manifest")?;
        fs::write(&path, json).with_context(|| format!("Writing manifest {path:?}"))?;
        info!("Manifest written to {:?}", path);
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn stamp() -> RunStamp {
        RunStamp::new(
            NaiveDate::from_ymd_opt(2024, 1, 3)
                .unwrap()
                .and_hms_opt(9, 30, 15)
                .unwrap(),
        )
    }

    #[test]
    fn stamp_formats() {
        let stamp = stamp();
        assert_eq!(stamp.iso_week(), 1);
        assert_eq!(stamp.formatted_date(), "01/03/2024");
        assert_eq!(stamp.minute_stamp(), "2024-01-03_09-30");
        assert_eq!(stamp.date(), "2024-01-03");
        assert_eq!(stamp.compact_date(), "20240103");
    }

    #[test]
    fn iso_week_follows_iso_year() {
        let stamp = RunStamp::new(
            NaiveDate::from_ymd_opt(2021, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(stamp.iso_week(), 53);
    }

    fn write_sellers(dir: &Path) -> PathBuf {
        let path = dir.join("sellers.csv");
        fs::write(&path, "SellerName,Seller_ID\nAcme,10\n").expect("write sellers");
        path
    }

    #[test]
    fn references_are_reread_without_cache() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_sellers(dir.path());
        let mut session = Session::new(dir.path().to_path_buf(), Config::default(), stamp());
        assert_eq!(session.reference(&path, "SellerName", "Seller_ID").len(), 1);
        fs::remove_file(&path).expect("remove");
        assert!(session.reference(&path, "SellerName", "Seller_ID").is_empty());
        assert_eq!(session.warnings().len(), 1);
    }

    #[test]
    fn empty_but_well_formed_reference_is_usable() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("categories.csv");
        fs::write(&path, "CATEGORY_CODE\n").expect("write");
        let mut session = Session::new(dir.path().to_path_buf(), Config::default(), stamp());
        let reference = session
            .usable_reference(&path, "CATEGORY_CODE", "CATEGORY_CODE")
            .expect("usable");
        assert!(reference.is_empty());
        assert!(session.warnings().is_empty());

        let missing = dir.path().join("absent.csv");
        assert!(session
            .usable_reference(&missing, "CATEGORY_CODE", "CATEGORY_CODE")
            .is_none());
        assert_eq!(session.warnings().len(), 1);
    }

    #[test]
    fn cached_references_survive_file_removal() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = write_sellers(dir.path());
        let config = Config {
            reference_cache: true,
            ..Config::default()
        };
        let mut session = Session::new(dir.path().to_path_buf(), config, stamp());
        assert_eq!(session.reference(&path, "SellerName", "Seller_ID").len(), 1);
        fs::remove_file(&path).expect("remove");
        assert_eq!(session.reference(&path, "SellerName", "Seller_ID").len(), 1);
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn finish_writes_manifest() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut session = Session::new(dir.path().join("out"), Config::default(), stamp());
        session.record_artifact("pivot", Path::new("out/Pivot.csv"), 3);
        session.warn("something odd");
        let path = session.finish(true).expect("finish").expect("manifest path");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(path).expect("read")).expect("json");
        assert_eq!(json["started_at"], "2024-01-03T09:30:15");
        assert_eq!(json["artifacts"][0]["kind"], "pivot");
        assert_eq!(json["artifacts"][0]["rows"], 3);
        assert_eq!(json["warnings"][0], "something odd");
    }
}
