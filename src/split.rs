//! Chunked splitter: breaks large sheets into upload-sized workbooks.
//!
//! Every sheet not listed as auxiliary is cut into contiguous chunks of at
//! most `max_rows` rows. Each chunk becomes its own workbook that also
//! carries a full copy of every auxiliary sheet (the reject-reason legend),
//! so a chunk can be reviewed on its own.

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{
    cli::SplitArgs,
    error::{PipelineError, PipelineResult},
    loader::{self, LoadOptions},
    naming::{self, Disambiguator, OutputName},
    session::Session,
    table::Table,
    workbook,
};

/// Contiguous, order-preserving chunks of at most `max_rows` rows. An empty
/// table yields no chunks.
pub fn chunk_rows(table: &Table, max_rows: usize) -> PipelineResult<Vec<Table>> {
    if max_rows == 0 {
        return Err(PipelineError::InvalidArgument(
            "chunk size must be at least 1".to_string(),
        ));
    }
    Ok((0..table.row_count())
        .step_by(max_rows)
        .map(|start| table.slice(start, start + max_rows))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitOptions {
    pub max_rows: usize,
    pub auxiliary_sheets: Vec<String>,
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkUnit {
    pub sheet: String,
    /// 1-based within its sheet.
    pub number: usize,
    pub table: Table,
    pub auxiliaries: Vec<(String, Table)>,
}

impl ChunkUnit {
    pub fn file_name(&self, prefix: &str, date: &str) -> OutputName {
        OutputName::new(
            format!("{prefix}_{date}_{}", self.sheet),
            format!("Set{}", self.number),
            "xlsx",
            Disambiguator::Counter,
        )
    }

    fn sheets(&self) -> Vec<(&str, &Table)> {
        let mut sheets = vec![(self.sheet.as_str(), &self.table)];
        sheets.extend(self.auxiliaries.iter().map(|(name, table)| (name.as_str(), table)));
        sheets
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitPlan {
    pub units: Vec<ChunkUnit>,
    pub warnings: Vec<String>,
}

impl SplitPlan {
    pub fn total_rows(&self) -> usize {
        self.units.iter().map(|u| u.table.row_count()).sum()
    }
}

pub fn plan(sheets: &[(String, Table)], options: &SplitOptions) -> PipelineResult<SplitPlan> {
    let mut warnings = Vec::new();
    let mut auxiliaries = Vec::with_capacity(options.auxiliary_sheets.len());
    for name in &options.auxiliary_sheets {
        match sheets.iter().find(|(sheet, _)| sheet == name) {
            Some((_, table)) => auxiliaries.push((name.clone(), table.clone())),
            None => {
                let message = format!("Auxiliary sheet '{name}' not found; chunks will not include it");
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    let mut units = Vec::new();
    for (sheet, table) in sheets {
        if options.auxiliary_sheets.contains(sheet) {
            continue;
        }
        let chunks = chunk_rows(table, options.max_rows)?;
        debug!("Sheet '{}': {} row(s) -> {} chunk(s)", sheet, table.row_count(), chunks.len());
        units.extend(chunks.into_iter().enumerate().map(|(idx, chunk)| ChunkUnit {
            sheet: sheet.clone(),
            number: idx + 1,
            table: chunk,
            auxiliaries: auxiliaries.clone(),
        }));
    }
    Ok(SplitPlan { units, warnings })
}

/// Writes each unit as its own workbook in `dir`.
pub fn write_plan(plan: &SplitPlan, dir: &Path, prefix: &str, date: &str) -> PipelineResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(plan.units.len());
    for unit in &plan.units {
        let path = naming::allocate_and_write(dir, &unit.file_name(prefix, date), |path| {
            workbook::write_workbook(path, &unit.sheets())
        })?;
        debug!("Wrote chunk {} of '{}' to {:?}", unit.number, unit.sheet, path);
        written.push(path);
    }
    Ok(written)
}

/// Bundles `files` into a deflated zip archive at `archive`, each under its
/// bare file name.
pub fn bundle(archive: &Path, files: &[PathBuf]) -> PipelineResult<()> {
    let to_err = |err: zip::result::ZipError| PipelineError::workbook(archive, err);
    let file = File::create(archive).map_err(|err| PipelineError::io(archive, err))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PipelineError::InvalidArgument(format!("Unusable file name {path:?}")))?;
        let bytes = std::fs::read(path).map_err(|err| PipelineError::io(path, err))?;
        writer.start_file(name, options).map_err(to_err)?;
        writer
            .write_all(&bytes)
            .map_err(|err| PipelineError::io(archive, err))?;
    }
    writer.finish().map_err(to_err)?;
    Ok(())
}

pub fn execute(args: &SplitArgs, session: &mut Session) -> Result<()> {
    let config = session.config().split.clone();
    let options = SplitOptions {
        max_rows: args.chunk_size.unwrap_or(config.chunk_size),
        auxiliary_sheets: if args.aux_sheets.is_empty() {
            config.auxiliary_sheets
        } else {
            args.aux_sheets.clone()
        },
        prefix: args.prefix.clone().unwrap_or(config.prefix),
    };
    info!(
        "Splitting {:?} into chunks of at most {} row(s)",
        args.input, options.max_rows
    );

    let sheets = loader::load_workbook(&args.input, &LoadOptions::default())
        .with_context(|| format!("Loading workbook {:?}", args.input))?;
    let total: usize = sheets.iter().map(|(_, t)| t.row_count()).sum();
    info!("Total number of rows in input file: {total}");

    let plan = plan(&sheets, &options)?;
    for message in &plan.warnings {
        session.warn(message.clone());
    }

    let dir = session.ensure_output_dir()?.to_path_buf();
    let date = session.stamp().date();
    let written = write_plan(&plan, &dir, &options.prefix, &date)
        .with_context(|| format!("Writing chunks into {dir:?}"))?;
    for (unit, path) in plan.units.iter().zip(&written) {
        session.record_artifact("chunk", path, unit.table.row_count());
    }
    info!("Saved {} file(s)", written.len());

    if args.zip && !written.is_empty() {
        let name = OutputName::new(config.archive_name, "", "zip", Disambiguator::Counter);
        let archive = session
            .write_output(&dir, &name, |path| bundle(path, &written))
            .with_context(|| format!("Writing archive in {dir:?}"))?;
        info!("Bundled {} file(s) into {:?}", written.len(), archive);
        session.record_artifact("archive", &archive, plan.total_rows());
    }
    Ok(())
}
