//! Collision-free output file names.
//!
//! Names follow `{base}_{stamp}.{ext}`; when that is taken a disambiguator is
//! appended (`_1`, `_2`, ... or `_A`, `_B`, ...). [`allocate`] claims the
//! first free candidate with a create-exclusive open, so two invocations
//! writing into the same directory can never be handed the same path.

use std::{
    collections::HashSet,
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::error::{PipelineError, PipelineResult};

/// Upper bound on probes before giving up on a directory.
const MAX_ATTEMPTS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disambiguator {
    /// `_1`, `_2`, ...
    Counter,
    /// `_A` ... `_Z`, `_AA`, `_AB`, ...
    Letter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub base: String,
    pub stamp: String,
    pub extension: String,
    pub disambiguator: Disambiguator,
}

impl OutputName {
    pub fn new(
        base: impl Into<String>,
        stamp: impl Into<String>,
        extension: impl Into<String>,
        disambiguator: Disambiguator,
    ) -> Self {
        Self {
            base: base.into(),
            stamp: stamp.into(),
            extension: extension.into(),
            disambiguator,
        }
    }
}

/// Spreadsheet-style column letters for a 1-based index.
fn letters(mut index: usize) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push(b'A' + rem as u8);
        index = (index - 1) / 26;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// The file name tried on `attempt` (0 is the undecorated name).
pub fn candidate(name: &OutputName, attempt: usize) -> String {
    let mut file = name.base.clone();
    if !name.stamp.is_empty() {
        file.push('_');
        file.push_str(&name.stamp);
    }
    if attempt > 0 {
        file.push('_');
        match name.disambiguator {
            Disambiguator::Counter => file.push_str(&attempt.to_string()),
            Disambiguator::Letter => file.push_str(&letters(attempt)),
        }
    }
    if !name.extension.is_empty() {
        file.push('.');
        file.push_str(&name.extension);
    }
    file
}

/// First candidate absent from `existing` (a snapshot of a directory listing).
pub fn next_free(name: &OutputName, existing: &HashSet<String>) -> PipelineResult<String> {
    (0..MAX_ATTEMPTS)
        .map(|attempt| candidate(name, attempt))
        .find(|file| !existing.contains(file))
        .ok_or_else(|| exhausted(name))
}

/// File names currently present in `dir`.
pub fn snapshot(dir: &Path) -> PipelineResult<HashSet<String>> {
    let entries = fs::read_dir(dir).map_err(|err| PipelineError::io(dir, err))?;
    let mut names = HashSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| PipelineError::io(dir, err))?;
        if let Some(name) = entry.file_name().to_str() {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

/// Claims a fresh path in `dir` by creating an empty file exclusively. The
/// caller then overwrites it with the real content.
pub fn allocate(dir: &Path, name: &OutputName) -> PipelineResult<PathBuf> {
    for attempt in 0..MAX_ATTEMPTS {
        let path = dir.join(candidate(name, attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {
                debug!("Allocated output path {:?}", path);
                return Ok(path);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(PipelineError::io(path, err)),
        }
    }
    Err(exhausted(name))
}

/// Claims a path with [`allocate`] and fills it with `write`. When `write`
/// fails the claimed placeholder is removed so no empty file is left behind.
pub fn allocate_and_write<F>(dir: &Path, name: &OutputName, write: F) -> PipelineResult<PathBuf>
where
    F: FnOnce(&Path) -> PipelineResult<()>,
{
    let path = allocate(dir, name)?;
    if let Err(err) = write(&path) {
        if let Err(remove_err) = fs::remove_file(&path) {
            warn!("Could not remove incomplete output {:?}: {}", path, remove_err);
        }
        return Err(err);
    }
    Ok(path)
}

fn exhausted(name: &OutputName) -> PipelineError {
    PipelineError::InvalidArgument(format!(
        "No free file name for '{}' after {MAX_ATTEMPTS} attempts",
        candidate(name, 0)
    ))
}
