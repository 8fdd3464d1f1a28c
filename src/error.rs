//! Error taxonomy shared by the pipeline stages.
//!
//! Library functions return [`PipelineResult`]; the command layer wraps these
//! in `anyhow` with context. A key missing from a reference table is not an
//! error and never appears here (see [`crate::lookup::MissPolicy`]).

use std::{io, path::PathBuf};

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file extension is not a format the loader understands.
    #[error("Unsupported file format '{extension}' for {path:?}")]
    Format { path: PathBuf, extension: String },
    /// The content could not be read as tabular data.
    #[error("Failed to parse {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    /// An expected column (or sheet) is absent.
    #[error("{context}: column '{column}' not found")]
    Schema { context: String, column: String },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("I/O failure on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Workbook error on {path:?}: {message}")]
    Workbook { path: PathBuf, message: String },
}

impl PipelineError {
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn schema(context: impl Into<String>, column: impl Into<String>) -> Self {
        PipelineError::Schema {
            context: context.into(),
            column: column.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn workbook(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        PipelineError::Workbook {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Multi-file callers may skip the offending input and keep going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PipelineError::Parse { .. } | PipelineError::Schema { .. }
        )
    }
}
